//! `SeaORM` implementation of the `AuthService` trait.

use async_trait::async_trait;
use regex::Regex;
use std::sync::OnceLock;
use tokio::task;
use tracing::warn;

use crate::config::SecurityConfig;
use crate::db::{CreateUserError, Store};
use crate::db::repositories::user::hash_password;
use crate::services::auth_service::{AuthError, AuthService, AuthenticatedUser, UserInfo};

fn email_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("Invalid regex"))
}

pub struct SeaOrmAuthService {
    store: Store,
    security: SecurityConfig,
}

impl SeaOrmAuthService {
    #[must_use]
    pub const fn new(store: Store, security: SecurityConfig) -> Self {
        Self { store, security }
    }
}

#[async_trait]
impl AuthService for SeaOrmAuthService {
    async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<(), AuthError> {
        // Validation order is fixed: first failure wins
        if username.is_empty() || email.is_empty() || password.is_empty() {
            return Err(AuthError::Validation(
                "Username, email and password are required".to_string(),
            ));
        }

        if !email_regex().is_match(email) {
            return Err(AuthError::Validation(
                "Email address is not valid".to_string(),
            ));
        }

        if password.len() < self.security.password_min_length {
            return Err(AuthError::Validation(format!(
                "Password must be at least {} characters",
                self.security.password_min_length
            )));
        }

        if self.store.user_exists(username, email).await? {
            return Err(AuthError::Conflict(
                "Username or email is already registered".to_string(),
            ));
        }

        let password = password.to_string();
        let security = self.security.clone();
        let password_hash = task::spawn_blocking(move || hash_password(&password, Some(&security)))
            .await
            .map_err(|e| AuthError::Internal(format!("Password hashing task panicked: {e}")))??;

        // The unique indexes back up the existence check above; a concurrent
        // duplicate registration loses here instead of inserting twice.
        match self.store.create_user(username, email, password_hash).await {
            Ok(_) => Ok(()),
            Err(CreateUserError::Duplicate) => Err(AuthError::Conflict(
                "Username or email is already registered".to_string(),
            )),
            Err(CreateUserError::Database(e)) => Err(e.into()),
        }
    }

    async fn login(&self, username: &str, password: &str) -> Result<AuthenticatedUser, AuthError> {
        let user = self
            .store
            .authenticate_user(username, password)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        // Best-effort: a failed timestamp write must not fail the login
        if let Err(e) = self.store.touch_last_login(user.id).await {
            warn!("Failed to update last_login for {}: {e}", user.username);
        }

        Ok(AuthenticatedUser {
            user_id: user.id,
            username: user.username,
        })
    }

    async fn get_user_info(&self, user_id: i32) -> Result<UserInfo, AuthError> {
        let user = self
            .store
            .get_user_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        Ok(UserInfo {
            username: user.username,
            email: user.email,
            last_login: user.last_login,
            created_at: user.created_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_syntax_check() {
        assert!(email_regex().is_match("alice@example.com"));
        assert!(email_regex().is_match("a.b+c@mail.example.co.uk"));
        assert!(!email_regex().is_match("alice"));
        assert!(!email_regex().is_match("alice@"));
        assert!(!email_regex().is_match("alice@example"));
        assert!(!email_regex().is_match("a lice@example.com"));
        assert!(!email_regex().is_match("alice@exa mple.com"));
    }
}
