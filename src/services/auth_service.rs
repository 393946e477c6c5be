//! Domain service for registration and credential verification.
//!
//! Session establishment and rotation live at the HTTP layer; this service
//! only decides whether a set of credentials is acceptable.

use serde::Serialize;
use thiserror::Error;

/// Errors specific to authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Deliberately identical wording for unknown-username and wrong-password
    /// failures so callers cannot enumerate accounts.
    #[error("invalid username or password")]
    InvalidCredentials,

    #[error("User not found")]
    UserNotFound,

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sea_orm::DbErr> for AuthError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<anyhow::Error> for AuthError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

/// User info DTO for responses.
#[derive(Debug, Clone, Serialize)]
pub struct UserInfo {
    pub username: String,
    pub email: String,
    pub last_login: Option<String>,
    pub created_at: String,
}

/// Result of a successful credential check, used to populate the session.
#[derive(Debug, Clone, Serialize)]
pub struct AuthenticatedUser {
    pub user_id: i32,
    pub username: String,
}

/// Domain service trait for authentication.
#[async_trait::async_trait]
pub trait AuthService: Send + Sync {
    /// Validates and persists a new user record.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Validation`] for malformed input and
    /// [`AuthError::Conflict`] when the username or email is already taken.
    async fn register(&self, username: &str, email: &str, password: &str)
    -> Result<(), AuthError>;

    /// Verifies credentials and returns the matched user.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidCredentials`] when the username does not
    /// exist or the password does not verify.
    async fn login(&self, username: &str, password: &str) -> Result<AuthenticatedUser, AuthError>;

    /// Gets profile information for an authenticated user.
    async fn get_user_info(&self, user_id: i32) -> Result<UserInfo, AuthError>;
}
