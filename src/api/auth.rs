use axum::{
    Json,
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use std::sync::Arc;
use tower_sessions::Session;

use super::{ApiError, AppState};
use super::types::{LoginRequest, RegisterRequest};

// ============================================================================
// Session layout
// ============================================================================

/// Authenticated user id, present only after a successful login
pub const SESSION_USER_ID_KEY: &str = "user_id";

/// Denormalized username copy for display
pub const SESSION_USERNAME_KEY: &str = "username";

/// Unix timestamp of the most recent session-id rotation
pub const SESSION_LAST_REGENERATION_KEY: &str = "last_regeneration";

/// One-shot message surfaced on the next page render
pub const SESSION_FLASH_KEY: &str = "flash";

/// Where unauthenticated requests and logouts land
const LOGIN_PATH: &str = "/login";

/// Where authenticated logins land
const DASHBOARD_PATH: &str = "/dashboard";

// ============================================================================
// Middleware
// ============================================================================

/// Authorization gate for protected routes.
///
/// Redirects to the login page when the session carries no authenticated
/// user, and rotates the session id once the rotation window has elapsed.
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    session: Session,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let user_id = session
        .get::<i32>(SESSION_USER_ID_KEY)
        .await
        .map_err(|e| ApiError::internal(format!("Session error: {e}")))?;

    let Some(user_id) = user_id else {
        return Ok(Redirect::to(LOGIN_PATH).into_response());
    };

    tracing::Span::current().record("user_id", user_id);

    rotate_if_due(&session, state.config.security.session_rotation_secs).await?;

    Ok(next.run(request).await)
}

/// Rotation is a two-state machine per session: a rotation moves it to
/// fresh, and it becomes due again once the window elapses.
fn rotation_due(last_regeneration: Option<i64>, now: i64, window_secs: u64) -> bool {
    match last_regeneration {
        Some(ts) => now.saturating_sub(ts) > i64::try_from(window_secs).unwrap_or(i64::MAX),
        None => true,
    }
}

async fn rotate_if_due(session: &Session, window_secs: u64) -> Result<(), ApiError> {
    let last = session
        .get::<i64>(SESSION_LAST_REGENERATION_KEY)
        .await
        .map_err(|e| ApiError::internal(format!("Session error: {e}")))?;

    let now = chrono::Utc::now().timestamp();

    if rotation_due(last, now, window_secs) {
        rotate_session_id(session, now).await?;
    }

    Ok(())
}

/// Issue a new session id (old id invalidated, data carried over) and stamp
/// the rotation time.
async fn rotate_session_id(session: &Session, now: i64) -> Result<(), ApiError> {
    session
        .cycle_id()
        .await
        .map_err(|e| ApiError::internal(format!("Failed to rotate session id: {e}")))?;

    session
        .insert(SESSION_LAST_REGENERATION_KEY, now)
        .await
        .map_err(|e| ApiError::internal(format!("Session error: {e}")))?;

    Ok(())
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /auth/register
/// Validate and persist a new user record. Does not establish a session.
pub async fn register(
    State(state): State<Arc<AppState>>,
    session: Session,
    Json(payload): Json<RegisterRequest>,
) -> Result<Redirect, ApiError> {
    state
        .auth
        .register(&payload.username, &payload.email, &payload.password)
        .await?;

    tracing::info!("New user registered: {}", payload.username);

    // Flash shows up on the login page the browser is sent to
    if let Err(e) = session
        .insert(SESSION_FLASH_KEY, "Registration successful, please sign in")
        .await
    {
        tracing::warn!("Failed to set flash message: {e}");
    }

    Ok(Redirect::to(LOGIN_PATH))
}

/// POST /auth/login
/// Verify credentials, populate the session and rotate its id.
pub async fn login(
    State(state): State<Arc<AppState>>,
    session: Session,
    Json(payload): Json<LoginRequest>,
) -> Result<Redirect, ApiError> {
    // Already-authenticated callers are a no-op
    let existing = session
        .get::<i32>(SESSION_USER_ID_KEY)
        .await
        .map_err(|e| ApiError::internal(format!("Session error: {e}")))?;
    if existing.is_some() {
        return Ok(Redirect::to(DASHBOARD_PATH));
    }

    // Empty credentials fall through to the lookup and verify, so every
    // failure mode shares the one generic error
    let user = state.auth.login(&payload.username, &payload.password).await?;

    // Fresh id on every privilege change defeats session fixation
    session
        .insert(SESSION_USER_ID_KEY, user.user_id)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to create session: {e}")))?;
    session
        .insert(SESSION_USERNAME_KEY, &user.username)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to create session: {e}")))?;

    rotate_session_id(&session, chrono::Utc::now().timestamp()).await?;

    tracing::info!("User logged in: {}", user.username);

    Ok(Redirect::to(DASHBOARD_PATH))
}

/// GET /auth/logout
/// Destroy all session state and expire the cookie. Idempotent.
pub async fn logout(session: Session) -> Redirect {
    if let Err(e) = session.flush().await {
        tracing::warn!("Failed to flush session on logout: {e}");
    }

    Redirect::to(LOGIN_PATH)
}
