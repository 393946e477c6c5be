use axum::{Json, extract::State, response::IntoResponse};
use std::sync::Arc;
use tower_sessions::Session;

use super::auth::SESSION_USER_ID_KEY;
use super::{ApiError, ApiResponse, AppState};

/// GET /dashboard
/// The protected resource: profile of the session's authenticated user.
pub async fn show_dashboard(
    State(state): State<Arc<AppState>>,
    session: Session,
) -> Result<impl IntoResponse, ApiError> {
    // The auth gate guarantees this is present
    let user_id = session
        .get::<i32>(SESSION_USER_ID_KEY)
        .await
        .map_err(|e| ApiError::internal(format!("Session error: {e}")))?
        .ok_or_else(|| ApiError::Unauthorized("Not authenticated".to_string()))?;

    let user = state.auth.get_user_info(user_id).await?;

    Ok(Json(ApiResponse::success(user)))
}
