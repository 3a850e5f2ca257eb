use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};
use axum_extra::extract::WithRejection;

use letterbox_types::api::{ReceivedMessagesResponse, SentMessagesResponse, UserListResponse, UserResponse};

use crate::auth::AppState;
use crate::blocking;
use crate::error::ApiError;

/// GET /users
pub async fn list_users(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let users = blocking(move || state.directory.all()).await?;
    Ok(Json(UserListResponse { users }))
}

/// GET /users/{username}
pub async fn get_user(
    State(state): State<AppState>,
    WithRejection(Path(username), _): WithRejection<Path<String>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let user = blocking(move || state.directory.get_by_username(&username)).await?;
    Ok(Json(UserResponse { user }))
}

/// GET /users/{username}/to — inbox. The gate has already matched the
/// caller against `username`.
pub async fn messages_to(
    State(state): State<AppState>,
    WithRejection(Path(username), _): WithRejection<Path<String>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let messages = blocking(move || state.directory.messages_to(&username)).await?;
    Ok(Json(ReceivedMessagesResponse { messages }))
}

/// GET /users/{username}/from — outbox.
pub async fn messages_from(
    State(state): State<AppState>,
    WithRejection(Path(username), _): WithRejection<Path<String>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let messages = blocking(move || state.directory.messages_from(&username)).await?;
    Ok(Json(SentMessagesResponse { messages }))
}
