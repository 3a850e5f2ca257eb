use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use axum_extra::extract::WithRejection;

use letterbox_types::api::{MessageResponse, NewMessageResponse, ReadReceiptResponse, SendMessageRequest};

use crate::auth::AppState;
use crate::blocking;
use crate::error::ApiError;
use crate::middleware::Identity;

/// GET /messages/{id} — only reachable by the sender or the recipient.
pub async fn get_message(
    State(state): State<AppState>,
    WithRejection(Path(id), _): WithRejection<Path<i64>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let message = blocking(move || state.messages.get_by_id(id)).await?;
    Ok(Json(MessageResponse { message }))
}

/// POST /messages — the sender is always the caller.
pub async fn send_message(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    WithRejection(Json(req), _): WithRejection<Json<SendMessageRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let from_username = identity.require()?.username.clone();

    let message = blocking(move || state.messages.create(&from_username, &req.to_username, &req.body)).await?;

    Ok((StatusCode::CREATED, Json(NewMessageResponse { message })))
}

/// POST /messages/{id}/read — only reachable by the recipient.
pub async fn mark_read(
    State(state): State<AppState>,
    WithRejection(Path(id), _): WithRejection<Path<i64>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let message = blocking(move || state.messages.mark_read(id)).await?;
    Ok(Json(ReadReceiptResponse { message }))
}
