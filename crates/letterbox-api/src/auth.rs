use std::sync::Arc;

use argon2::Argon2;
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use axum_extra::extract::WithRejection;
use tracing::{info, warn};

use letterbox_db::Database;
use letterbox_types::api::{LoginRequest, RegisterRequest, TokenResponse};

use crate::blocking;
use crate::directory::UserDirectory;
use crate::error::ApiError;
use crate::store::MessageStore;
use crate::token::TokenService;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub directory: UserDirectory,
    pub messages: MessageStore,
    pub tokens: TokenService,
}

impl AppStateInner {
    pub fn new(db: Database, hasher: Argon2<'static>, tokens: TokenService) -> AppState {
        let db = Arc::new(db);
        Arc::new(Self {
            directory: UserDirectory::new(db.clone(), hasher),
            messages: MessageStore::new(db),
            tokens,
        })
    }

    fn issue_token(&self, username: &str) -> Result<String, ApiError> {
        self.tokens
            .sign(username)
            .map_err(|e| ApiError::Internal(format!("token signing failed: {}", e)))
    }
}

/// POST /auth/register — creates the user and logs them in.
pub async fn register(
    State(state): State<AppState>,
    WithRejection(Json(req), _): WithRejection<Json<RegisterRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let user = blocking(move || db.directory.register(&req)).await?;

    let token = state.issue_token(&user.username)?;

    Ok((StatusCode::CREATED, Json(TokenResponse { token })))
}

/// POST /auth/login — checks credentials and bumps `last_login_at`.
pub async fn login(
    State(state): State<AppState>,
    WithRejection(Json(req), _): WithRejection<Json<LoginRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let username = req.username.clone();
    let authenticated = blocking(move || {
        if !db.directory.authenticate(&req.username, &req.password)? {
            return Ok(false);
        }
        db.directory.update_login_timestamp(&req.username)?;
        Ok(true)
    })
    .await?;

    if !authenticated {
        warn!("Failed login for {}", username);
        return Err(ApiError::BadRequest("Invalid username/password".into()));
    }

    let token = state.issue_token(&username)?;
    info!("User {} logged in", username);

    Ok(Json(TokenResponse { token }))
}
