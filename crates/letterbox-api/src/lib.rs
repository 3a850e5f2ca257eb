pub mod auth;
pub mod directory;
pub mod error;
pub mod gate;
pub mod messages;
pub mod middleware;
pub mod routes;
pub mod store;
pub mod token;
pub mod users;

pub use error::ApiError;

use tracing::error;

/// Run blocking work (SQLite, Argon2) off the async runtime.
pub(crate) async fn blocking<F, T>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        ApiError::Internal(e.to_string())
    })?
}
