use axum::{
    Json, Router,
    middleware::from_fn_with_state,
    routing::{get, post},
};
use serde_json::{Value, json};

use crate::auth::{self, AppState};
use crate::gate::{self, Predicate};
use crate::middleware::{Guard, enforce, resolve_identity};
use crate::{messages, users};

/// Build the full API router. Every route group carries its own predicate
/// chain; identity resolution wraps all of them.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/health", get(health));

    let logged_in_routes = Router::new()
        .route("/users", get(users::list_users))
        .route("/users/{username}", get(users::get_user))
        .route("/messages", post(messages::send_message))
        .route_layer(from_fn_with_state(guarded(&state, gate::LOGGED_IN), enforce));

    let correct_user_routes = Router::new()
        .route("/users/{username}/to", get(users::messages_to))
        .route("/users/{username}/from", get(users::messages_from))
        .route_layer(from_fn_with_state(guarded(&state, gate::CORRECT_USER), enforce));

    let correspondent_routes = Router::new()
        .route("/messages/{id}", get(messages::get_message))
        .route_layer(from_fn_with_state(guarded(&state, gate::CORRESPONDENT), enforce));

    let recipient_routes = Router::new()
        .route("/messages/{id}/read", post(messages::mark_read))
        .route_layer(from_fn_with_state(guarded(&state, gate::RECIPIENT), enforce));

    Router::new()
        .merge(public_routes)
        .merge(logged_in_routes)
        .merge(correct_user_routes)
        .merge(correspondent_routes)
        .merge(recipient_routes)
        .layer(from_fn_with_state(state.clone(), resolve_identity))
        .with_state(state)
}

fn guarded(state: &AppState, chain: &'static [Predicate]) -> Guard {
    Guard::new(state.clone(), chain)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
