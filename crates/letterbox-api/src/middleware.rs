use std::collections::HashMap;

use axum::{
    body::{Body, to_bytes},
    extract::{Path, Query, Request, State, rejection::PathRejection},
    http::{HeaderMap, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::headers::{Authorization, HeaderMapExt, authorization::Bearer};
use serde::Deserialize;
use tracing::debug;

use letterbox_types::api::Claims;

use crate::auth::AppState;
use crate::blocking;
use crate::error::ApiError;
use crate::gate::{self, Predicate, Target};

/// Matches axum's default body limit, which the `Json` extractor enforces
/// downstream anyway.
const MAX_TOKEN_BODY: usize = 2 * 1024 * 1024;

/// The caller's verified identity, or `None` for anonymous requests.
#[derive(Debug, Clone)]
pub struct Identity(pub Option<Claims>);

impl Identity {
    pub fn require(&self) -> Result<&Claims, ApiError> {
        self.0.as_ref().ok_or(ApiError::Unauthorized)
    }
}

#[derive(Debug, Default, Deserialize)]
struct TokenField {
    #[serde(rename = "_token")]
    token: Option<String>,
}

/// Resolve the bearer token into an [`Identity`] and attach it to the
/// request. Looks at `Authorization: Bearer`, then the `_token` query
/// parameter, then a `_token` field in a JSON body. Rejects only a JSON
/// body too large to buffer.
pub async fn resolve_identity(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let mut token = req
        .headers()
        .typed_get::<Authorization<Bearer>>()
        .map(|auth| auth.token().to_string());

    if token.is_none() {
        token = Query::<TokenField>::try_from_uri(req.uri())
            .ok()
            .and_then(|Query(field)| field.token);
    }

    if token.is_none() && inspectable_json(req.headers()) {
        let (parts, body) = req.into_parts();
        let bytes = match to_bytes(body, MAX_TOKEN_BODY).await {
            Ok(bytes) => bytes,
            Err(e) => {
                debug!("Request body could not be buffered: {}", e);
                return ApiError::PayloadTooLarge.into_response();
            }
        };
        token = serde_json::from_slice::<TokenField>(&bytes)
            .ok()
            .and_then(|field| field.token);
        req = Request::from_parts(parts, Body::from(bytes));
    }

    let claims = state.tokens.resolve_identity(token.as_deref());
    req.extensions_mut().insert(Identity(claims));
    next.run(req).await
}

/// Only JSON bodies whose declared length (if any) fits the limit are
/// buffered. Everything else passes through untouched.
fn inspectable_json(headers: &HeaderMap) -> bool {
    let is_json = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("application/json"));
    let fits = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok())
        .is_none_or(|len| len <= MAX_TOKEN_BODY);
    is_json && fits
}

/// State for one route group's gate: the app plus the predicate chain.
#[derive(Clone)]
pub struct Guard {
    app: AppState,
    chain: &'static [Predicate],
}

impl Guard {
    pub fn new(app: AppState, chain: &'static [Predicate]) -> Self {
        Self { app, chain }
    }
}

/// Evaluate the guard's chain against the resolved identity and the route's
/// path parameters. Any denial is a plain 401. Undecodable path parameters
/// leave the target empty, so the chain denies rather than leaking a
/// rejection ahead of authorization.
pub async fn enforce(
    State(guard): State<Guard>,
    params: Result<Path<HashMap<String, String>>, PathRejection>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let claim = req
        .extensions()
        .get::<Identity>()
        .and_then(|identity| identity.0.clone());

    let params = match params {
        Ok(Path(params)) => params,
        Err(rejection) => {
            debug!("Unreadable path parameters: {}", rejection);
            HashMap::new()
        }
    };

    let Guard { app, chain } = guard;
    let status = blocking(move || {
        let target = Target {
            username: params.get("username").map(String::as_str),
            message_id: params.get("id").map(String::as_str),
        };
        Ok(gate::run(chain, claim, &target, &app.messages))
    })
    .await?;

    if status.is_allowed() {
        Ok(next.run(req).await)
    } else {
        debug!(
            "{} {} denied for {:?}: {:?}",
            req.method(),
            req.uri().path(),
            status.claim.as_ref().map(|c| c.username.as_str()),
            status.decision
        );
        Err(ApiError::Unauthorized)
    }
}
