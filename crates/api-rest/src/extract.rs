//! Request-level authentication: the acting user and the optional API key.

use crate::error::ApiError;
use crate::AppState;
use api_shared::auth::validate_api_key;
use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{request::Parts, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use hsr_core::Requester;

/// Header naming the user a mutating request acts for.
pub const USER_HEADER: &str = "x-hs-user";

/// Header carrying the API key when one is configured.
pub const API_KEY_HEADER: &str = "x-api-key";

/// The user named by the `x-hs-user` header. Rejects requests without it.
#[derive(Clone, Debug)]
pub struct ActingUser(pub Requester);

#[async_trait]
impl<S> FromRequestParts<S> for ActingUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user = parts
            .headers
            .get(USER_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| {
                (
                    StatusCode::UNAUTHORIZED,
                    format!("{} header is required", USER_HEADER),
                )
            })?;
        Ok(Self(Requester::user(user)))
    }
}

/// Enforces `x-api-key` on every route except `/health` when a key is configured.
pub async fn require_api_key(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let Some(expected) = state.api_key.as_deref() else {
        return next.run(request).await;
    };
    if request.uri().path() == "/health" {
        return next.run(request).await;
    }

    let provided = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok());
    match validate_api_key(provided, expected) {
        Ok(()) => next.run(request).await,
        Err(e) => {
            tracing::warn!("API key rejected: {}", e);
            (StatusCode::UNAUTHORIZED, e.to_string()).into_response()
        }
    }
}
