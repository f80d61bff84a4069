//! Request authentication
//!
//! The bearer middleware verifies the token and attaches a [`Principal`] to
//! the request. Handlers never see the principal directly; they take an
//! [`AuthUser`], which resolves it to a namespace id.

use std::sync::Arc;

use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::Response,
};

use super::http::AppState;
use crate::auth::{extract_bearer, resolve, Principal};
use crate::error::{Error, Result};
use crate::namespace::UserId;

/// Reject requests without a valid bearer token
pub async fn require_bearer(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response> {
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok());

    let token = extract_bearer(header)
        .ok_or_else(|| Error::Authentication("Missing bearer token".into()))?;
    let claims = state.tokens.verify(token)?;

    request.extensions_mut().insert(Principal::from(claims));
    Ok(next.run(request).await)
}

/// Caller identity, resolved once per request
#[derive(Debug, Clone)]
pub struct AuthUser(pub UserId);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self> {
        let principal = parts
            .extensions
            .get::<Principal>()
            .ok_or_else(|| Error::Authentication("No authenticated principal".into()))?;

        resolve(principal).map(AuthUser)
    }
}
