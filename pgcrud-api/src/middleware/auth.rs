//! Credential Verification Middleware
//!
//! Extracts the credential from `Authorization: Bearer {token}` or
//! `X-API-Key: {token}` (first match wins, in that order), verifies it
//! against the engine, and injects the resulting [`TokenClaims`] into
//! request extensions. With auth disabled every request carries
//! `FullAccess`.
//!
//! Public paths (health, documentation) bypass the requirement entirely;
//! a valid credential presented on a public path still attaches its
//! claims so the health endpoint can serve its augmented body.

use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};

use pgcrud_core::TokenClaims;

use crate::auth::is_public_path;
use crate::error::ApiError;
use crate::state::AppState;

/// Verify the request credential and attach claims.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let public = is_public_path(request.uri().path());

    if !state.credentials.enabled() {
        request.extensions_mut().insert(TokenClaims::FullAccess);
        return Ok(next.run(request).await);
    }

    let token = extract_token(request.headers()).map(|t| t.to_string());
    match token {
        Some(token) => match state.credentials.verify(&token) {
            Ok(claims) => {
                request.extensions_mut().insert(claims);
                Ok(next.run(request).await)
            }
            Err(_) if public => Ok(next.run(request).await),
            Err(err) => Err(err.into()),
        },
        None if public => Ok(next.run(request).await),
        None => Err(ApiError::unauthenticated(
            "Authentication required: provide Authorization: Bearer or X-API-Key",
        )),
    }
}

/// Pull the raw token from the credential headers. `Authorization` is
/// consulted first; a non-Bearer Authorization header is ignored rather
/// than rejected so API-key-only clients can still send one.
fn extract_token(headers: &HeaderMap) -> Option<&str> {
    if let Some(value) = headers.get("authorization").and_then(|h| h.to_str().ok()) {
        if let Some(token) = value.strip_prefix("Bearer ") {
            return Some(token);
        }
    }
    headers.get("x-api-key").and_then(|h| h.to_str().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_bearer_wins_over_api_key() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Bearer tok_a"));
        headers.insert("x-api-key", HeaderValue::from_static("tok_b"));
        assert_eq!(extract_token(&headers), Some("tok_a"));
    }

    #[test]
    fn test_api_key_fallback() {
        let mut headers = HeaderMap::new();
        headers.insert("x-api-key", HeaderValue::from_static("tok_b"));
        assert_eq!(extract_token(&headers), Some("tok_b"));

        // A non-Bearer Authorization header does not shadow the API key.
        headers.insert("authorization", HeaderValue::from_static("Basic abc"));
        assert_eq!(extract_token(&headers), Some("tok_b"));
    }

    #[test]
    fn test_no_headers() {
        assert_eq!(extract_token(&HeaderMap::new()), None);
    }
}
