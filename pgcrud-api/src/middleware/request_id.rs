//! Request Identifier Middleware
//!
//! Assigns every inbound request a UUIDv7 identifier, exposes it to
//! handlers via request extensions, and echoes it in the `X-Request-Id`
//! response header. Dispatch-boundary error logs carry this identifier.

use axum::{
    extract::Request,
    http::HeaderValue,
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

/// Response header carrying the request identifier.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// The identifier assigned to one request.
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Assign a request id and echo it on the response.
pub async fn request_id_middleware(mut request: Request, next: Next) -> Response {
    let id = RequestId(Uuid::now_v7().to_string());
    request.extensions_mut().insert(id.clone());

    let mut response = next.run(request).await;
    if let Ok(value) = HeaderValue::from_str(&id.0) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}
