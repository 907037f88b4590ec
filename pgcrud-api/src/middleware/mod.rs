//! Axum middleware: request identifiers and credential verification.

mod auth;
mod request_id;

pub use auth::auth_middleware;
pub use request_id::{request_id_middleware, RequestId, REQUEST_ID_HEADER};
