//! Error Types for the Gateway API
//!
//! This module defines the API-boundary error shape:
//! - `ApiError` struct serialized as the wire envelope `{error, message, …}`
//! - `ErrorCode` enum mapping each taxonomic kind to a protocol status
//! - the native-error classifier that maps Postgres SQLSTATEs to kinds
//! - `IntoResponse` so handlers return errors directly
//!
//! Query-builder and token failures convert into this type at the dispatch
//! boundary; nothing below it knows about HTTP.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio_postgres::error::SqlState;

use pgcrud_core::{ConfigError, IntrospectError, QueryBuildError, TokenError};

// ============================================================================
// ERROR CODE ENUM
// ============================================================================

/// Error codes for API responses.
///
/// Each code is a taxonomic kind with a fixed protocol status; the wire
/// label is the SCREAMING_SNAKE_CASE rendering of the variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Missing or invalid credential on a non-public path
    Unauthenticated,

    /// Credential valid but lacks the access mode on the entity's namespace
    PermissionDenied,

    /// Unknown route segment, or no row matches the key
    NotFound,

    /// Request-shape or SQL-build failure
    ValidationFailed,

    /// Unique-constraint violation
    UniqueViolation,

    /// Foreign-key constraint violation
    ForeignKeyViolation,

    /// NOT NULL constraint violation
    NullViolation,

    /// Value rejected by the database's own parsing/validation
    InvalidValue,

    /// Health probe failure or pool unavailable
    ServiceUnavailable,

    /// Unmapped database error or other unexpected failure
    InternalError,
}

impl ErrorCode {
    /// Get the HTTP status code for this error code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorCode::Unauthenticated => StatusCode::UNAUTHORIZED,
            ErrorCode::PermissionDenied => StatusCode::FORBIDDEN,
            ErrorCode::NotFound => StatusCode::NOT_FOUND,

            ErrorCode::ValidationFailed
            | ErrorCode::ForeignKeyViolation
            | ErrorCode::NullViolation
            | ErrorCode::InvalidValue => StatusCode::BAD_REQUEST,

            ErrorCode::UniqueViolation => StatusCode::CONFLICT,

            ErrorCode::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get a default message for this error code.
    pub fn default_message(&self) -> &'static str {
        match self {
            ErrorCode::Unauthenticated => "Authentication required",
            ErrorCode::PermissionDenied => "Access denied",
            ErrorCode::NotFound => "Not found",
            ErrorCode::ValidationFailed => "Request validation failed",
            ErrorCode::UniqueViolation => "Unique constraint violated",
            ErrorCode::ForeignKeyViolation => "Foreign key constraint violated",
            ErrorCode::NullViolation => "Required column is null",
            ErrorCode::InvalidValue => "Value rejected by the database",
            ErrorCode::ServiceUnavailable => "Service temporarily unavailable",
            ErrorCode::InternalError => "Internal server error",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

// ============================================================================
// API ERROR STRUCT
// ============================================================================

/// Structured error response.
///
/// Serializes as the wire envelope `{error, message}` plus `detail`,
/// `constraint`, and `details` when applicable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ApiError {
    /// Error kind label
    #[serde(rename = "error")]
    pub code: ErrorCode,

    /// Human-readable error message
    pub message: String,

    /// Native error detail (only with `expose_db_errors`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,

    /// Offending constraint name (only with `expose_db_errors`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub constraint: Option<String>,

    /// Additional structured details (field errors, etc.)
    #[serde(skip_serializing_if = "Option::is_none")]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<Object>))]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Create a new API error with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            detail: None,
            constraint: None,
            details: None,
        }
    }

    /// Create a new API error with the code's default message.
    pub fn from_code(code: ErrorCode) -> Self {
        Self::new(code, code.default_message())
    }

    /// Add structured details to the error.
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        self.code.status_code()
    }

    // ========================================================================
    // Convenience constructors
    // ========================================================================

    /// Create an Unauthenticated error.
    pub fn unauthenticated(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unauthenticated, message)
    }

    /// Create a PermissionDenied error.
    pub fn permission_denied(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::PermissionDenied, message)
    }

    /// Create a NotFound error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    /// Create a ValidationFailed error.
    pub fn validation_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ValidationFailed, message)
    }

    /// Create a ServiceUnavailable error.
    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ServiceUnavailable, message)
    }

    /// Create an InternalError.
    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    /// Unknown route segment.
    pub fn unknown_table(segment: &str) -> Self {
        Self::not_found(format!("Unknown table '{segment}'"))
    }

    /// No row matched the supplied key.
    pub fn no_matching_row(segment: &str) -> Self {
        Self::not_found(format!("No row in '{segment}' matches the given key"))
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

// ============================================================================
// NATIVE ERROR CLASSIFICATION
// ============================================================================

/// Classify a native database error into its taxonomic kind.
///
/// SQLSTATE class 23 constraint codes map to their specific kinds; class
/// 22 (data exceptions: bad casts, range overflows) maps to
/// `InvalidValue`; everything else is `InternalError`. With
/// `expose_db_errors` the native message, detail, and constraint ride
/// along; without it only the kind's generic message is returned.
pub fn classify_db_error(err: &tokio_postgres::Error, expose: bool) -> ApiError {
    let Some(db) = err.as_db_error() else {
        tracing::error!(error = %err, "Database driver error");
        return ApiError::from_code(ErrorCode::InternalError);
    };

    let code = db.code();
    let kind = if *code == SqlState::UNIQUE_VIOLATION {
        ErrorCode::UniqueViolation
    } else if *code == SqlState::FOREIGN_KEY_VIOLATION {
        ErrorCode::ForeignKeyViolation
    } else if *code == SqlState::NOT_NULL_VIOLATION {
        ErrorCode::NullViolation
    } else if code.code().starts_with("22") {
        ErrorCode::InvalidValue
    } else {
        ErrorCode::InternalError
    };

    if expose {
        ApiError {
            code: kind,
            message: db.message().to_string(),
            detail: db.detail().map(|s| s.to_string()),
            constraint: db.constraint().map(|s| s.to_string()),
            details: None,
        }
    } else {
        ApiError::from_code(kind)
    }
}

// ============================================================================
// CONVERSIONS FROM DOMAIN ERRORS
// ============================================================================

/// Builder failures are always validation failures on the wire.
impl From<QueryBuildError> for ApiError {
    fn from(err: QueryBuildError) -> Self {
        ApiError::validation_failed(err.to_string())
    }
}

/// Any token failure surfaces as a bare 401; the kind of failure is not
/// disclosed.
impl From<TokenError> for ApiError {
    fn from(_err: TokenError) -> Self {
        ApiError::unauthenticated("Invalid or missing credential")
    }
}

impl From<ConfigError> for ApiError {
    fn from(err: ConfigError) -> Self {
        ApiError::internal_error(err.to_string())
    }
}

/// Catalog failures are fatal at startup; the kind only exists so `main`
/// can report them coherently.
impl From<IntrospectError> for ApiError {
    fn from(err: IntrospectError) -> Self {
        ApiError::internal_error(err.to_string())
    }
}

/// Convert from deadpool_postgres::PoolError to ApiError.
impl From<deadpool_postgres::PoolError> for ApiError {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        tracing::error!("Connection pool error: {:?}", err);

        match err {
            deadpool_postgres::PoolError::Timeout(_) => {
                ApiError::service_unavailable("Database connection pool exhausted")
            }
            deadpool_postgres::PoolError::Closed => {
                ApiError::service_unavailable("Database connection pool is closed")
            }
            _ => ApiError::service_unavailable("Failed to acquire database connection"),
        }
    }
}

/// Convert from serde_json::Error to ApiError.
impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::validation_failed(format!("Invalid JSON: {}", err))
    }
}

// ============================================================================
// AXUM INTEGRATION
// ============================================================================

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(self);
        (status, body).into_response()
    }
}

// ============================================================================
// RESULT TYPE ALIAS
// ============================================================================

/// Result type alias for API operations.
pub type ApiResult<T> = Result<T, ApiError>;
