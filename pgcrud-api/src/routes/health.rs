//! Health Endpoint
//!
//! `GET /api/_health` is public. The baseline body carries process
//! identity only; callers presenting a valid credential (or running with
//! auth disabled) additionally get the schema digest, table count, and
//! namespace list. A failed probe (pool error or five-second timeout)
//! reports `unhealthy` with a 503.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Extension, Json};
use serde::{Deserialize, Serialize};

use pgcrud_core::TokenClaims;

use crate::state::AppState;

// ============================================================================
// TYPES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub version: String,
    pub build_git_hash: String,
    pub build_timestamp: String,

    /// Schema model digest (64-char lowercase hex); authenticated callers only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database_hash: Option<String>,

    /// Table count; authenticated callers only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tables: Option<usize>,

    /// Introspected namespaces; authenticated callers only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespaces: Option<Vec<String>>,
}

fn baseline(status: HealthStatus) -> HealthResponse {
    HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION").to_string(),
        build_git_hash: option_env!("PGCRUD_BUILD_GIT_HASH").unwrap_or("unknown").to_string(),
        build_timestamp: option_env!("PGCRUD_BUILD_TIMESTAMP").unwrap_or("unknown").to_string(),
        database_hash: None,
        tables: None,
        namespaces: None,
    }
}

// ============================================================================
// HANDLER
// ============================================================================

/// GET /api/_health
pub async fn health(
    State(state): State<AppState>,
    claims: Option<Extension<TokenClaims>>,
) -> impl IntoResponse {
    if let Err(err) = state.pools.probe().await {
        tracing::error!(error = %err, "Health probe failed");
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(baseline(HealthStatus::Unhealthy)),
        );
    }

    let mut response = baseline(HealthStatus::Healthy);
    if claims.is_some() {
        response.database_hash = Some(state.model.digest());
        response.tables = Some(state.model.len());
        response.namespaces = Some(state.model.namespaces().to_vec());
    }

    (StatusCode::OK, Json(response))
}
