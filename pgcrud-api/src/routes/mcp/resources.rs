//! MCP resource handlers
//!
//! Two surface resources: `pgcrud://schema`, the canonical dump of the
//! accessible model with the API capabilities envelope, and one
//! `pgcrud://tables/{segment}` resource per visible table.

use serde_json::json;

use pgcrud_core::TokenClaims;

use super::types::{Resource, ResourceContent};
use crate::error::{ApiError, ApiResult};
use crate::routes::meta::{capabilities, describe_entity, TableDescriptor};
use crate::state::AppState;

/// URI of the whole-model resource.
pub const SCHEMA_URI: &str = "pgcrud://schema";

/// URI prefix of per-table resources.
pub const TABLE_URI_PREFIX: &str = "pgcrud://tables/";

// ============================================================================
// LISTING
// ============================================================================

/// Resources visible to this session's claims.
pub fn available_resources(state: &AppState, claims: &TokenClaims) -> Vec<Resource> {
    let mut resources = vec![Resource {
        uri: SCHEMA_URI.to_string(),
        name: "Database schema".to_string(),
        description: Some(
            "All accessible tables with columns, keys, and API capabilities".to_string(),
        ),
        mime_type: Some("application/json".to_string()),
    }];

    for entity in state.model.entities() {
        if !claims.can_see(&entity.namespace) {
            continue;
        }
        let segment = entity.route_segment();
        resources.push(Resource {
            uri: format!("{TABLE_URI_PREFIX}{segment}"),
            name: segment,
            description: Some(format!(
                "Structure of {} ({} columns)",
                entity.qualified_identifier(),
                entity.columns.len()
            )),
            mime_type: Some("application/json".to_string()),
        });
    }

    resources
}

// ============================================================================
// READING
// ============================================================================

/// Read one resource by URI.
pub fn read_resource(
    state: &AppState,
    claims: &TokenClaims,
    uri: &str,
) -> ApiResult<ResourceContent> {
    if uri == SCHEMA_URI {
        let tables: Vec<TableDescriptor> = state
            .model
            .entities()
            .filter(|entity| claims.can_see(&entity.namespace))
            .map(describe_entity)
            .collect();
        let body = json!({
            "database_hash": state.model.digest(),
            "tables": tables,
            "capabilities": capabilities(&state.config),
        });
        return Ok(content(uri, &body));
    }

    if let Some(segment) = uri.strip_prefix(TABLE_URI_PREFIX) {
        let entity = state
            .model
            .entity_by_segment(segment)
            .ok_or_else(|| ApiError::not_found(format!("Unknown resource '{uri}'")))?;
        if !claims.can_see(&entity.namespace) {
            return Err(ApiError::permission_denied(format!(
                "No access to schema '{}'",
                entity.namespace
            )));
        }
        let body = serde_json::to_value(describe_entity(entity))?;
        return Ok(content(uri, &body));
    }

    Err(ApiError::not_found(format!("Unknown resource '{uri}'")))
}

fn content(uri: &str, body: &serde_json::Value) -> ResourceContent {
    ResourceContent {
        uri: uri.to_string(),
        mime_type: Some("application/json".to_string()),
        text: Some(serde_json::to_string_pretty(body).unwrap_or_else(|_| body.to_string())),
    }
}
