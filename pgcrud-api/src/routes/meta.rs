//! Surface Schema Emitter
//!
//! Produces the machine-readable self-description: per-entity table
//! descriptors (allowed operations, typed columns, foreign keys with
//! computed reference paths, searchable columns) and the API capabilities
//! envelope. Served under `/api/_meta/tables` and `/api/_schema`, and
//! reused verbatim by the MCP `describe_table` tool and resources.
//!
//! Meta listings are filtered by the caller's claims: a namespace the
//! credential cannot see contributes no tables.

use axum::{
    extract::{Path, State},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use pgcrud_core::{Entity, GatewayConfig, StringFormat, TokenClaims};
use pgcrud_sql::FilterOp;

use crate::auth::TOKEN_PREFIX;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use crate::validation::{
    FILTER_PREFIX, PAGE_PARAM, PAGE_SIZE_PARAM, SEARCH_COLUMNS_PARAM, SEARCH_PARAM, SELECT_PARAM,
    SORT_BY_PARAM, SORT_ORDER_PARAM,
};

// ============================================================================
// DESCRIPTORS
// ============================================================================

/// One column in the emitted table description.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ColumnDescriptor {
    pub name: String,
    /// Portable JSON type name
    #[serde(rename = "type")]
    pub type_name: String,
    /// Format refinement for string types
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<StringFormat>,
    /// Nullability marker; absent for opaque structured columns, which
    /// are already unconstrained
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nullable: Option<bool>,
    pub has_default: bool,
    pub primary_key: bool,
    /// A value must be supplied on insert (non-nullable, no default)
    pub insert_required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<i32>,
}

/// Referenced coordinates of a foreign key.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ForeignKeyTarget {
    pub namespace: String,
    pub table: String,
    pub column: String,
}

/// One foreign key in the emitted table description.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ForeignKeyDescriptor {
    pub constraint: String,
    pub column: String,
    pub references: ForeignKeyTarget,
    /// Canonical path of the referenced table, by the same derivation
    /// rule as the owning entity's route segment
    pub ref_path: String,
}

/// The agent- and documentation-facing view of one entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct TableDescriptor {
    pub name: String,
    pub namespace: String,
    /// Canonical REST path
    pub path: String,
    /// Allowed operations: `list` and `create` always; by-key operations
    /// only when the entity has a primary key
    pub operations: Vec<String>,
    pub primary_key: Vec<String>,
    pub columns: Vec<ColumnDescriptor>,
    pub foreign_keys: Vec<ForeignKeyDescriptor>,
    pub searchable_columns: Vec<String>,
}

/// Build the descriptor for one entity.
pub fn describe_entity(entity: &Entity) -> TableDescriptor {
    let mut operations = vec!["list".to_string(), "create".to_string()];
    if entity.supports_by_key() {
        for op in ["read", "update", "replace", "delete"] {
            operations.push(op.to_string());
        }
    }

    let columns = entity
        .columns
        .iter()
        .map(|column| {
            let portable = column.portable_type();
            ColumnDescriptor {
                name: column.name.clone(),
                type_name: portable.type_name().to_string(),
                format: portable.format(),
                nullable: if portable.is_structured() { None } else { Some(column.nullable) },
                has_default: column.has_default,
                primary_key: entity.primary_key_columns.contains(&column.name),
                insert_required: column.insert_required(),
                max_length: column.max_text_length,
            }
        })
        .collect();

    let foreign_keys = entity
        .foreign_keys
        .iter()
        .map(|fk| ForeignKeyDescriptor {
            constraint: fk.constraint_name.clone(),
            column: fk.column.clone(),
            references: ForeignKeyTarget {
                namespace: fk.referenced_namespace.clone(),
                table: fk.referenced_table.clone(),
                column: fk.referenced_column.clone(),
            },
            ref_path: format!("/api/{}", fk.referenced_route_segment()),
        })
        .collect();

    TableDescriptor {
        name: entity.name.clone(),
        namespace: entity.namespace.clone(),
        path: format!("/api/{}", entity.route_segment()),
        operations,
        primary_key: entity.primary_key_columns.clone(),
        columns,
        foreign_keys,
        searchable_columns: entity
            .searchable_columns()
            .iter()
            .map(|s| s.to_string())
            .collect(),
    }
}

// ============================================================================
// CAPABILITIES ENVELOPE
// ============================================================================

/// The API capabilities advertised to documentation and agents.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Capabilities {
    pub base_path: String,
    pub auth: AuthCapabilities,
    pub pagination: PaginationCapabilities,
    pub filters: FilterCapabilities,
    pub sort_by_param: String,
    pub sort_order_param: String,
    pub search_param: String,
    pub search_columns_param: String,
    pub select_param: String,
    pub max_bulk_rows: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct AuthCapabilities {
    pub enabled: bool,
    pub header: String,
    pub alternate_header: String,
    pub token_prefix: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct PaginationCapabilities {
    pub page_param: String,
    pub page_size_param: String,
    pub default_page_size: i64,
    pub max_page_size: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct FilterCapabilities {
    pub param_prefix: String,
    pub operators: Vec<String>,
}

/// Build the capabilities envelope from configuration.
pub fn capabilities(config: &GatewayConfig) -> Capabilities {
    Capabilities {
        base_path: "/api".to_string(),
        auth: AuthCapabilities {
            enabled: config.auth_enabled,
            header: "Authorization: Bearer".to_string(),
            alternate_header: "X-API-Key".to_string(),
            token_prefix: TOKEN_PREFIX.to_string(),
        },
        pagination: PaginationCapabilities {
            page_param: PAGE_PARAM.to_string(),
            page_size_param: PAGE_SIZE_PARAM.to_string(),
            default_page_size: config.default_page_size,
            max_page_size: config.max_page_size,
        },
        filters: FilterCapabilities {
            param_prefix: FILTER_PREFIX.to_string(),
            operators: FilterOp::TOKENS.iter().map(|s| s.to_string()).collect(),
        },
        sort_by_param: SORT_BY_PARAM.to_string(),
        sort_order_param: SORT_ORDER_PARAM.to_string(),
        search_param: SEARCH_PARAM.to_string(),
        search_columns_param: SEARCH_COLUMNS_PARAM.to_string(),
        select_param: SELECT_PARAM.to_string(),
        max_bulk_rows: config.max_bulk_rows,
    }
}

// ============================================================================
// HANDLERS
// ============================================================================

/// Resolve a segment, enforcing visibility for meta surfaces.
fn resolve_visible<'a>(
    state: &'a AppState,
    claims: &TokenClaims,
    segment: &str,
) -> ApiResult<&'a Entity> {
    let entity = state
        .model
        .entity_by_segment(segment)
        .ok_or_else(|| ApiError::unknown_table(segment))?;
    if !claims.can_see(&entity.namespace) {
        return Err(ApiError::permission_denied(format!(
            "No access to schema '{}'",
            entity.namespace
        )));
    }
    Ok(entity)
}

/// GET /api/_meta/tables
pub async fn list_tables(
    State(state): State<AppState>,
    Extension(claims): Extension<TokenClaims>,
) -> Json<Vec<TableDescriptor>> {
    let tables: Vec<TableDescriptor> = state
        .model
        .entities()
        .filter(|entity| claims.can_see(&entity.namespace))
        .map(describe_entity)
        .collect();
    Json(tables)
}

/// GET /api/_meta/tables/{segment}
pub async fn get_table(
    State(state): State<AppState>,
    Extension(claims): Extension<TokenClaims>,
    Path(segment): Path<String>,
) -> ApiResult<Json<TableDescriptor>> {
    let entity = resolve_visible(&state, &claims, &segment)?;
    Ok(Json(describe_entity(entity)))
}

/// GET /api/_schema
pub async fn schema_dump(
    State(state): State<AppState>,
    Extension(claims): Extension<TokenClaims>,
) -> Json<JsonValue> {
    let tables: Vec<TableDescriptor> = state
        .model
        .entities()
        .filter(|entity| claims.can_see(&entity.namespace))
        .map(describe_entity)
        .collect();
    let namespaces: Vec<&String> = state
        .model
        .namespaces()
        .iter()
        .filter(|ns| claims.can_see(ns))
        .collect();

    Json(serde_json::json!({
        "database_hash": state.model.digest(),
        "namespaces": namespaces,
        "tables": tables,
        "capabilities": capabilities(&state.config),
    }))
}

/// GET /api/_schema/{segment}
pub async fn schema_table(
    State(state): State<AppState>,
    Extension(claims): Extension<TokenClaims>,
    Path(segment): Path<String>,
) -> ApiResult<Json<JsonValue>> {
    let entity = resolve_visible(&state, &claims, &segment)?;
    Ok(Json(serde_json::json!({
        "table": describe_entity(entity),
        "capabilities": capabilities(&state.config),
    })))
}

// ============================================================================
// TESTS
// ============================================================================
