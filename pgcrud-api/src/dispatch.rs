//! Dispatch Core
//!
//! One pipeline per operation:
//!
//! ```text
//! resolve entity → permit(namespace, access) → validate → build SQL →
//! choose pool → execute → shape response / classify error
//! ```
//!
//! Everything up to the execution step is deterministic and
//! side-effect-free. Reads go to the replica pool when one is configured;
//! writes always go to the primary. Both the REST handlers and the MCP
//! tool surface call into these functions, so the two surfaces cannot
//! drift apart.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use pgcrud_core::{AccessMode, Entity, TokenClaims};
use pgcrud_sql::{
    build_bulk_insert, build_count, build_delete, build_insert, build_list, build_read_by_key,
    build_update, page_window, ListParams, SqlStatement, WritePayload,
};

use crate::error::{classify_db_error, ApiError, ApiResult};
use crate::rows::{row_to_json, rows_to_json};
use crate::state::AppState;

// ============================================================================
// RESPONSE ENVELOPES
// ============================================================================

/// Pagination block of the list envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Pagination {
    pub page: i64,
    pub page_size: i64,
    pub total: i64,
    pub total_pages: i64,
}

/// List response: rows plus pagination.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ListEnvelope {
    #[cfg_attr(feature = "openapi", schema(value_type = Vec<Object>))]
    pub data: Vec<JsonValue>,
    pub pagination: Pagination,
}

/// Result of a create operation: one row or a bulk batch.
#[derive(Debug, Clone)]
pub enum CreateResult {
    Single(JsonValue),
    Bulk(BulkEnvelope),
}

/// Bulk create response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct BulkEnvelope {
    #[cfg_attr(feature = "openapi", schema(value_type = Vec<Object>))]
    pub data: Vec<JsonValue>,
    pub count: usize,
}

/// Delete response, conveying whether the soft-delete path was taken.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct DeleteEnvelope {
    pub deleted: bool,
    pub soft_delete: bool,
    #[cfg_attr(feature = "openapi", schema(value_type = Object))]
    pub record: JsonValue,
}

// ============================================================================
// PERMISSION CHECK
// ============================================================================

/// Enforce the caller's grant on the entity's namespace.
pub fn permit(claims: &TokenClaims, entity: &Entity, access: AccessMode) -> ApiResult<()> {
    if claims.permits(&entity.namespace, access) {
        Ok(())
    } else {
        Err(ApiError::permission_denied(format!(
            "No {} access to schema '{}'",
            access.label(),
            entity.namespace
        )))
    }
}

// ============================================================================
// OPERATIONS
// ============================================================================

/// List rows with filters, search, sorting, and pagination.
pub async fn list_records(
    state: &AppState,
    claims: &TokenClaims,
    entity: &Entity,
    params: &ListParams,
) -> ApiResult<ListEnvelope> {
    permit(claims, entity, AccessMode::Read)?;

    let list_stmt = build_list(entity, params, state.config.max_page_size)?;
    let count_stmt = build_count(entity, params)?;

    let conn = state.pools.read_conn().await?;
    let rows = execute_query(&conn, &list_stmt, state).await?;
    let total: i64 = execute_query_one(&conn, &count_stmt, state)
        .await?
        .get("total");

    let (page, page_size) = page_window(params, state.config.max_page_size);
    let total_pages = if total == 0 { 0 } else { (total + page_size - 1) / page_size };

    Ok(ListEnvelope {
        data: rows_to_json(&rows)?,
        pagination: Pagination { page, page_size, total, total_pages },
    })
}

/// Read one row by key. The key values arrive validated, in PK order.
pub async fn get_record(
    state: &AppState,
    claims: &TokenClaims,
    entity: &Entity,
    key_values: &[String],
) -> ApiResult<JsonValue> {
    permit(claims, entity, AccessMode::Read)?;

    let stmt = build_read_by_key(entity, key_values)?;
    let conn = state.pools.read_conn().await?;
    let row = execute_query_opt(&conn, &stmt, state)
        .await?
        .ok_or_else(|| ApiError::no_matching_row(&entity.route_segment()))?;

    row_to_json(&row)
}

/// Create one row or a bulk batch.
pub async fn create_records(
    state: &AppState,
    claims: &TokenClaims,
    entity: &Entity,
    payload: &WritePayload,
) -> ApiResult<CreateResult> {
    permit(claims, entity, AccessMode::Write)?;

    let conn = state.pools.write_conn().await?;
    match payload {
        WritePayload::Single(row) => {
            let stmt = build_insert(entity, row)?;
            let inserted = execute_query_one(&conn, &stmt, state).await?;
            Ok(CreateResult::Single(row_to_json(&inserted)?))
        }
        WritePayload::Bulk(rows) => {
            let stmt = build_bulk_insert(entity, rows, state.config.max_bulk_rows)?;
            let inserted = execute_query(&conn, &stmt, state).await?;
            let data = rows_to_json(&inserted)?;
            let count = data.len();
            Ok(CreateResult::Bulk(BulkEnvelope { data, count }))
        }
    }
}

/// Update one row by key (PUT and PATCH share this path: the SET list is
/// the payload's keys either way).
pub async fn update_record(
    state: &AppState,
    claims: &TokenClaims,
    entity: &Entity,
    key_values: &[String],
    row: &pgcrud_sql::PayloadRow,
) -> ApiResult<JsonValue> {
    permit(claims, entity, AccessMode::Write)?;

    let stmt = build_update(entity, key_values, row)?;
    let conn = state.pools.write_conn().await?;
    let updated = execute_query_opt(&conn, &stmt, state)
        .await?
        .ok_or_else(|| ApiError::no_matching_row(&entity.route_segment()))?;

    row_to_json(&updated)
}

/// Delete one row by key, soft when the entity carries `deleted_at`.
pub async fn delete_record(
    state: &AppState,
    claims: &TokenClaims,
    entity: &Entity,
    key_values: &[String],
) -> ApiResult<DeleteEnvelope> {
    permit(claims, entity, AccessMode::Write)?;

    let (stmt, soft_delete) = build_delete(entity, key_values)?;
    let conn = state.pools.write_conn().await?;
    let removed = execute_query_opt(&conn, &stmt, state)
        .await?
        .ok_or_else(|| ApiError::no_matching_row(&entity.route_segment()))?;

    Ok(DeleteEnvelope {
        deleted: true,
        soft_delete,
        record: row_to_json(&removed)?,
    })
}

// ============================================================================
// EXECUTION HELPERS
// ============================================================================

async fn execute_query(
    conn: &deadpool_postgres::Object,
    stmt: &SqlStatement,
    state: &AppState,
) -> ApiResult<Vec<tokio_postgres::Row>> {
    conn.query(stmt.text.as_str(), &stmt.param_refs())
        .await
        .map_err(|e| classify_db_error(&e, state.config.expose_db_errors))
}

async fn execute_query_one(
    conn: &deadpool_postgres::Object,
    stmt: &SqlStatement,
    state: &AppState,
) -> ApiResult<tokio_postgres::Row> {
    conn.query_one(stmt.text.as_str(), &stmt.param_refs())
        .await
        .map_err(|e| classify_db_error(&e, state.config.expose_db_errors))
}

async fn execute_query_opt(
    conn: &deadpool_postgres::Object,
    stmt: &SqlStatement,
    state: &AppState,
) -> ApiResult<Option<tokio_postgres::Row>> {
    conn.query_opt(stmt.text.as_str(), &stmt.param_refs())
        .await
        .map_err(|e| classify_db_error(&e, state.config.expose_db_errors))
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use pgcrud_core::{Column, Grant};

    fn entity(namespace: &str) -> Entity {
        Entity {
            namespace: namespace.to_string(),
            name: "t".to_string(),
            columns: vec![Column {
                name: "id".to_string(),
                sql_type_tag: "int4".to_string(),
                declared_type: "integer".to_string(),
                nullable: false,
                has_default: true,
                default_text: Some("nextval".to_string()),
                max_text_length: None,
                ordinal_position: 1,
            }],
            primary_key_columns: vec!["id".to_string()],
            foreign_keys: vec![],
        }
    }

    #[test]
    fn test_permit_full_access() {
        let claims = TokenClaims::FullAccess;
        assert!(permit(&claims, &entity("public"), AccessMode::Read).is_ok());
        assert!(permit(&claims, &entity("reporting"), AccessMode::Write).is_ok());
    }

    #[test]
    fn test_permit_scoped_denial_names_namespace() {
        let claims = TokenClaims::Scoped(
            [("public".to_string(), Grant::ReadWrite)].into_iter().collect(),
        );
        let err = permit(&claims, &entity("reporting"), AccessMode::Read).unwrap_err();
        assert_eq!(err.status_code(), axum::http::StatusCode::FORBIDDEN);
        assert!(err.message.contains("reporting"));
        assert!(err.message.contains("read"));
    }

    #[test]
    fn test_delete_envelope_shape() {
        let envelope = DeleteEnvelope {
            deleted: true,
            soft_delete: true,
            record: serde_json::json!({"id": 5}),
        };
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["deleted"], true);
        assert_eq!(json["soft_delete"], true);
        assert_eq!(json["record"]["id"], 5);
    }

    #[test]
    fn test_pagination_total_pages() {
        // Mirrors the arithmetic in list_records.
        let cases = [(0i64, 5i64, 0i64), (1, 5, 1), (5, 5, 1), (6, 5, 2), (11, 5, 3)];
        for (total, page_size, expected) in cases {
            let total_pages = if total == 0 { 0 } else { (total + page_size - 1) / page_size };
            assert_eq!(total_pages, expected, "total={total} page_size={page_size}");
        }
    }
}
