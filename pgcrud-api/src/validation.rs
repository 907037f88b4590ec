//! Request Validation
//!
//! Per-request shape checks performed before any SQL is built: list
//! parameter extraction (including the `filter.{column}` convention), key
//! segment parsing against the entity's PK arity, and write payload shape.
//! The validator never touches the database.

use serde_json::Value as JsonValue;

use pgcrud_core::{Entity, GatewayConfig, QueryBuildError};
use pgcrud_sql::{ListParams, WritePayload};

use crate::error::{ApiError, ApiResult};

// ============================================================================
// LIST PARAMETERS
// ============================================================================

/// Query parameter names recognized by list operations. Anything else
/// with a `filter.` prefix is a column filter; unrecognized keys are
/// ignored.
pub const PAGE_PARAM: &str = "page";
pub const PAGE_SIZE_PARAM: &str = "pageSize";
pub const SORT_BY_PARAM: &str = "sortBy";
pub const SORT_ORDER_PARAM: &str = "sortOrder";
pub const SELECT_PARAM: &str = "select";
pub const SEARCH_PARAM: &str = "search";
pub const SEARCH_COLUMNS_PARAM: &str = "searchColumns";
pub const FILTER_PREFIX: &str = "filter.";

/// Extract list parameters from raw query pairs.
///
/// Multiple `filter.*` pairs are kept in arrival order and AND-combined
/// by the builder. Values that fail to parse fall back to defaults; range
/// clamping itself happens in the builder.
pub fn parse_list_params(pairs: &[(String, String)], config: &GatewayConfig) -> ListParams {
    let mut params = ListParams {
        page: 1,
        page_size: config.default_page_size,
        ..ListParams::default()
    };

    for (key, value) in pairs {
        match key.as_str() {
            PAGE_PARAM => params.page = value.parse().unwrap_or(1),
            PAGE_SIZE_PARAM => {
                params.page_size = value.parse().unwrap_or(config.default_page_size)
            }
            SORT_BY_PARAM => params.sort_by = Some(value.clone()),
            SORT_ORDER_PARAM => params.descending = value.eq_ignore_ascii_case("desc"),
            SELECT_PARAM => params.select = Some(split_csv(value)),
            SEARCH_PARAM => params.search = Some(value.clone()),
            SEARCH_COLUMNS_PARAM => params.search_columns = Some(split_csv(value)),
            other => {
                if let Some(column) = other.strip_prefix(FILTER_PREFIX) {
                    params.filters.push((column.to_string(), value.clone()));
                }
            }
        }
    }

    params
}

fn split_csv(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}

// ============================================================================
// KEY SEGMENT
// ============================================================================

/// Parse the `{id}` path segment for a by-key operation.
///
/// Composite keys arrive as comma-joined values in PK order; exactly
/// `|pk|` non-empty parts are required.
///
/// # Errors
/// `ValidationFailed` naming the expected arity on a count mismatch or an
/// empty part, or when the entity has no primary key at all.
pub fn parse_key_segment(entity: &Entity, raw: &str) -> ApiResult<Vec<String>> {
    if !entity.supports_by_key() {
        return Err(QueryBuildError::NoPrimaryKey {
            entity: entity.route_segment(),
        }
        .into());
    }

    let parts: Vec<String> = raw.split(',').map(|p| p.to_string()).collect();
    let expected = entity.primary_key_columns.len();

    if parts.len() != expected {
        return Err(QueryBuildError::KeyArityMismatch {
            expected,
            got: parts.len(),
        }
        .into());
    }
    if parts.iter().any(|p| p.is_empty()) {
        return Err(QueryBuildError::EmptyKeyPart.into());
    }

    Ok(parts)
}

// ============================================================================
// WRITE PAYLOADS
// ============================================================================

/// Validate the shape of a write-side body.
///
/// Single-record operations require an object; bulk create additionally
/// accepts a non-empty array of objects bounded by `max_bulk_rows`.
pub fn parse_write_payload(
    body: JsonValue,
    allow_bulk: bool,
    max_bulk_rows: usize,
) -> ApiResult<WritePayload> {
    match body {
        JsonValue::Object(row) => Ok(WritePayload::Single(row)),
        JsonValue::Array(rows) if allow_bulk => {
            if rows.is_empty() {
                return Err(ApiError::validation_failed(
                    "Bulk payload must contain at least one row",
                ));
            }
            if rows.len() > max_bulk_rows {
                return Err(QueryBuildError::TooManyRows {
                    count: rows.len(),
                    max: max_bulk_rows,
                }
                .into());
            }
            let rows: Vec<_> = rows
                .into_iter()
                .map(|row| match row {
                    JsonValue::Object(map) => Ok(map),
                    _ => Err(ApiError::validation_failed(
                        "Every row in a bulk payload must be an object",
                    )),
                })
                .collect::<ApiResult<_>>()?;
            Ok(WritePayload::Bulk(rows))
        }
        JsonValue::Array(_) => Err(ApiError::validation_failed(
            "This operation expects a single object payload",
        )),
        _ => Err(ApiError::validation_failed(
            "Payload must be an object or an array of objects",
        )),
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use pgcrud_core::Column;
    use serde_json::json;

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn config() -> GatewayConfig {
        GatewayConfig {
            database_url: "postgres://localhost/app".to_string(),
            default_page_size: 25,
            ..Default::default()
        }
    }

    fn entity(pk: &[&str]) -> Entity {
        Entity {
            namespace: "public".to_string(),
            name: "user_roles".to_string(),
            columns: vec![
                Column {
                    name: "user_id".to_string(),
                    sql_type_tag: "int4".to_string(),
                    declared_type: "integer".to_string(),
                    nullable: false,
                    has_default: false,
                    default_text: None,
                    max_text_length: None,
                    ordinal_position: 1,
                },
                Column {
                    name: "role_id".to_string(),
                    sql_type_tag: "int4".to_string(),
                    declared_type: "integer".to_string(),
                    nullable: false,
                    has_default: false,
                    default_text: None,
                    max_text_length: None,
                    ordinal_position: 2,
                },
            ],
            primary_key_columns: pk.iter().map(|s| s.to_string()).collect(),
            foreign_keys: vec![],
        }
    }

    #[test]
    fn test_list_param_extraction() {
        let params = parse_list_params(
            &pairs(&[
                ("filter.name", "eq:Alice"),
                ("filter.age", "gte:30"),
                ("page", "2"),
                ("pageSize", "5"),
                ("sortBy", "name"),
                ("sortOrder", "DESC"),
                ("select", "id, name"),
                ("search", "ali"),
                ("searchColumns", "name,email"),
                ("unrelated", "ignored"),
            ]),
            &config(),
        );

        assert_eq!(
            params.filters,
            vec![
                ("name".to_string(), "eq:Alice".to_string()),
                ("age".to_string(), "gte:30".to_string()),
            ]
        );
        assert_eq!(params.page, 2);
        assert_eq!(params.page_size, 5);
        assert_eq!(params.sort_by.as_deref(), Some("name"));
        assert!(params.descending);
        assert_eq!(
            params.select,
            Some(vec!["id".to_string(), "name".to_string()])
        );
        assert_eq!(params.search.as_deref(), Some("ali"));
    }

    #[test]
    fn test_list_param_defaults() {
        let params = parse_list_params(&[], &config());
        assert_eq!(params.page, 1);
        assert_eq!(params.page_size, 25);
        assert!(!params.descending);
        assert!(params.filters.is_empty());
    }

    #[test]
    fn test_unparsable_numbers_fall_back() {
        let params = parse_list_params(&pairs(&[("page", "x"), ("pageSize", "y")]), &config());
        assert_eq!(params.page, 1);
        assert_eq!(params.page_size, 25);
    }

    #[test]
    fn test_key_segment_single() {
        let parts = parse_key_segment(&entity(&["user_id"]), "42").unwrap();
        assert_eq!(parts, vec!["42".to_string()]);
    }

    #[test]
    fn test_key_segment_composite() {
        let parts = parse_key_segment(&entity(&["user_id", "role_id"]), "42,7").unwrap();
        assert_eq!(parts, vec!["42".to_string(), "7".to_string()]);
    }

    #[test]
    fn test_key_segment_arity_mismatch() {
        // Composite PK addressed with a single value.
        let err = parse_key_segment(&entity(&["user_id", "role_id"]), "42").unwrap_err();
        assert!(err.message.contains("Composite primary key expects 2 values"));

        let err = parse_key_segment(&entity(&["user_id"]), "1,2").unwrap_err();
        assert!(err.message.contains("expects a single value"));
    }

    #[test]
    fn test_key_segment_empty_part() {
        let err = parse_key_segment(&entity(&["user_id", "role_id"]), "42,").unwrap_err();
        assert!(err.message.contains("non-empty"));
    }

    #[test]
    fn test_key_segment_without_pk() {
        let err = parse_key_segment(&entity(&[]), "42").unwrap_err();
        assert!(err.message.contains("no primary key"));
    }

    #[test]
    fn test_payload_shapes() {
        assert!(matches!(
            parse_write_payload(json!({"a": 1}), true, 10).unwrap(),
            WritePayload::Single(_)
        ));

        match parse_write_payload(json!([{"a": 1}, {"b": 2}]), true, 10).unwrap() {
            WritePayload::Bulk(rows) => assert_eq!(rows.len(), 2),
            other => panic!("expected bulk payload, got {other:?}"),
        }

        assert!(parse_write_payload(json!([]), true, 10).is_err());
        assert!(parse_write_payload(json!([1, 2]), true, 10).is_err());
        assert!(parse_write_payload(json!([{}, {}]), false, 10).is_err());
        assert!(parse_write_payload(json!("nope"), true, 10).is_err());

        let rows: Vec<JsonValue> = (0..11).map(|_| json!({})).collect();
        assert!(parse_write_payload(JsonValue::Array(rows), true, 10).is_err());
    }
}
