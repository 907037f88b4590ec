//! Read-Side Query Building
//!
//! List, count, and read-by-key statements. The list and count builders
//! share one WHERE assembler so their clauses are textually identical over
//! the same bound values; pagination totals computed from the count query
//! are therefore always consistent with the page contents.

use pgcrud_core::{quote_ident, Entity, QueryBuildError};

use crate::filter::{escape_like_pattern, render_filter};
use crate::value::SqlValue;
use crate::SqlStatement;

// ============================================================================
// LIST PARAMETERS
// ============================================================================

/// Validated list-operation parameters.
///
/// The request validator fills defaults before handing this to the
/// builder; the builder still clamps pagination so it is safe on any
/// input.
#[derive(Debug, Clone)]
pub struct ListParams {
    /// `column → raw "op:value"` pairs, AND-combined in order
    pub filters: Vec<(String, String)>,
    /// 1-based page number; clamped to at least 1
    pub page: i64,
    /// Page size; clamped to `[1, max_page_size]`
    pub page_size: i64,
    /// Requested sort column; unknown names fall back to the default
    pub sort_by: Option<String>,
    /// Sort direction; ascending unless explicitly descending
    pub descending: bool,
    /// Requested projection; `None` means all columns
    pub select: Option<Vec<String>>,
    /// Search term applied across searchable columns
    pub search: Option<String>,
    /// Explicit search column restriction
    pub search_columns: Option<Vec<String>>,
}

impl Default for ListParams {
    fn default() -> Self {
        Self {
            filters: Vec::new(),
            page: 1,
            page_size: 25,
            sort_by: None,
            descending: false,
            select: None,
            search: None,
            search_columns: None,
        }
    }
}

/// The effective `(page, page_size)` after clamping: `page ≥ 1`,
/// `page_size ∈ [1, max_page_size]`. The list builder and the response
/// envelope both derive pagination from this.
pub fn page_window(params: &ListParams, max_page_size: i64) -> (i64, i64) {
    (params.page.max(1), params.page_size.clamp(1, max_page_size.max(1)))
}

// ============================================================================
// WHERE ASSEMBLY (shared by list and count)
// ============================================================================

/// Build the WHERE clause text (including the leading ` WHERE `), pushing
/// bound values in clause order. Returns an empty string when no filter or
/// search applies.
fn build_where(
    entity: &Entity,
    params: &ListParams,
    values: &mut Vec<SqlValue>,
) -> Result<String, QueryBuildError> {
    let mut clauses = Vec::new();

    for (column, raw) in &params.filters {
        clauses.push(render_filter(entity, column, raw, values)?);
    }

    if let Some(term) = params.search.as_deref() {
        if let Some(clause) = build_search_clause(entity, term, params.search_columns.as_deref(), values) {
            clauses.push(clause);
        }
    }

    if clauses.is_empty() {
        Ok(String::new())
    } else {
        Ok(format!(" WHERE {}", clauses.join(" AND ")))
    }
}

/// Build the search disjunction across searchable columns.
///
/// An explicit column list restricts the searched set; names that do not
/// exist are silently skipped. When no searchable column remains the
/// search is dropped entirely.
fn build_search_clause(
    entity: &Entity,
    term: &str,
    restrict_to: Option<&[String]>,
    values: &mut Vec<SqlValue>,
) -> Option<String> {
    let columns: Vec<&str> = match restrict_to {
        Some(requested) => requested
            .iter()
            .filter(|name| entity.has_column(name))
            .map(|name| name.as_str())
            .collect(),
        None => entity.searchable_columns(),
    };

    if columns.is_empty() {
        return None;
    }

    let pattern = format!("%{}%", escape_like_pattern(term));
    let parts: Vec<String> = columns
        .into_iter()
        .map(|column| {
            values.push(SqlValue::Text(pattern.clone()));
            format!("{}::text ILIKE ${}", quote_ident(column), values.len())
        })
        .collect();

    Some(format!("({})", parts.join(" OR ")))
}

// ============================================================================
// LIST QUERY
// ============================================================================

/// Build the page query for a list operation.
///
/// # Errors
/// Unknown filter columns and over-long `in` lists propagate from the
/// filter grammar; an explicit projection in which no column exists fails
/// with [`QueryBuildError::EmptySelection`].
pub fn build_list(
    entity: &Entity,
    params: &ListParams,
    max_page_size: i64,
) -> Result<SqlStatement, QueryBuildError> {
    let mut values = Vec::new();

    let projection = build_projection(entity, params.select.as_deref())?;
    let where_clause = build_where(entity, params, &mut values)?;
    let order_by = build_order_by(entity, params);

    let (page, page_size) = page_window(params, max_page_size);
    let offset = (page - 1) * page_size;

    values.push(SqlValue::Int(page_size));
    let limit_ph = values.len();
    values.push(SqlValue::Int(offset));
    let offset_ph = values.len();

    let text = format!(
        "SELECT {projection} FROM {}{where_clause}{order_by} LIMIT ${limit_ph} OFFSET ${offset_ph}",
        entity.qualified_identifier(),
    );

    Ok(SqlStatement { text, params: values })
}

/// Build the count query sharing the list query's WHERE clause.
pub fn build_count(entity: &Entity, params: &ListParams) -> Result<SqlStatement, QueryBuildError> {
    let mut values = Vec::new();
    let where_clause = build_where(entity, params, &mut values)?;

    let text = format!(
        "SELECT COUNT(*) AS total FROM {}{where_clause}",
        entity.qualified_identifier(),
    );

    Ok(SqlStatement { text, params: values })
}

fn build_projection(
    entity: &Entity,
    select: Option<&[String]>,
) -> Result<String, QueryBuildError> {
    match select {
        None => Ok("*".to_string()),
        Some(requested) => {
            let kept: Vec<String> = requested
                .iter()
                .filter(|name| entity.has_column(name))
                .map(|name| quote_ident(name))
                .collect();
            if kept.is_empty() {
                return Err(QueryBuildError::EmptySelection {
                    known: entity.column_names().iter().map(|s| s.to_string()).collect(),
                });
            }
            Ok(kept.join(", "))
        }
    }
}

fn build_order_by(entity: &Entity, params: &ListParams) -> String {
    let column = params
        .sort_by
        .as_deref()
        .filter(|name| entity.has_column(name))
        .or_else(|| entity.default_sort_column());

    match column {
        Some(column) => {
            let direction = if params.descending { "DESC" } else { "ASC" };
            format!(" ORDER BY {} {direction}", quote_ident(column))
        }
        None => String::new(),
    }
}

// ============================================================================
// READ BY KEY
// ============================================================================

/// Build the WHERE fragment over all PK columns, pushing key values in PK
/// order. Shared with the write-side builders.
pub(crate) fn key_where(
    entity: &Entity,
    key_values: &[String],
    values: &mut Vec<SqlValue>,
) -> Result<String, QueryBuildError> {
    if entity.primary_key_columns.is_empty() {
        return Err(QueryBuildError::NoPrimaryKey {
            entity: entity.route_segment(),
        });
    }
    if key_values.len() != entity.primary_key_columns.len() {
        return Err(QueryBuildError::KeyArityMismatch {
            expected: entity.primary_key_columns.len(),
            got: key_values.len(),
        });
    }
    if key_values.iter().any(|value| value.is_empty()) {
        return Err(QueryBuildError::EmptyKeyPart);
    }

    let clauses: Vec<String> = entity
        .primary_key_columns
        .iter()
        .zip(key_values)
        .map(|(column, value)| {
            values.push(SqlValue::Text(value.clone()));
            format!("{} = ${}", quote_ident(column), values.len())
        })
        .collect();

    Ok(clauses.join(" AND "))
}

/// Build the single-row read for a by-key operation.
///
/// The caller supplies all PK values in PK order.
pub fn build_read_by_key(
    entity: &Entity,
    key_values: &[String],
) -> Result<SqlStatement, QueryBuildError> {
    let mut values = Vec::new();
    let where_clause = key_where(entity, key_values, &mut values)?;

    let text = format!(
        "SELECT * FROM {} WHERE {where_clause} LIMIT 1",
        entity.qualified_identifier(),
    );

    Ok(SqlStatement { text, params: values })
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::{composite_keyed, pkless, users};

    #[test]
    fn test_list_with_filter_and_pagination() {
        // ?filter.name=eq:Alice&page=2&pageSize=5
        let params = ListParams {
            filters: vec![("name".to_string(), "eq:Alice".to_string())],
            page: 2,
            page_size: 5,
            ..Default::default()
        };
        let stmt = build_list(&users(), &params, 200).unwrap();
        assert_eq!(
            stmt.text,
            "SELECT * FROM \"public\".\"users\" WHERE \"name\" = $1 \
             ORDER BY \"id\" ASC LIMIT $2 OFFSET $3"
        );
        assert_eq!(
            stmt.params,
            vec![
                SqlValue::Text("Alice".to_string()),
                SqlValue::Int(5),
                SqlValue::Int(5),
            ]
        );
    }

    #[test]
    fn test_pagination_clamping() {
        let entity = users();

        // page < 1 => offset 0
        let params = ListParams { page: 0, page_size: 10, ..Default::default() };
        let stmt = build_list(&entity, &params, 200).unwrap();
        assert_eq!(stmt.params, vec![SqlValue::Int(10), SqlValue::Int(0)]);

        // pageSize > max => limit = max
        let params = ListParams { page: 1, page_size: 900, ..Default::default() };
        let stmt = build_list(&entity, &params, 200).unwrap();
        assert_eq!(stmt.params, vec![SqlValue::Int(200), SqlValue::Int(0)]);

        // pageSize < 1 => limit = 1
        let params = ListParams { page: 3, page_size: 0, ..Default::default() };
        let stmt = build_list(&entity, &params, 200).unwrap();
        assert_eq!(stmt.params, vec![SqlValue::Int(1), SqlValue::Int(2)]);
    }

    #[test]
    fn test_sort_fallback() {
        let entity = users();

        // Unknown sort column falls back to the first PK column.
        let params = ListParams { sort_by: Some("bogus".to_string()), ..Default::default() };
        let stmt = build_list(&entity, &params, 200).unwrap();
        assert!(stmt.text.contains("ORDER BY \"id\" ASC"));

        // Known column is honored, with direction.
        let params = ListParams {
            sort_by: Some("name".to_string()),
            descending: true,
            ..Default::default()
        };
        let stmt = build_list(&entity, &params, 200).unwrap();
        assert!(stmt.text.contains("ORDER BY \"name\" DESC"));

        // PK-less entity sorts by its first declared column.
        let stmt = build_list(&pkless(), &ListParams::default(), 200).unwrap();
        assert!(stmt.text.contains("ORDER BY \"day\" ASC"));
    }

    #[test]
    fn test_projection() {
        let entity = users();

        let params = ListParams {
            select: Some(vec!["name".to_string(), "ghost".to_string()]),
            ..Default::default()
        };
        let stmt = build_list(&entity, &params, 200).unwrap();
        assert!(stmt.text.starts_with("SELECT \"name\" FROM"));

        let params = ListParams {
            select: Some(vec!["ghost".to_string()]),
            ..Default::default()
        };
        let err = build_list(&entity, &params, 200).unwrap_err();
        assert!(matches!(err, QueryBuildError::EmptySelection { .. }));
    }

    #[test]
    fn test_search_escapes_metacharacters() {
        let entity = users();
        let params = ListParams {
            search: Some("50%_a\\b".to_string()),
            ..Default::default()
        };
        let stmt = build_list(&entity, &params, 200).unwrap();
        assert!(stmt.text.contains(
            "(\"name\"::text ILIKE $1 OR \"email\"::text ILIKE $2)"
        ));
        assert_eq!(
            stmt.params[0],
            SqlValue::Text("%50\\%\\_a\\\\b%".to_string())
        );
    }

    #[test]
    fn test_search_column_restriction() {
        let entity = users();

        // Unknown names silently drop out of an explicit list.
        let params = ListParams {
            search: Some("x".to_string()),
            search_columns: Some(vec!["email".to_string(), "ghost".to_string()]),
            ..Default::default()
        };
        let stmt = build_list(&entity, &params, 200).unwrap();
        assert!(stmt.text.contains("(\"email\"::text ILIKE $1)"));

        // No surviving column: the search is dropped.
        let params = ListParams {
            search: Some("x".to_string()),
            search_columns: Some(vec!["ghost".to_string()]),
            ..Default::default()
        };
        let stmt = build_list(&entity, &params, 200).unwrap();
        assert!(!stmt.text.contains("WHERE"));
    }

    #[test]
    fn test_where_parity_between_list_and_count() {
        let entity = users();
        let params = ListParams {
            filters: vec![
                ("name".to_string(), "like:Al%".to_string()),
                ("id".to_string(), "gte:10".to_string()),
            ],
            search: Some("smith".to_string()),
            ..Default::default()
        };

        let list = build_list(&entity, &params, 200).unwrap();
        let count = build_count(&entity, &params).unwrap();

        let list_where = extract_where(&list.text);
        let count_where = extract_where(&count.text);
        assert_eq!(list_where, count_where);

        // Bound values before LIMIT/OFFSET match the count query's values.
        assert_eq!(&list.params[..list.params.len() - 2], &count.params[..]);
    }

    fn extract_where(sql: &str) -> String {
        let start = sql.find(" WHERE ").expect("query has a WHERE clause");
        let rest = &sql[start..];
        let end = rest.find(" ORDER BY ").unwrap_or(rest.len());
        rest[..end].to_string()
    }

    #[test]
    fn test_read_by_key() {
        let stmt = build_read_by_key(&users(), &["42".to_string()]).unwrap();
        assert_eq!(
            stmt.text,
            "SELECT * FROM \"public\".\"users\" WHERE \"id\" = $1 LIMIT 1"
        );
        assert_eq!(stmt.params, vec![SqlValue::Text("42".to_string())]);
    }

    #[test]
    fn test_read_by_composite_key() {
        let stmt =
            build_read_by_key(&composite_keyed(), &["42".to_string(), "7".to_string()]).unwrap();
        assert_eq!(
            stmt.text,
            "SELECT * FROM \"public\".\"user_roles\" \
             WHERE \"user_id\" = $1 AND \"role_id\" = $2 LIMIT 1"
        );
    }

    #[test]
    fn test_read_by_key_arity_and_pk_errors() {
        let err = build_read_by_key(&composite_keyed(), &["42".to_string()]).unwrap_err();
        assert_eq!(err, QueryBuildError::KeyArityMismatch { expected: 2, got: 1 });

        let err = build_read_by_key(&pkless(), &["1".to_string()]).unwrap_err();
        assert!(matches!(err, QueryBuildError::NoPrimaryKey { .. }));

        let err = build_read_by_key(&users(), &[String::new()]).unwrap_err();
        assert_eq!(err, QueryBuildError::EmptyKeyPart);
    }
}
