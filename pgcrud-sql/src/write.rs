//! Write-Side Query Building
//!
//! Insert, bulk insert, update, and delete statements. Payload keys are
//! intersected with the entity's columns (unknown keys silently drop);
//! `updated_at` and `deleted_at` receive automatic `NOW()` handling when
//! the entity carries them. Every statement terminates in `RETURNING *` so
//! the dispatch layer can shape the response from the affected row.

use serde_json::{Map, Value as JsonValue};

use pgcrud_core::{
    quote_ident, Entity, QueryBuildError, DELETED_AT_COLUMN, UPDATED_AT_COLUMN,
};

use crate::select::key_where;
use crate::value::SqlValue;
use crate::SqlStatement;

/// One write-payload row: column name → JSON value.
pub type PayloadRow = Map<String, JsonValue>;

/// A validated write payload.
///
/// Explicit JSON null and absent key are distinct: null binds SQL NULL,
/// absence omits the column (single insert) or NULL-fills it (bulk).
#[derive(Debug, Clone, PartialEq)]
pub enum WritePayload {
    Single(PayloadRow),
    Bulk(Vec<PayloadRow>),
}

// ============================================================================
// INSERT
// ============================================================================

/// Build a single-row insert.
///
/// Columns are the intersection of the payload's keys with the entity's
/// columns, in declared-column order. When the entity has an `updated_at`
/// column the payload omits, the literal `NOW()` is emitted for it (no
/// parameter consumed).
pub fn build_insert(entity: &Entity, row: &PayloadRow) -> Result<SqlStatement, QueryBuildError> {
    let columns: Vec<&str> = entity
        .columns
        .iter()
        .map(|c| c.name.as_str())
        .filter(|name| row.contains_key(*name))
        .collect();

    if columns.is_empty() {
        return Err(QueryBuildError::EmptyColumnSet);
    }

    let mut values = Vec::new();
    let mut column_sql: Vec<String> = Vec::new();
    let mut value_sql: Vec<String> = Vec::new();

    for column in &columns {
        column_sql.push(quote_ident(column));
        let json = &row[*column];
        values.push(SqlValue::from_json(json));
        value_sql.push(format!("${}", values.len()));
    }

    if entity.has_updated_at() && !row.contains_key(UPDATED_AT_COLUMN) {
        column_sql.push(quote_ident(UPDATED_AT_COLUMN));
        value_sql.push("NOW()".to_string());
    }

    let text = format!(
        "INSERT INTO {} ({}) VALUES ({}) RETURNING *",
        entity.qualified_identifier(),
        column_sql.join(", "),
        value_sql.join(", "),
    );

    Ok(SqlStatement { text, params: values })
}

/// Build a multi-row insert.
///
/// The column set is the union of all rows' keys restricted to entity
/// columns; a row that omits a column contributes a NULL parameter at that
/// position, except for `updated_at`, which auto-fills with `NOW()`.
pub fn build_bulk_insert(
    entity: &Entity,
    rows: &[PayloadRow],
    max_rows: usize,
) -> Result<SqlStatement, QueryBuildError> {
    if rows.is_empty() {
        return Err(QueryBuildError::EmptyRowSet);
    }
    if rows.len() > max_rows {
        return Err(QueryBuildError::TooManyRows { count: rows.len(), max: max_rows });
    }

    let mut columns: Vec<&str> = entity
        .columns
        .iter()
        .map(|c| c.name.as_str())
        .filter(|name| rows.iter().any(|row| row.contains_key(*name)))
        .collect();

    if columns.is_empty() {
        return Err(QueryBuildError::EmptyColumnSet);
    }

    if entity.has_updated_at() && !columns.contains(&UPDATED_AT_COLUMN) {
        columns.push(UPDATED_AT_COLUMN);
    }

    let mut values = Vec::new();
    let mut row_sql: Vec<String> = Vec::with_capacity(rows.len());

    for row in rows {
        let mut cell_sql: Vec<String> = Vec::with_capacity(columns.len());
        for column in &columns {
            match row.get(*column) {
                Some(json) => {
                    values.push(SqlValue::from_json(json));
                    cell_sql.push(format!("${}", values.len()));
                }
                None if *column == UPDATED_AT_COLUMN && entity.has_updated_at() => {
                    cell_sql.push("NOW()".to_string());
                }
                None => {
                    values.push(SqlValue::Null);
                    cell_sql.push(format!("${}", values.len()));
                }
            }
        }
        row_sql.push(format!("({})", cell_sql.join(", ")));
    }

    let column_sql: Vec<String> = columns.iter().map(|c| quote_ident(c)).collect();
    let text = format!(
        "INSERT INTO {} ({}) VALUES {} RETURNING *",
        entity.qualified_identifier(),
        column_sql.join(", "),
        row_sql.join(", "),
    );

    Ok(SqlStatement { text, params: values })
}

// ============================================================================
// UPDATE
// ============================================================================

/// Build a partial or full update by key.
///
/// The SET list is the payload's keys restricted to non-PK entity columns;
/// PK columns in the payload are silently dropped (they cannot be
/// modified). `updated_at` is appended as `NOW()` when the entity has it
/// and the payload does not.
pub fn build_update(
    entity: &Entity,
    key_values: &[String],
    row: &PayloadRow,
) -> Result<SqlStatement, QueryBuildError> {
    let mut values = Vec::new();
    let mut set_sql: Vec<String> = Vec::new();

    for column in &entity.columns {
        if entity.primary_key_columns.contains(&column.name) {
            continue;
        }
        if let Some(json) = row.get(&column.name) {
            values.push(SqlValue::from_json(json));
            set_sql.push(format!("{} = ${}", quote_ident(&column.name), values.len()));
        }
    }

    if set_sql.is_empty() {
        return Err(QueryBuildError::EmptyColumnSet);
    }

    if entity.has_updated_at() && !row.contains_key(UPDATED_AT_COLUMN) {
        set_sql.push(format!("{} = NOW()", quote_ident(UPDATED_AT_COLUMN)));
    }

    let where_clause = key_where(entity, key_values, &mut values)?;

    let text = format!(
        "UPDATE {} SET {} WHERE {where_clause} RETURNING *",
        entity.qualified_identifier(),
        set_sql.join(", "),
    );

    Ok(SqlStatement { text, params: values })
}

// ============================================================================
// DELETE
// ============================================================================

/// Build a delete by key, returning the statement and whether it is a
/// soft delete.
///
/// Entities with a `deleted_at` column get an UPDATE that stamps
/// `deleted_at` (and `updated_at` when present); everything else gets a
/// plain DELETE. Both return the affected row.
pub fn build_delete(
    entity: &Entity,
    key_values: &[String],
) -> Result<(SqlStatement, bool), QueryBuildError> {
    let mut values = Vec::new();

    if entity.has_deleted_at() {
        let mut set_sql = vec![format!("{} = NOW()", quote_ident(DELETED_AT_COLUMN))];
        if entity.has_updated_at() {
            set_sql.push(format!("{} = NOW()", quote_ident(UPDATED_AT_COLUMN)));
        }
        let where_clause = key_where(entity, key_values, &mut values)?;
        let text = format!(
            "UPDATE {} SET {} WHERE {where_clause} RETURNING *",
            entity.qualified_identifier(),
            set_sql.join(", "),
        );
        Ok((SqlStatement { text, params: values }, true))
    } else {
        let where_clause = key_where(entity, key_values, &mut values)?;
        let text = format!(
            "DELETE FROM {} WHERE {where_clause} RETURNING *",
            entity.qualified_identifier(),
        );
        Ok((SqlStatement { text, params: values }, false))
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::{posts, users};
    use serde_json::json;

    fn row(pairs: &[(&str, JsonValue)]) -> PayloadRow {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn test_insert_intersects_payload_with_columns() {
        let stmt = build_insert(
            &users(),
            &row(&[("name", json!("Alice")), ("ghost", json!("dropped"))]),
        )
        .unwrap();
        assert_eq!(
            stmt.text,
            "INSERT INTO \"public\".\"users\" (\"name\") VALUES ($1) RETURNING *"
        );
        assert_eq!(stmt.params, vec![SqlValue::Text("Alice".to_string())]);
    }

    #[test]
    fn test_insert_rejects_empty_column_set() {
        let err = build_insert(&users(), &row(&[("ghost", json!(1))])).unwrap_err();
        assert_eq!(err, QueryBuildError::EmptyColumnSet);
    }

    #[test]
    fn test_insert_auto_updated_at() {
        // posts has updated_at; the payload omits it → literal NOW().
        let stmt = build_insert(&posts(), &row(&[("title", json!("hi"))])).unwrap();
        assert_eq!(
            stmt.text,
            "INSERT INTO \"public\".\"posts\" (\"title\", \"updated_at\") \
             VALUES ($1, NOW()) RETURNING *"
        );
        assert_eq!(stmt.params.len(), 1);

        // The payload provides updated_at → bound parameter, no literal.
        let stmt = build_insert(
            &posts(),
            &row(&[("title", json!("hi")), ("updated_at", json!("2024-01-01T00:00:00Z"))]),
        )
        .unwrap();
        assert!(!stmt.text.contains("NOW()"));
        assert_eq!(stmt.params.len(), 2);
    }

    #[test]
    fn test_bulk_insert_union_columns_and_null_fill() {
        let rows = vec![
            row(&[("title", json!("a"))]),
            row(&[("body", json!("text"))]),
        ];
        let stmt = build_bulk_insert(&posts(), &rows, 1000).unwrap();
        assert_eq!(
            stmt.text,
            "INSERT INTO \"public\".\"posts\" (\"title\", \"body\", \"updated_at\") VALUES \
             ($1, $2, NOW()), ($3, $4, NOW()) RETURNING *"
        );
        assert_eq!(
            stmt.params,
            vec![
                SqlValue::Text("a".to_string()),
                SqlValue::Null,
                SqlValue::Null,
                SqlValue::Text("text".to_string()),
            ]
        );
    }

    #[test]
    fn test_bulk_insert_mixed_updated_at() {
        let rows = vec![
            row(&[("title", json!("a")), ("updated_at", json!("2024-06-01T00:00:00Z"))]),
            row(&[("title", json!("b"))]),
        ];
        let stmt = build_bulk_insert(&posts(), &rows, 1000).unwrap();
        // Row one binds its provided value; row two gets the literal.
        assert!(stmt.text.contains("($1, $2), ($3, NOW())"));
    }

    #[test]
    fn test_bulk_insert_caps_and_empty() {
        let err = build_bulk_insert(&posts(), &[], 1000).unwrap_err();
        assert_eq!(err, QueryBuildError::EmptyRowSet);

        let rows: Vec<PayloadRow> = (0..3).map(|i| row(&[("title", json!(i))])).collect();
        let err = build_bulk_insert(&posts(), &rows, 2).unwrap_err();
        assert_eq!(err, QueryBuildError::TooManyRows { count: 3, max: 2 });

        let rows = vec![row(&[("ghost", json!(1))])];
        let err = build_bulk_insert(&posts(), &rows, 1000).unwrap_err();
        assert_eq!(err, QueryBuildError::EmptyColumnSet);
    }

    #[test]
    fn test_update_drops_pk_and_stamps_updated_at() {
        let stmt = build_update(
            &posts(),
            &["5".to_string()],
            &row(&[("id", json!(99)), ("title", json!("new"))]),
        )
        .unwrap();
        assert_eq!(
            stmt.text,
            "UPDATE \"public\".\"posts\" SET \"title\" = $1, \"updated_at\" = NOW() \
             WHERE \"id\" = $2 RETURNING *"
        );
        assert_eq!(
            stmt.params,
            vec![SqlValue::Text("new".to_string()), SqlValue::Text("5".to_string())]
        );
    }

    #[test]
    fn test_update_with_explicit_updated_at() {
        let stmt = build_update(
            &posts(),
            &["5".to_string()],
            &row(&[("updated_at", json!("2024-06-01T00:00:00Z"))]),
        )
        .unwrap();
        assert!(!stmt.text.contains("NOW()"));
        assert_eq!(stmt.params.len(), 2);
    }

    #[test]
    fn test_update_pk_only_payload_is_empty_set() {
        let err = build_update(&posts(), &["5".to_string()], &row(&[("id", json!(1))]))
            .unwrap_err();
        assert_eq!(err, QueryBuildError::EmptyColumnSet);
    }

    #[test]
    fn test_soft_delete() {
        // posts carries both deleted_at and updated_at.
        let (stmt, soft) = build_delete(&posts(), &["5".to_string()]).unwrap();
        assert!(soft);
        assert_eq!(
            stmt.text,
            "UPDATE \"public\".\"posts\" SET \"deleted_at\" = NOW(), \"updated_at\" = NOW() \
             WHERE \"id\" = $1 RETURNING *"
        );
        assert_eq!(stmt.params, vec![SqlValue::Text("5".to_string())]);
    }

    #[test]
    fn test_hard_delete() {
        let (stmt, soft) = build_delete(&users(), &["7".to_string()]).unwrap();
        assert!(!soft);
        assert_eq!(
            stmt.text,
            "DELETE FROM \"public\".\"users\" WHERE \"id\" = $1 RETURNING *"
        );
    }

    #[test]
    fn test_explicit_null_binds_null() {
        let stmt = build_insert(&posts(), &row(&[("body", json!(null))])).unwrap();
        assert_eq!(stmt.params, vec![SqlValue::Null]);
        assert!(stmt.text.contains("\"body\""));
    }
}
