//! Property-Based Tests for the Query Builder
//!
//! **Property 1: Injection safety.** For every operation and every
//! generated filter/search/select/payload, the emitted SQL text contains
//! no substring drawn from input values; all such substrings appear only
//! as parameter bindings.
//!
//! **Property 2: WHERE parity.** For any (filter, search) pair, the WHERE
//! clause of the list query and the count query are textually identical.
//!
//! **Property 3: Pagination clamping and sort fallback.**

use proptest::prelude::*;
use serde_json::{json, Value as JsonValue};

use pgcrud_core::{Column, Entity};
use pgcrud_sql::{
    build_bulk_insert, build_count, build_delete, build_insert, build_list, build_read_by_key,
    build_update, ListParams, SqlValue, MAX_IN_VALUES,
};

// ============================================================================
// FIXTURES AND STRATEGIES
// ============================================================================

fn column(name: &str, tag: &str, position: i32) -> Column {
    Column {
        name: name.to_string(),
        sql_type_tag: tag.to_string(),
        declared_type: tag.to_string(),
        nullable: true,
        has_default: false,
        default_text: None,
        max_text_length: None,
        ordinal_position: position,
    }
}

fn accounts() -> Entity {
    Entity {
        namespace: "public".to_string(),
        name: "accounts".to_string(),
        columns: vec![
            column("id", "int4", 1),
            column("name", "text", 2),
            column("email", "text", 3),
            column("balance", "numeric", 4),
            column("updated_at", "timestamptz", 5),
            column("deleted_at", "timestamptz", 6),
        ],
        primary_key_columns: vec!["id".to_string()],
        foreign_keys: vec![],
    }
}

/// Input strings weighted toward SQL metacharacters.
///
/// Random values are wrapped in `~` sentinels (a character the builder
/// never emits) so the leak check cannot collide with legitimate SQL
/// vocabulary like column names.
fn hostile_string() -> impl Strategy<Value = String> {
    prop_oneof![
        4 => proptest::string::string_regex("[a-zA-Z0-9'\";%_\\\\ .:,()=-]{1,24}")
            .expect("valid regex")
            .prop_map(|s| format!("~{s}~")),
        1 => Just("' OR '1'='1".to_string()),
        1 => Just("\"; DROP TABLE users; --".to_string()),
        1 => Just("~%_\\~".to_string()),
        1 => Just("1; SELECT pg_sleep(10)".to_string()),
    ]
}

fn known_column() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("id".to_string()),
        Just("name".to_string()),
        Just("email".to_string()),
        Just("balance".to_string()),
    ]
}

fn filter_op_token() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("eq".to_string()),
        Just("neq".to_string()),
        Just("gt".to_string()),
        Just("gte".to_string()),
        Just("lt".to_string()),
        Just("lte".to_string()),
        Just("like".to_string()),
        Just("ilike".to_string()),
    ]
}

/// A hostile value is considered "leaked" when it appears in statement
/// text despite being long enough that incidental overlap is implausible.
fn assert_not_in_text(text: &str, value: &str) {
    if value.len() >= 3 {
        assert!(
            !text.contains(value),
            "input value leaked into SQL text: {value:?} in {text:?}"
        );
    }
}

fn texts_of(params: &[SqlValue]) -> Vec<String> {
    params
        .iter()
        .filter_map(|p| match p {
            SqlValue::Text(s) => Some(s.clone()),
            _ => None,
        })
        .collect()
}

// ============================================================================
// INJECTION SAFETY
// ============================================================================

proptest! {
    #[test]
    fn prop_list_filters_never_reach_text(
        column in known_column(),
        op in filter_op_token(),
        value in hostile_string(),
        search in proptest::option::of(hostile_string()),
    ) {
        let entity = accounts();
        let params = ListParams {
            filters: vec![(column, format!("{op}:{value}"))],
            search,
            ..Default::default()
        };

        let stmt = build_list(&entity, &params, 100).unwrap();
        assert_not_in_text(&stmt.text, &value);

        // Every filter/search operand is present among the bound values.
        let bound = texts_of(&stmt.params);
        prop_assert!(bound.iter().any(|b| b == &value));
    }

    #[test]
    fn prop_in_list_values_bind(values in proptest::collection::vec(hostile_string(), 1..20)) {
        let entity = accounts();
        // Commas split the list, so strip them from the generated items.
        let items: Vec<String> =
            values.iter().map(|v| v.replace(',', "")).collect();
        let params = ListParams {
            filters: vec![("name".to_string(), format!("in:{}", items.join(",")))],
            ..Default::default()
        };

        let stmt = build_list(&entity, &params, 100).unwrap();
        for item in &items {
            assert_not_in_text(&stmt.text, item);
        }
        prop_assert_eq!(texts_of(&stmt.params).len(), items.len());
    }

    #[test]
    fn prop_write_payloads_never_reach_text(
        title in hostile_string(),
        body in hostile_string(),
        key in "[0-9]{1,8}",
    ) {
        let entity = accounts();
        let mut row = serde_json::Map::new();
        row.insert("name".to_string(), json!(title.clone()));
        row.insert("email".to_string(), json!(body.clone()));

        let insert = build_insert(&entity, &row).unwrap();
        assert_not_in_text(&insert.text, &title);
        assert_not_in_text(&insert.text, &body);

        let update = build_update(&entity, &[key.clone()], &row).unwrap();
        assert_not_in_text(&update.text, &title);
        assert_not_in_text(&update.text, &body);

        let bulk = build_bulk_insert(&entity, &[row.clone(), row.clone()], 10).unwrap();
        assert_not_in_text(&bulk.text, &title);

        let (delete, soft) = build_delete(&entity, &[key.clone()]).unwrap();
        prop_assert!(soft); // accounts carries deleted_at
        assert_not_in_text(&delete.text, &key);

        let read = build_read_by_key(&entity, &[key.clone()]).unwrap();
        assert_not_in_text(&read.text, &key);
    }

    #[test]
    fn prop_placeholders_match_param_count(
        value in hostile_string(),
        page in -5i64..50,
        page_size in -5i64..500,
    ) {
        let entity = accounts();
        let params = ListParams {
            filters: vec![("name".to_string(), format!("eq:{value}"))],
            search: Some(value.clone()),
            page,
            page_size,
            ..Default::default()
        };
        let stmt = build_list(&entity, &params, 100).unwrap();

        // The highest placeholder equals the number of bound values, and
        // every placeholder from $1 upward is present.
        for idx in 1..=stmt.params.len() {
            prop_assert!(stmt.text.contains(&format!("${}", idx)), "missing placeholder");
        }
        prop_assert!(!stmt.text.contains(&format!("${}", stmt.params.len() + 1)), "unexpected placeholder");
    }
}

// ============================================================================
// WHERE PARITY AND CLAMPING
// ============================================================================

proptest! {
    #[test]
    fn prop_where_parity(
        column in known_column(),
        op in filter_op_token(),
        value in hostile_string(),
        search in proptest::option::of(hostile_string()),
    ) {
        let entity = accounts();
        let params = ListParams {
            filters: vec![(column, format!("{op}:{value}"))],
            search,
            ..Default::default()
        };

        let list = build_list(&entity, &params, 100).unwrap();
        let count = build_count(&entity, &params).unwrap();

        let where_of = |sql: &str| {
            let start = sql.find(" WHERE ").expect("WHERE present");
            let rest = &sql[start..];
            let end = rest.find(" ORDER BY ").unwrap_or(rest.len());
            rest[..end].to_string()
        };
        prop_assert_eq!(where_of(&list.text), where_of(&count.text));
    }

    #[test]
    fn prop_pagination_clamps(page in -100i64..1000, page_size in -100i64..1000) {
        let entity = accounts();
        let max = 100i64;
        let params = ListParams { page, page_size, ..Default::default() };
        let stmt = build_list(&entity, &params, max).unwrap();

        let limit = match stmt.params[stmt.params.len() - 2] {
            SqlValue::Int(v) => v,
            ref other => panic!("limit should be an int, got {other:?}"),
        };
        let offset = match stmt.params[stmt.params.len() - 1] {
            SqlValue::Int(v) => v,
            ref other => panic!("offset should be an int, got {other:?}"),
        };

        prop_assert!((1..=max).contains(&limit));
        prop_assert!(offset >= 0);
        prop_assert_eq!(offset % limit, 0);
        if page < 1 {
            prop_assert_eq!(offset, 0);
        }
    }

    #[test]
    fn prop_sort_fallback(sort_by in proptest::option::of("[a-z]{1,12}")) {
        let entity = accounts();
        let params = ListParams { sort_by: sort_by.clone(), ..Default::default() };
        let stmt = build_list(&entity, &params, 100).unwrap();

        let expected = match sort_by.as_deref() {
            Some(name) if entity.has_column(name) => name.to_string(),
            // Unknown or omitted: first PK column.
            _ => "id".to_string(),
        };
        prop_assert!(stmt.text.contains(&format!("ORDER BY \"{}\" ASC", expected)), "missing order by clause");
    }
}

// ============================================================================
// IN-LIST BOUNDARY
// ============================================================================

#[test]
fn test_in_list_cap_boundary() {
    let entity = accounts();

    let hundred: Vec<String> = (0..MAX_IN_VALUES).map(|i| format!("v{i}")).collect();
    let params = ListParams {
        filters: vec![("name".to_string(), format!("in:{}", hundred.join(",")))],
        ..Default::default()
    };
    let stmt = build_list(&entity, &params, 100).unwrap();
    assert!(stmt.text.contains("\"name\" IN ($1,"));
    assert!(stmt.text.contains("$100)"));

    let overflow: Vec<String> = (0..=MAX_IN_VALUES).map(|i| format!("v{i}")).collect();
    let params = ListParams {
        filters: vec![("name".to_string(), format!("in:{}", overflow.join(",")))],
        ..Default::default()
    };
    assert!(build_list(&entity, &params, 100).is_err());
}

// ============================================================================
// AUTO-updated_at ACROSS OPERATIONS
// ============================================================================

#[test]
fn test_updated_at_literal_vs_bound() {
    let entity = accounts();

    let mut without = serde_json::Map::new();
    without.insert("name".to_string(), json!("a"));
    let stmt = build_insert(&entity, &without).unwrap();
    assert!(stmt.text.contains("NOW()"));

    let mut with = without.clone();
    with.insert("updated_at".to_string(), JsonValue::String("2024-01-01T00:00:00Z".into()));
    let stmt = build_insert(&entity, &with).unwrap();
    assert!(!stmt.text.contains("NOW()"));

    let stmt = build_update(&entity, &["1".to_string()], &without).unwrap();
    assert!(stmt.text.contains("\"updated_at\" = NOW()"));

    let stmt = build_update(&entity, &["1".to_string()], &with).unwrap();
    assert!(!stmt.text.contains("NOW()"));

    // Soft delete always stamps both timestamps.
    let (stmt, soft) = build_delete(&entity, &["1".to_string()]).unwrap();
    assert!(soft);
    assert!(stmt.text.contains("\"deleted_at\" = NOW(), \"updated_at\" = NOW()"));
}
