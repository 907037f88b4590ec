//! pgcrud SQL - Parameterized Query Builder
//!
//! Pure functions from the introspected schema model and a validated
//! request intent to parameterized SQL. Statements use positional
//! placeholders (`$1`, `$2`, …) numbered in the order values appear in the
//! text; no value of untrusted origin is ever concatenated into statement
//! text, and identifiers only enter it through the core quoting helper.

mod filter;
mod select;
mod value;
mod write;

pub use filter::{escape_like_pattern, parse_filter_value, render_filter, FilterOp, MAX_IN_VALUES};
pub use select::{build_count, build_list, build_read_by_key, page_window, ListParams};
pub use value::SqlValue;
pub use write::{
    build_bulk_insert, build_delete, build_insert, build_update, PayloadRow, WritePayload,
};

/// A SQL text with its ordered bound values.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlStatement {
    /// Statement text with positional placeholders
    pub text: String,
    /// Values bound in placeholder order
    pub params: Vec<SqlValue>,
}

impl SqlStatement {
    /// Borrow the parameters in the form `tokio_postgres` executes with.
    pub fn param_refs(&self) -> Vec<&(dyn postgres_types::ToSql + Sync)> {
        self.params
            .iter()
            .map(|p| p as &(dyn postgres_types::ToSql + Sync))
            .collect()
    }
}

// ============================================================================
// SHARED TEST FIXTURES
// ============================================================================

#[cfg(test)]
pub(crate) mod test_fixtures {
    use pgcrud_core::{Column, Entity};

    pub fn column(name: &str, tag: &str, position: i32) -> Column {
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

    /// `public.users (id int4 PK, name text, email text)`, the entity most
    /// list/filter tests are written against.
    pub fn users() -> Entity {
        Entity {
            namespace: "public".to_string(),
            name: "users".to_string(),
            columns: vec![
                column("id", "int4", 1),
                column("name", "text", 2),
                column("email", "text", 3),
            ],
            primary_key_columns: vec!["id".to_string()],
            foreign_keys: vec![],
        }
    }

    /// `public.posts` with both timestamp columns, for the soft-delete and
    /// auto-`updated_at` tests.
    pub fn posts() -> Entity {
        Entity {
            namespace: "public".to_string(),
            name: "posts".to_string(),
            columns: vec![
                column("id", "int4", 1),
                column("title", "text", 2),
                column("body", "text", 3),
                column("updated_at", "timestamptz", 4),
                column("deleted_at", "timestamptz", 5),
            ],
            primary_key_columns: vec!["id".to_string()],
            foreign_keys: vec![],
        }
    }

    /// Composite-keyed join table.
    pub fn composite_keyed() -> Entity {
        Entity {
            namespace: "public".to_string(),
            name: "user_roles".to_string(),
            columns: vec![
                column("user_id", "int4", 1),
                column("role_id", "int4", 2),
                column("granted_at", "timestamptz", 3),
            ],
            primary_key_columns: vec!["user_id".to_string(), "role_id".to_string()],
            foreign_keys: vec![],
        }
    }

    /// PK-less table (sort falls back to the first declared column; by-key
    /// operations are unavailable).
    pub fn pkless() -> Entity {
        Entity {
            namespace: "reporting".to_string(),
            name: "daily_metrics".to_string(),
            columns: vec![column("day", "date", 1), column("value", "numeric", 2)],
            primary_key_columns: vec![],
            foreign_keys: vec![],
        }
    }
}
