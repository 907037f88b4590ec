//! Filter Operator Grammar
//!
//! Filters arrive as `column → "op:value"` strings. If the prefix before
//! the first colon names a known operator it applies; otherwise the whole
//! string is an equality operand. Values are always bound as parameters;
//! only the operator token and the quoted column name reach statement text.

use pgcrud_core::{quote_ident, Entity, QueryBuildError};

use crate::value::SqlValue;

/// Maximum number of values accepted by an `in` filter.
pub const MAX_IN_VALUES: usize = 100;

// ============================================================================
// OPERATORS
// ============================================================================

/// A filter operator and its SQL realization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
    Like,
    Ilike,
    Is,
    In,
}

impl FilterOp {
    /// All operator tokens, as advertised by the capabilities envelope.
    pub const TOKENS: &'static [&'static str] =
        &["eq", "neq", "gt", "gte", "lt", "lte", "like", "ilike", "is", "in"];

    /// Parse an operator token.
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "eq" => Some(FilterOp::Eq),
            "neq" => Some(FilterOp::Neq),
            "gt" => Some(FilterOp::Gt),
            "gte" => Some(FilterOp::Gte),
            "lt" => Some(FilterOp::Lt),
            "lte" => Some(FilterOp::Lte),
            "like" => Some(FilterOp::Like),
            "ilike" => Some(FilterOp::Ilike),
            "is" => Some(FilterOp::Is),
            "in" => Some(FilterOp::In),
            _ => None,
        }
    }

    /// The SQL comparison token for binary operators.
    fn sql(&self) -> &'static str {
        match self {
            FilterOp::Eq => "=",
            FilterOp::Neq => "!=",
            FilterOp::Gt => ">",
            FilterOp::Gte => ">=",
            FilterOp::Lt => "<",
            FilterOp::Lte => "<=",
            FilterOp::Like => "LIKE",
            FilterOp::Ilike => "ILIKE",
            // Rendered specially in render_filter.
            FilterOp::Is | FilterOp::In => unreachable!("rendered without a comparison token"),
        }
    }
}

/// Split a raw filter value into operator and operand.
///
/// An unknown prefix means the entire value (colon included) is an
/// equality operand.
pub fn parse_filter_value(raw: &str) -> (FilterOp, &str) {
    if let Some((prefix, rest)) = raw.split_once(':') {
        if let Some(op) = FilterOp::parse(prefix) {
            return (op, rest);
        }
    }
    (FilterOp::Eq, raw)
}

// ============================================================================
// CLAUSE RENDERING
// ============================================================================

/// Render one filter as a SQL clause, appending its bound values.
///
/// Placeholder numbers continue from the current parameter count, so the
/// caller controls overall ordering.
///
/// # Errors
/// - unknown column (with the known column list)
/// - more than [`MAX_IN_VALUES`] items in an `in` list
/// - an `is` operand other than `null` / `notnull`
pub fn render_filter(
    entity: &Entity,
    column: &str,
    raw_value: &str,
    params: &mut Vec<SqlValue>,
) -> Result<String, QueryBuildError> {
    if !entity.has_column(column) {
        return Err(QueryBuildError::UnknownColumn {
            column: column.to_string(),
            known: entity.column_names().iter().map(|s| s.to_string()).collect(),
        });
    }

    let quoted = quote_ident(column);
    let (op, operand) = parse_filter_value(raw_value);

    match op {
        FilterOp::Is => match operand.to_ascii_lowercase().as_str() {
            "null" => Ok(format!("{quoted} IS NULL")),
            "notnull" => Ok(format!("{quoted} IS NOT NULL")),
            _ => Err(QueryBuildError::InvalidIsOperand { value: operand.to_string() }),
        },
        FilterOp::In => {
            let items: Vec<&str> = operand.split(',').collect();
            if items.len() > MAX_IN_VALUES {
                return Err(QueryBuildError::InListTooLong {
                    column: column.to_string(),
                    count: items.len(),
                    max: MAX_IN_VALUES,
                });
            }
            let placeholders: Vec<String> = items
                .into_iter()
                .map(|item| {
                    params.push(SqlValue::from(item));
                    format!("${}", params.len())
                })
                .collect();
            Ok(format!("{quoted} IN ({})", placeholders.join(", ")))
        }
        binary => {
            params.push(SqlValue::from(operand));
            Ok(format!("{quoted} {} ${}", binary.sql(), params.len()))
        }
    }
}

// ============================================================================
// SEARCH
// ============================================================================

/// Escape LIKE metacharacters in a search term.
///
/// The term is user text, not a pattern: `%`, `_`, and `\` are
/// backslash-escaped before the term is wrapped in percent signs.
pub fn escape_like_pattern(term: &str) -> String {
    let mut out = String::with_capacity(term.len());
    for ch in term.chars() {
        if ch == '%' || ch == '_' || ch == '\\' {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

// ============================================================================
// TESTS
// ============================================================================
