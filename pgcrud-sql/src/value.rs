//! SQL Parameter Values
//!
//! [`SqlValue`] is the bound-parameter representation for all generated
//! statements. Values are encoded to Postgres in **text format** so the
//! server parses each parameter against the actual column type; this is
//! what lets untrusted scalar input (which always arrives as strings or
//! JSON) bind against int, uuid, timestamp, or json columns without the
//! gateway re-implementing every type's parser. Validation stays where it
//! belongs: in the database, at execute time.

use bytes::BytesMut;
use postgres_types::{to_sql_checked, Format, IsNull, Kind, ToSql, Type};
use serde_json::Value as JsonValue;

// ============================================================================
// SQL VALUE
// ============================================================================

/// A single bound parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    /// SQL NULL
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    /// Structured value (object or array) from a write payload
    Json(JsonValue),
}

impl SqlValue {
    /// Convert a JSON payload value into its bound representation.
    ///
    /// Explicit JSON null binds SQL NULL; scalars bind as themselves;
    /// arrays and objects stay structured and are rendered per target type
    /// at encode time.
    pub fn from_json(value: &JsonValue) -> Self {
        match value {
            JsonValue::Null => SqlValue::Null,
            JsonValue::Bool(b) => SqlValue::Bool(*b),
            JsonValue::Number(n) => {
                if let Some(i) = n.as_i64() {
                    SqlValue::Int(i)
                } else {
                    SqlValue::Float(n.as_f64().unwrap_or(0.0))
                }
            }
            JsonValue::String(s) => SqlValue::Text(s.clone()),
            other => SqlValue::Json(other.clone()),
        }
    }
}

impl From<&str> for SqlValue {
    fn from(s: &str) -> Self {
        SqlValue::Text(s.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(s: String) -> Self {
        SqlValue::Text(s)
    }
}

impl From<i64> for SqlValue {
    fn from(i: i64) -> Self {
        SqlValue::Int(i)
    }
}

// ============================================================================
// TEXT-FORMAT ENCODING
// ============================================================================

impl ToSql for SqlValue {
    fn to_sql(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> Result<IsNull, Box<dyn std::error::Error + Sync + Send>> {
        match self {
            SqlValue::Null => Ok(IsNull::Yes),
            SqlValue::Bool(b) => {
                out.extend_from_slice(if *b { b"true" } else { b"false" });
                Ok(IsNull::No)
            }
            SqlValue::Int(i) => {
                out.extend_from_slice(i.to_string().as_bytes());
                Ok(IsNull::No)
            }
            SqlValue::Float(f) => {
                out.extend_from_slice(float_text(*f).as_bytes());
                Ok(IsNull::No)
            }
            SqlValue::Text(s) => {
                out.extend_from_slice(s.as_bytes());
                Ok(IsNull::No)
            }
            SqlValue::Json(value) => {
                if value.is_null() {
                    return Ok(IsNull::Yes);
                }
                let rendered = match (value, ty.kind()) {
                    // JSON array bound to an array column: Postgres array
                    // literal, parsed server-side against the element type.
                    (JsonValue::Array(items), Kind::Array(_)) => pg_array_literal(items),
                    _ => serde_json::to_string(value)?,
                };
                out.extend_from_slice(rendered.as_bytes());
                Ok(IsNull::No)
            }
        }
    }

    fn accepts(_ty: &Type) -> bool {
        // The server parses the text form against the column type.
        true
    }

    fn encode_format(&self, _ty: &Type) -> Format {
        Format::Text
    }

    to_sql_checked!();
}

/// Render a float in the text form Postgres accepts.
fn float_text(f: f64) -> String {
    if f.is_nan() {
        "NaN".to_string()
    } else if f == f64::INFINITY {
        "Infinity".to_string()
    } else if f == f64::NEG_INFINITY {
        "-Infinity".to_string()
    } else {
        f.to_string()
    }
}

/// Render a JSON array as a Postgres array literal.
fn pg_array_literal(items: &[JsonValue]) -> String {
    let mut out = String::from("{");
    for (idx, item) in items.iter().enumerate() {
        if idx > 0 {
            out.push(',');
        }
        match item {
            JsonValue::Null => out.push_str("NULL"),
            JsonValue::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
            JsonValue::Number(n) => out.push_str(&n.to_string()),
            JsonValue::Array(nested) => out.push_str(&pg_array_literal(nested)),
            JsonValue::String(s) => push_array_element(&mut out, s),
            JsonValue::Object(_) => {
                push_array_element(&mut out, &serde_json::to_string(item).unwrap_or_default())
            }
        }
    }
    out.push('}');
    out
}

/// Append one quoted array element, escaping backslash and double quote.
fn push_array_element(out: &mut String, raw: &str) {
    out.push('"');
    for ch in raw.chars() {
        if ch == '"' || ch == '\\' {
            out.push('\\');
        }
        out.push(ch);
    }
    out.push('"');
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn encode(value: &SqlValue, ty: &Type) -> Option<String> {
        let mut buf = BytesMut::new();
        match value.to_sql(ty, &mut buf).unwrap() {
            IsNull::Yes => None,
            IsNull::No => Some(String::from_utf8(buf.to_vec()).unwrap()),
        }
    }

    #[test]
    fn test_from_json_scalars() {
        assert_eq!(SqlValue::from_json(&json!(null)), SqlValue::Null);
        assert_eq!(SqlValue::from_json(&json!(true)), SqlValue::Bool(true));
        assert_eq!(SqlValue::from_json(&json!(42)), SqlValue::Int(42));
        assert_eq!(SqlValue::from_json(&json!(2.5)), SqlValue::Float(2.5));
        assert_eq!(SqlValue::from_json(&json!("x")), SqlValue::Text("x".to_string()));
    }

    #[test]
    fn test_text_format_encoding() {
        assert_eq!(encode(&SqlValue::Text("O'Hara".to_string()), &Type::TEXT).unwrap(), "O'Hara");
        assert_eq!(encode(&SqlValue::Int(5), &Type::INT4).unwrap(), "5");
        assert_eq!(encode(&SqlValue::Bool(true), &Type::BOOL).unwrap(), "true");
        assert_eq!(encode(&SqlValue::Null, &Type::TEXT), None);
    }

    #[test]
    fn test_string_binds_against_any_type() {
        // The whole point of text format: "5" is a valid int4 parameter.
        assert!(<SqlValue as ToSql>::accepts(&Type::INT4));
        assert!(<SqlValue as ToSql>::accepts(&Type::UUID));
        assert_eq!(encode(&SqlValue::Text("5".to_string()), &Type::INT4).unwrap(), "5");
        assert!(matches!(
            SqlValue::Text("5".to_string()).encode_format(&Type::INT4),
            Format::Text
        ));
    }

    #[test]
    fn test_json_object_renders_as_json_text() {
        let value = SqlValue::Json(json!({"a": 1}));
        assert_eq!(encode(&value, &Type::JSONB).unwrap(), r#"{"a":1}"#);
    }

    #[test]
    fn test_json_array_renders_as_pg_array_for_array_columns() {
        let value = SqlValue::Json(json!([1, 2, 3]));
        assert_eq!(encode(&value, &Type::INT4_ARRAY).unwrap(), "{1,2,3}");

        let value = SqlValue::Json(json!(["a", "b\"c", "d\\e"]));
        assert_eq!(
            encode(&value, &Type::TEXT_ARRAY).unwrap(),
            r#"{"a","b\"c","d\\e"}"#
        );
    }

    #[test]
    fn test_json_array_renders_as_json_for_json_columns() {
        let value = SqlValue::Json(json!([1, 2]));
        assert_eq!(encode(&value, &Type::JSONB).unwrap(), "[1,2]");
    }

    #[test]
    fn test_float_edge_values() {
        assert_eq!(encode(&SqlValue::Float(f64::NAN), &Type::FLOAT8).unwrap(), "NaN");
        assert_eq!(
            encode(&SqlValue::Float(f64::INFINITY), &Type::FLOAT8).unwrap(),
            "Infinity"
        );
    }
}
