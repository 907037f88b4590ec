//! Portable Type Mapping
//!
//! Maps low-level Postgres type tags (`udt_name`, e.g. `int4`, `varchar`,
//! `_int8` for arrays) to the portable, JSON-compatible type model used by
//! the surface schema emitter and the MCP table descriptions.
//!
//! The mapping is total: any tag not explicitly enumerated maps to a plain
//! string, which is also what the wire protocol will happily render it as.

use serde::{Deserialize, Serialize};

// ============================================================================
// PORTABLE TYPES
// ============================================================================

/// Format refinement for string-typed columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "kebab-case")]
pub enum StringFormat {
    /// UUID values
    Uuid,
    /// Calendar date (`date`)
    Date,
    /// Timestamp with or without zone
    DateTime,
    /// Time of day
    Time,
    /// Base64-encoded binary (`bytea`)
    Byte,
}

/// The portable JSON-compatible type of a column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PortableType {
    /// Signed integer, with range bounds for the 2- and 4-byte forms.
    Integer {
        #[serde(skip_serializing_if = "Option::is_none")]
        min: Option<i64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        max: Option<i64>,
    },
    /// 64-bit real or arbitrary-precision decimal.
    Number,
    /// Boolean.
    Boolean,
    /// Opaque structured value (`json` / `jsonb`); unconstrained.
    Structured,
    /// String, optionally refined by a format tag.
    String {
        #[serde(skip_serializing_if = "Option::is_none")]
        format: Option<StringFormat>,
    },
    /// Array of a base portable type.
    Array(Box<PortableType>),
}

impl PortableType {
    /// The JSON type name used in emitted documents.
    pub fn type_name(&self) -> &'static str {
        match self {
            PortableType::Integer { .. } => "integer",
            PortableType::Number => "number",
            PortableType::Boolean => "boolean",
            PortableType::Structured => "object",
            PortableType::String { .. } => "string",
            PortableType::Array(_) => "array",
        }
    }

    /// The format tag, when the type carries one.
    pub fn format(&self) -> Option<StringFormat> {
        match self {
            PortableType::String { format } => *format,
            _ => None,
        }
    }

    /// Opaque structured values are already unconstrained and do not take a
    /// nullability marker in emitted documents.
    pub fn is_structured(&self) -> bool {
        matches!(self, PortableType::Structured)
    }

    fn string(format: StringFormat) -> Self {
        PortableType::String { format: Some(format) }
    }

    fn plain_string() -> Self {
        PortableType::String { format: None }
    }
}

// ============================================================================
// TAG MAPPING
// ============================================================================

/// Map a Postgres type tag to its portable type.
///
/// Tags beginning with an underscore denote arrays of the base tag.
pub fn map_type_tag(tag: &str) -> PortableType {
    if let Some(base) = tag.strip_prefix('_') {
        return PortableType::Array(Box::new(map_type_tag(base)));
    }

    match tag {
        "int2" | "smallint" => PortableType::Integer {
            min: Some(i16::MIN as i64),
            max: Some(i16::MAX as i64),
        },
        "int4" | "integer" => PortableType::Integer {
            min: Some(i32::MIN as i64),
            max: Some(i32::MAX as i64),
        },
        "int8" | "bigint" => PortableType::Integer { min: None, max: None },
        "float4" | "float8" | "real" | "numeric" | "decimal" | "money" => PortableType::Number,
        "bool" | "boolean" => PortableType::Boolean,
        "json" | "jsonb" => PortableType::Structured,
        "uuid" => PortableType::string(StringFormat::Uuid),
        "date" => PortableType::string(StringFormat::Date),
        "timestamp" | "timestamptz" => PortableType::string(StringFormat::DateTime),
        "time" | "timetz" => PortableType::string(StringFormat::Time),
        "bytea" => PortableType::string(StringFormat::Byte),
        _ => PortableType::plain_string(),
    }
}

/// Type tags whose columns participate in full-text search by default.
pub const TEXTUAL_TAGS: &[&str] = &["text", "varchar", "bpchar", "char", "name", "citext"];

/// Whether a column with this tag is searchable by default.
pub fn is_textual_tag(tag: &str) -> bool {
    TEXTUAL_TAGS.contains(&tag)
}

// ============================================================================
// TESTS
// ============================================================================
