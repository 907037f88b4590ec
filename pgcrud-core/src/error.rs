//! Domain error types for gateway operations

use thiserror::Error;

/// Configuration errors. All are fatal at startup.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("No namespaces remain after applying include/exclude filters")]
    EmptyNamespaceSet,
}

/// Query-builder failures.
///
/// These never reach SQL execution; the dispatch layer maps every variant
/// to a validation failure on the wire.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum QueryBuildError {
    #[error("Unknown column '{column}'; known columns: {}", known.join(", "))]
    UnknownColumn { column: String, known: Vec<String> },

    #[error("None of the requested columns exist; known columns: {}", known.join(", "))]
    EmptySelection { known: Vec<String> },

    #[error("Too many values for 'in' filter on '{column}': {count} exceeds the cap of {max}")]
    InListTooLong {
        column: String,
        count: usize,
        max: usize,
    },

    #[error("'is' filter accepts only 'null' or 'notnull', got '{value}'")]
    InvalidIsOperand { value: String },

    #[error("Payload contains no valid columns for this table")]
    EmptyColumnSet,

    #[error("Bulk payload contains no rows")]
    EmptyRowSet,

    #[error("Bulk payload of {count} rows exceeds the cap of {max}")]
    TooManyRows { count: usize, max: usize },

    #[error("Table '{entity}' has no primary key; by-key operations are unavailable")]
    NoPrimaryKey { entity: String },

    #[error("{}", key_arity_message(*expected, *got))]
    KeyArityMismatch { expected: usize, got: usize },

    #[error("Primary key values must be non-empty")]
    EmptyKeyPart,
}

fn key_arity_message(expected: usize, got: usize) -> String {
    if expected > 1 {
        format!(
            "Composite primary key expects {expected} values (comma-separated), got {got}"
        )
    } else {
        format!("Primary key expects a single value, got {got}")
    }
}

/// Catalog introspection failures. Fatal at startup.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum IntrospectError {
    #[error("Catalog query failed ({query}): {reason}")]
    CatalogQuery { query: String, reason: String },
}

/// Credential engine failures.
///
/// Mint-side failures are detailed; verification collapses every failure
/// into [`TokenError::VerificationFailed`] so an attacker learns nothing
/// from the error shape.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("Token label must match [A-Za-z0-9_-]+")]
    InvalidLabel,

    #[error("Scoped tokens must carry at least one namespace claim")]
    EmptyClaims,

    #[error("Credential support is disabled; no master secret is configured")]
    SecretUnavailable,

    #[error("Invalid credential")]
    VerificationFailed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_arity_messages() {
        let composite = QueryBuildError::KeyArityMismatch { expected: 2, got: 1 };
        assert_eq!(
            composite.to_string(),
            "Composite primary key expects 2 values (comma-separated), got 1"
        );

        let single = QueryBuildError::KeyArityMismatch { expected: 1, got: 3 };
        assert_eq!(single.to_string(), "Primary key expects a single value, got 3");
    }

    #[test]
    fn test_unknown_column_lists_known() {
        let err = QueryBuildError::UnknownColumn {
            column: "nope".to_string(),
            known: vec!["id".to_string(), "name".to_string()],
        };
        assert!(err.to_string().contains("id, name"));
    }
}
