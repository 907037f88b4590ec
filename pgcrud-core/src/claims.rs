//! Capability Claims
//!
//! The permission model carried by credentials: a token either grants full
//! access (the legacy, claims-less form) or maps namespaces to read/write
//! grants. `*` acts as a wildcard fallback that an explicit namespace entry
//! overrides.
//!
//! Claims are serialized from a `BTreeMap`, which fixes the canonical JSON
//! key order (lexicographic) that the credential MAC is computed over.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Wildcard namespace entry in scoped claims.
pub const WILDCARD_NAMESPACE: &str = "*";

// ============================================================================
// ACCESS MODES AND GRANTS
// ============================================================================

/// The access mode an operation requires on its entity's namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessMode {
    /// List, read-by-key, describe
    Read,
    /// Create, update, delete
    Write,
}

impl AccessMode {
    /// Short label used in permission-denied messages.
    pub fn label(&self) -> &'static str {
        match self {
            AccessMode::Read => "read",
            AccessMode::Write => "write",
        }
    }
}

/// The grant attached to one namespace entry in scoped claims.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Grant {
    #[serde(rename = "r")]
    Read,
    #[serde(rename = "w")]
    Write,
    #[serde(rename = "rw")]
    ReadWrite,
}

impl Grant {
    /// Whether this grant satisfies the requested access mode.
    pub fn allows(&self, access: AccessMode) -> bool {
        match (self, access) {
            (Grant::ReadWrite, _) => true,
            (Grant::Read, AccessMode::Read) => true,
            (Grant::Write, AccessMode::Write) => true,
            _ => false,
        }
    }
}

/// Scoped claims: namespace (or `*`) → grant.
pub type ClaimSet = BTreeMap<String, Grant>;

// ============================================================================
// TOKEN CLAIMS
// ============================================================================

/// The verified capability set attached to a request.
///
/// Absence of credentials (auth disabled) is represented as `FullAccess` by
/// the dispatch layer; the distinction never reaches permission checks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TokenClaims {
    /// Legacy claims-less token, or auth disabled: everything permitted.
    FullAccess,
    /// Per-namespace grants covered by the token MAC.
    Scoped(ClaimSet),
}

impl TokenClaims {
    /// Whether the requested access on a namespace is permitted.
    ///
    /// Scoped lookup falls back from the explicit namespace entry to the
    /// `*` wildcard; absence of both denies.
    pub fn permits(&self, namespace: &str, access: AccessMode) -> bool {
        match self {
            TokenClaims::FullAccess => true,
            TokenClaims::Scoped(claims) => claims
                .get(namespace)
                .or_else(|| claims.get(WILDCARD_NAMESPACE))
                .is_some_and(|grant| grant.allows(access)),
        }
    }

    /// Whether the caller has any access at all to a namespace.
    ///
    /// Used to filter meta listings and the MCP table surface.
    pub fn can_see(&self, namespace: &str) -> bool {
        self.permits(namespace, AccessMode::Read) || self.permits(namespace, AccessMode::Write)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn scoped(entries: &[(&str, Grant)]) -> TokenClaims {
        TokenClaims::Scoped(
            entries.iter().map(|(ns, g)| (ns.to_string(), *g)).collect(),
        )
    }

    #[test]
    fn test_full_access_permits_everything() {
        let claims = TokenClaims::FullAccess;
        assert!(claims.permits("public", AccessMode::Read));
        assert!(claims.permits("anything", AccessMode::Write));
    }

    #[test]
    fn test_scoped_grant_letters() {
        let claims = scoped(&[("public", Grant::Read)]);
        assert!(claims.permits("public", AccessMode::Read));
        assert!(!claims.permits("public", AccessMode::Write));

        let claims = scoped(&[("public", Grant::Write)]);
        assert!(!claims.permits("public", AccessMode::Read));
        assert!(claims.permits("public", AccessMode::Write));

        let claims = scoped(&[("public", Grant::ReadWrite)]);
        assert!(claims.permits("public", AccessMode::Read));
        assert!(claims.permits("public", AccessMode::Write));
    }

    #[test]
    fn test_unlisted_namespace_denied() {
        let claims = scoped(&[("public", Grant::ReadWrite)]);
        assert!(!claims.permits("reporting", AccessMode::Read));
        assert!(!claims.can_see("reporting"));
    }

    #[test]
    fn test_wildcard_fallback() {
        let claims = scoped(&[("*", Grant::Read)]);
        assert!(claims.permits("reporting", AccessMode::Read));
        assert!(!claims.permits("reporting", AccessMode::Write));
    }

    #[test]
    fn test_explicit_entry_overrides_wildcard() {
        let claims = scoped(&[("*", Grant::ReadWrite), ("audit", Grant::Read)]);
        // Wildcard would allow writes, but the explicit entry wins.
        assert!(!claims.permits("audit", AccessMode::Write));
        assert!(claims.permits("audit", AccessMode::Read));
        assert!(claims.permits("elsewhere", AccessMode::Write));
    }

    #[test]
    fn test_grant_serialization_letters() {
        let claims: ClaimSet =
            [("b".to_string(), Grant::ReadWrite), ("a".to_string(), Grant::Read)]
                .into_iter()
                .collect();
        // BTreeMap gives lexicographic key order in the canonical encoding.
        assert_eq!(
            serde_json::to_string(&claims).unwrap(),
            r#"{"a":"r","b":"rw"}"#
        );
    }
}
