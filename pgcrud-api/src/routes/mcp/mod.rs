//! Model Context Protocol (MCP) surface
//!
//! Re-exposes the gateway's CRUD operations as named tools, resources,
//! and prompts over a JSON-RPC transport: `POST /mcp` for initialize and
//! calls, `GET /mcp` for the server-to-client stream, `DELETE /mcp` to
//! close a session. Sessions are keyed by the `Mcp-Session-Id` header;
//! the credential presented at initialize is bound to the session.

use std::time::Instant;

use axum::{
    routing::post,
    Router,
};
use dashmap::DashMap;

use pgcrud_core::TokenClaims;

use crate::state::AppState;

// Sub-modules
pub mod handlers;
pub mod prompts;
pub mod resources;
pub mod tools;
pub mod types;

// ============================================================================
// SESSIONS
// ============================================================================

/// One live MCP session and its derived view of the model.
#[derive(Debug, Clone)]
pub struct McpSession {
    /// Claims captured at initialize; every call on this session is
    /// evaluated against them
    pub claims: TokenClaims,
    pub created_at: Instant,
}

/// Concurrent session table keyed by session identifier.
#[derive(Debug, Default)]
pub struct SessionTable {
    sessions: DashMap<String, McpSession>,
}

impl SessionTable {
    /// Register a new session.
    pub fn insert(&self, id: String, claims: TokenClaims) {
        self.sessions.insert(
            id,
            McpSession {
                claims,
                created_at: Instant::now(),
            },
        );
    }

    /// The claims bound to a session, if it exists.
    pub fn claims(&self, id: &str) -> Option<TokenClaims> {
        self.sessions.get(id).map(|session| session.claims.clone())
    }

    /// Whether a session exists.
    pub fn contains(&self, id: &str) -> bool {
        self.sessions.contains_key(id)
    }

    /// Close a session, releasing its resources. Returns whether it
    /// existed.
    pub fn remove(&self, id: &str) -> bool {
        self.sessions.remove(id).is_some()
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether no session is live.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Drop all sessions (shutdown).
    pub fn clear(&self) {
        self.sessions.clear();
    }
}

// ============================================================================
// ROUTER
// ============================================================================

/// Create the MCP router.
pub fn create_router() -> Router<AppState> {
    Router::new().route(
        "/mcp",
        post(handlers::mcp_post)
            .get(handlers::mcp_get)
            .delete(handlers::mcp_delete),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_lifecycle() {
        let table = SessionTable::default();
        assert!(table.is_empty());

        table.insert("s1".to_string(), TokenClaims::FullAccess);
        assert!(table.contains("s1"));
        assert_eq!(table.claims("s1"), Some(TokenClaims::FullAccess));
        assert_eq!(table.len(), 1);

        assert!(table.remove("s1"));
        assert!(!table.remove("s1"));
        assert!(table.claims("s1").is_none());
    }
}
