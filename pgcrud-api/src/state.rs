//! Shared application state for Axum routers.

use std::sync::Arc;
use std::time::Instant;

use pgcrud_core::{GatewayConfig, SchemaModel};

use crate::auth::CredentialEngine;
use crate::db::DbPools;
use crate::routes::mcp::SessionTable;

/// Application-wide state shared across all routes.
///
/// Everything here is either immutable after startup (model, config,
/// credential engine) or internally synchronized (pools, session table);
/// request handlers share no other state.
#[derive(Clone)]
pub struct AppState {
    pub model: Arc<SchemaModel>,
    pub pools: Arc<DbPools>,
    pub config: Arc<GatewayConfig>,
    pub credentials: Arc<CredentialEngine>,
    pub sessions: Arc<SessionTable>,
    pub start_time: Instant,
}

impl AppState {
    /// Assemble the state after introspection has produced the model.
    pub fn new(
        model: SchemaModel,
        pools: DbPools,
        config: GatewayConfig,
        credentials: CredentialEngine,
    ) -> Self {
        Self {
            model: Arc::new(model),
            pools: Arc::new(pools),
            config: Arc::new(config),
            credentials: Arc::new(credentials),
            sessions: Arc::new(SessionTable::default()),
            start_time: Instant::now(),
        }
    }
}
