//! Route Table
//!
//! The route table is a pure function of the schema model: entities are
//! addressed through the `/:segment` captures and resolved against the
//! model's route index, so a fresh process run with a different catalog
//! needs no code changes. Meta routes are registered ahead of the capture
//! routes; the router matches static segments first.

pub mod crud;
pub mod health;
pub mod mcp;
pub mod meta;

use axum::{
    extract::DefaultBodyLimit,
    http::HeaderValue,
    middleware,
    response::Html,
    routing::get,
    Router,
};
use tower_http::cors::{self, CorsLayer};
use tower_http::trace::TraceLayer;

use pgcrud_core::CorsOrigins;

use crate::middleware::{auth_middleware, request_id_middleware};
use crate::state::AppState;

// ============================================================================
// DOCUMENTATION SHELL
// ============================================================================

const DOCS_SHELL: &str = r#"<!doctype html>
<html>
<head><title>pgcrud</title></head>
<body>
  <h1>pgcrud</h1>
  <p>Zero-configuration REST and MCP gateway for this database.</p>
  <ul>
    <li><a href="/api/_schema">Full schema and API capabilities</a></li>
    <li><a href="/api/_meta/tables">Table descriptors</a></li>
    <li><a href="/api/_health">Health</a></li>
  </ul>
</body>
</html>
"#;

async fn docs() -> Html<&'static str> {
    Html(DOCS_SHELL)
}

// ============================================================================
// ROUTER BUILDER
// ============================================================================

/// Create the complete gateway router.
///
/// Layer order (outermost first): trace → body limit → CORS →
/// request id → credential check → routes.
pub fn create_api_router(state: AppState) -> Router {
    let mut api = Router::new()
        .route("/_health", get(health::health))
        .route("/_meta/tables", get(meta::list_tables))
        .route("/_meta/tables/:segment", get(meta::get_table))
        .route("/_schema", get(meta::schema_dump))
        .route("/_schema/:segment", get(meta::schema_table))
        .route("/:segment", get(crud::list).post(crud::create))
        .route(
            "/:segment/:key",
            get(crud::read)
                .put(crud::replace)
                .patch(crud::patch)
                .delete(crud::delete),
        );

    if state.config.docs_enabled {
        api = api.route("/docs", get(docs));
    }

    Router::new()
        .nest("/api", api)
        .merge(mcp::create_router())
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(cors_layer(&state.config.cors_origins))
        .layer(DefaultBodyLimit::max(state.config.max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(origins: &CorsOrigins) -> CorsLayer {
    match origins {
        CorsOrigins::Any => CorsLayer::permissive(),
        // No allowed origins: the layer emits no CORS headers.
        CorsOrigins::Disabled => CorsLayer::new(),
        CorsOrigins::List(list) => {
            let parsed: Vec<HeaderValue> =
                list.iter().filter_map(|origin| origin.parse().ok()).collect();
            CorsLayer::new()
                .allow_origin(parsed)
                .allow_methods(cors::Any)
                .allow_headers(cors::Any)
        }
    }
}
