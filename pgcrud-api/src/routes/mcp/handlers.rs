//! MCP transport handlers
//!
//! JSON-RPC dispatch over `POST /mcp`, the SSE stream on `GET /mcp`, and
//! session teardown on `DELETE /mcp`. A session identifier is assigned at
//! initialize and must be echoed by every subsequent request; missing or
//! unknown sessions on GET/DELETE are a 400.

use std::convert::Infallible;
use std::time::Duration;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::sse::{Event, KeepAlive, Sse},
    response::{IntoResponse, Response},
    Extension, Json,
};
use futures_util::Stream;
use serde_json::{json, Value as JsonValue};
use uuid::Uuid;

use pgcrud_core::TokenClaims;

use super::types::*;
use super::{prompts, resources, tools};
use crate::error::{ApiError, ApiResult, ErrorCode};
use crate::state::AppState;

// ============================================================================
// POST /mcp
// ============================================================================

/// Handle one JSON-RPC request.
pub async fn mcp_post(
    State(state): State<AppState>,
    Extension(claims): Extension<TokenClaims>,
    headers: HeaderMap,
    Json(request): Json<JsonRpcRequest>,
) -> Response {
    tracing::debug!(method = %request.method, "MCP request");

    match request.method.as_str() {
        "initialize" => initialize(&state, claims, request),

        // Notifications carry no id and expect no body.
        method if method.starts_with("notifications/") => StatusCode::ACCEPTED.into_response(),

        _ => {
            // Everything past initialize requires the session header; the
            // claims bound at initialize govern the call.
            let session_claims = match session_claims(&state, &headers) {
                Ok(claims) => claims,
                Err(err) => return err.into_response(),
            };
            dispatch_call(&state, &session_claims, request).await
        }
    }
}

fn initialize(state: &AppState, claims: TokenClaims, request: JsonRpcRequest) -> Response {
    let session_id = Uuid::now_v7().to_string();
    state.sessions.insert(session_id.clone(), claims);
    tracing::info!(session_id = %session_id, sessions = state.sessions.len(), "MCP session initialized");

    let result = InitializeResult {
        protocol_version: MCP_PROTOCOL_VERSION.to_string(),
        capabilities: ServerCapabilities {
            tools: ToolsCapability { list_changed: false },
            resources: ResourcesCapability {
                subscribe: false,
                list_changed: false,
            },
            prompts: PromptsCapability { list_changed: false },
        },
        server_info: ServerInfo {
            name: "pgcrud".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        },
    };

    let body = JsonRpcResponse::success(
        request.id,
        serde_json::to_value(result).unwrap_or(JsonValue::Null),
    );
    ([(SESSION_HEADER, session_id)], Json(body)).into_response()
}

async fn dispatch_call(
    state: &AppState,
    claims: &TokenClaims,
    request: JsonRpcRequest,
) -> Response {
    let id = request.id.clone();

    let result: Result<JsonValue, JsonRpcResponse> = match request.method.as_str() {
        "ping" => Ok(json!({})),

        "tools/list" => to_result(id.clone(), ListToolsResult { tools: tools::available_tools() }),

        "tools/call" => match serde_json::from_value::<CallToolParams>(request.params) {
            Ok(params) => call_tool(state, claims, id.clone(), params).await,
            Err(e) => Err(JsonRpcResponse::failure(id.clone(), RPC_INVALID_PARAMS, e.to_string())),
        },

        "resources/list" => to_result(
            id.clone(),
            ListResourcesResult {
                resources: resources::available_resources(state, claims),
            },
        ),

        "resources/read" => match serde_json::from_value::<ReadResourceParams>(request.params) {
            Ok(params) => match resources::read_resource(state, claims, &params.uri) {
                Ok(content) => to_result(id.clone(), ReadResourceResult { contents: vec![content] }),
                Err(err) => Err(rpc_error(id.clone(), &err)),
            },
            Err(e) => Err(JsonRpcResponse::failure(id.clone(), RPC_INVALID_PARAMS, e.to_string())),
        },

        "prompts/list" => to_result(id.clone(), ListPromptsResult { prompts: prompts::available_prompts() }),

        "prompts/get" => match serde_json::from_value::<GetPromptParams>(request.params) {
            Ok(params) => {
                match prompts::render_prompt(state, claims, &params.name, &params.arguments) {
                    Ok(result) => to_result(id.clone(), result),
                    Err(err) => Err(rpc_error(id.clone(), &err)),
                }
            }
            Err(e) => Err(JsonRpcResponse::failure(id.clone(), RPC_INVALID_PARAMS, e.to_string())),
        },

        other => Err(JsonRpcResponse::failure(
            id.clone(),
            RPC_METHOD_NOT_FOUND,
            format!("Unknown method '{other}'"),
        )),
    };

    match result {
        Ok(value) => Json(JsonRpcResponse::success(id, value)).into_response(),
        Err(failure) => Json(failure).into_response(),
    }
}

/// Execute a tool call.
///
/// Credential denials surface as protocol-level errors; everything else a
/// tool can fail with (validation, not found, database) comes back as an
/// `isError` tool result so the agent can read and react to it.
async fn call_tool(
    state: &AppState,
    claims: &TokenClaims,
    id: Option<JsonValue>,
    params: CallToolParams,
) -> Result<JsonValue, JsonRpcResponse> {
    if !tools::is_known_tool(&params.name) {
        return Err(JsonRpcResponse::failure(
            id,
            RPC_METHOD_NOT_FOUND,
            format!("Unknown tool '{}'", params.name),
        ));
    }

    match tools::execute_tool(state, claims, &params.name, params.arguments).await {
        Ok(content) => Ok(serde_json::to_value(CallToolResult { content, is_error: false })
            .unwrap_or(JsonValue::Null)),
        Err(err) if matches!(err.code, ErrorCode::PermissionDenied | ErrorCode::Unauthenticated) => {
            Err(rpc_error(id, &err))
        }
        Err(err) => {
            tracing::warn!(tool = %params.name, error = %err, "Tool call failed");
            let result = CallToolResult {
                content: vec![ContentBlock::Text {
                    text: format!("Error: {}", err.message),
                }],
                is_error: true,
            };
            Ok(serde_json::to_value(result).unwrap_or(JsonValue::Null))
        }
    }
}

fn to_result<T: serde::Serialize>(
    id: Option<JsonValue>,
    value: T,
) -> Result<JsonValue, JsonRpcResponse> {
    serde_json::to_value(value)
        .map_err(|e| JsonRpcResponse::failure(id, RPC_INTERNAL_ERROR, e.to_string()))
}

fn rpc_error(id: Option<JsonValue>, err: &ApiError) -> JsonRpcResponse {
    JsonRpcResponse::failure(id, RPC_INTERNAL_ERROR, err.message.clone())
}

fn session_claims(state: &AppState, headers: &HeaderMap) -> ApiResult<TokenClaims> {
    let id = headers
        .get(SESSION_HEADER)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| ApiError::validation_failed("Missing Mcp-Session-Id header"))?;
    state
        .sessions
        .claims(id)
        .ok_or_else(|| ApiError::validation_failed("Unknown MCP session"))
}

// ============================================================================
// GET /mcp (server-to-client stream)
// ============================================================================

/// Open the server-to-client event stream for a session.
///
/// The gateway currently pushes no server-initiated messages; the stream
/// stays open with keepalives and closes when the session is deleted.
pub async fn mcp_get(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let session_id = headers
        .get(SESSION_HEADER)
        .and_then(|h| h.to_str().ok())
        .map(|s| s.to_string())
        .ok_or_else(|| ApiError::validation_failed("Missing Mcp-Session-Id header"))?;

    if !state.sessions.contains(&session_id) {
        return Err(ApiError::validation_failed("Unknown MCP session"));
    }

    let stream = async_stream::stream! {
        loop {
            tokio::time::sleep(Duration::from_secs(15)).await;
            if !state.sessions.contains(&session_id) {
                break;
            }
            yield Ok(Event::default().comment("keepalive"));
        }
    };

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

// ============================================================================
// DELETE /mcp
// ============================================================================

/// Close a session and release its resources.
pub async fn mcp_delete(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    let session_id = headers
        .get(SESSION_HEADER)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| ApiError::validation_failed("Missing Mcp-Session-Id header"))?;

    if !state.sessions.remove(session_id) {
        return Err(ApiError::validation_failed("Unknown MCP session"));
    }
    tracing::info!(session_id = %session_id, "MCP session closed");
    Ok(StatusCode::NO_CONTENT)
}
