//! Generic CRUD Route Handlers
//!
//! The six per-entity routes, all resolved dynamically against the schema
//! model: the route table is a pure function of the model, and these
//! handlers simply dispatch. Errors are logged here, at the dispatch
//! boundary, with the request identifier.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde_json::Value as JsonValue;

use pgcrud_core::{Entity, TokenClaims};

use crate::dispatch::{self, CreateResult};
use crate::error::{ApiError, ApiResult};
use crate::middleware::RequestId;
use crate::state::AppState;
use crate::validation::{parse_key_segment, parse_list_params, parse_write_payload};

// ============================================================================
// HELPERS
// ============================================================================

fn resolve<'a>(state: &'a AppState, segment: &str) -> ApiResult<&'a Entity> {
    state
        .model
        .entity_by_segment(segment)
        .ok_or_else(|| ApiError::unknown_table(segment))
}

/// Log an error at the dispatch boundary with the request identifier.
fn traced(request_id: &RequestId, err: ApiError) -> ApiError {
    tracing::error!(request_id = %request_id, error = %err, "Request failed");
    err
}

// ============================================================================
// HANDLERS
// ============================================================================

/// GET /api/{segment}
pub async fn list(
    State(state): State<AppState>,
    Extension(claims): Extension<TokenClaims>,
    Extension(request_id): Extension<RequestId>,
    Path(segment): Path<String>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> ApiResult<Response> {
    let entity = resolve(&state, &segment).map_err(|e| traced(&request_id, e))?;
    let params = parse_list_params(&pairs, &state.config);

    let envelope = dispatch::list_records(&state, &claims, entity, &params)
        .await
        .map_err(|e| traced(&request_id, e))?;
    Ok(Json(envelope).into_response())
}

/// GET /api/{segment}/{key}
pub async fn read(
    State(state): State<AppState>,
    Extension(claims): Extension<TokenClaims>,
    Extension(request_id): Extension<RequestId>,
    Path((segment, key)): Path<(String, String)>,
) -> ApiResult<Response> {
    let result = async {
        let entity = resolve(&state, &segment)?;
        let key_values = parse_key_segment(entity, &key)?;
        dispatch::get_record(&state, &claims, entity, &key_values).await
    }
    .await
    .map_err(|e| traced(&request_id, e))?;

    Ok(Json(result).into_response())
}

/// POST /api/{segment}; accepts a single object or an array for bulk
/// create.
pub async fn create(
    State(state): State<AppState>,
    Extension(claims): Extension<TokenClaims>,
    Extension(request_id): Extension<RequestId>,
    Path(segment): Path<String>,
    Json(body): Json<JsonValue>,
) -> ApiResult<Response> {
    let result = async {
        let entity = resolve(&state, &segment)?;
        let payload = parse_write_payload(body, true, state.config.max_bulk_rows)?;
        dispatch::create_records(&state, &claims, entity, &payload).await
    }
    .await
    .map_err(|e| traced(&request_id, e))?;

    let response = match result {
        CreateResult::Single(row) => (StatusCode::CREATED, Json(row)).into_response(),
        CreateResult::Bulk(envelope) => (StatusCode::CREATED, Json(envelope)).into_response(),
    };
    Ok(response)
}

/// PUT /api/{segment}/{key}
pub async fn replace(
    State(state): State<AppState>,
    Extension(claims): Extension<TokenClaims>,
    Extension(request_id): Extension<RequestId>,
    Path((segment, key)): Path<(String, String)>,
    Json(body): Json<JsonValue>,
) -> ApiResult<Response> {
    update_inner(state, claims, request_id, segment, key, body).await
}

/// PATCH /api/{segment}/{key}
pub async fn patch(
    State(state): State<AppState>,
    Extension(claims): Extension<TokenClaims>,
    Extension(request_id): Extension<RequestId>,
    Path((segment, key)): Path<(String, String)>,
    Json(body): Json<JsonValue>,
) -> ApiResult<Response> {
    update_inner(state, claims, request_id, segment, key, body).await
}

async fn update_inner(
    state: AppState,
    claims: TokenClaims,
    request_id: RequestId,
    segment: String,
    key: String,
    body: JsonValue,
) -> ApiResult<Response> {
    let result = async {
        let entity = resolve(&state, &segment)?;
        let key_values = parse_key_segment(entity, &key)?;
        let payload = parse_write_payload(body, false, state.config.max_bulk_rows)?;
        let row = match payload {
            pgcrud_sql::WritePayload::Single(row) => row,
            pgcrud_sql::WritePayload::Bulk(_) => unreachable!("bulk disallowed above"),
        };
        dispatch::update_record(&state, &claims, entity, &key_values, &row).await
    }
    .await
    .map_err(|e| traced(&request_id, e))?;

    Ok(Json(result).into_response())
}

/// DELETE /api/{segment}/{key}
pub async fn delete(
    State(state): State<AppState>,
    Extension(claims): Extension<TokenClaims>,
    Extension(request_id): Extension<RequestId>,
    Path((segment, key)): Path<(String, String)>,
) -> ApiResult<Response> {
    let envelope = async {
        let entity = resolve(&state, &segment)?;
        let key_values = parse_key_segment(entity, &key)?;
        dispatch::delete_record(&state, &claims, entity, &key_values).await
    }
    .await
    .map_err(|e| traced(&request_id, e))?;

    Ok(Json(envelope).into_response())
}
