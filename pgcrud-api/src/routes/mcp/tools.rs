//! MCP tool definitions and execution
//!
//! The seven CRUD tools, re-exposing the same operations as the REST
//! surface through the shared dispatch core. Argument records are
//! validated against each tool's declared JSON Schema before execution,
//! so an agent can rely on the advertised schemas being enforced.

use once_cell::sync::Lazy;
use serde_json::{json, Map, Value as JsonValue};

use pgcrud_core::TokenClaims;
use pgcrud_sql::{ListParams, WritePayload};

use super::types::{ContentBlock, Tool};
use crate::dispatch::{self, CreateResult};
use crate::error::{ApiError, ApiResult};
use crate::routes::meta::describe_entity;
use crate::state::AppState;
use crate::validation::parse_write_payload;

// ============================================================================
// TOOL DEFINITIONS
// ============================================================================

struct ToolDef {
    tool: Tool,
    validator: jsonschema::Validator,
}

fn tool(name: &str, description: &str, input_schema: JsonValue) -> ToolDef {
    let validator = jsonschema::validator_for(&input_schema)
        .unwrap_or_else(|e| panic!("tool schema for {name} must compile: {e}"));
    ToolDef {
        tool: Tool {
            name: name.to_string(),
            description: description.to_string(),
            input_schema,
        },
        validator,
    }
}

static TOOL_DEFS: Lazy<Vec<ToolDef>> = Lazy::new(|| {
    let table_prop = json!({
        "type": "string",
        "description": "Table path segment, as returned by list_tables"
    });
    let key_prop = json!({
        "type": "string",
        "description": "Primary key value; comma-joined in PK order for composite keys"
    });

    vec![
        tool(
            "list_tables",
            "Enumerate the tables this credential can access, with their paths and allowed operations",
            json!({
                "type": "object",
                "properties": {},
                "additionalProperties": false
            }),
        ),
        tool(
            "describe_table",
            "Describe one table: columns with types, primary key, foreign keys, allowed operations, and searchable columns",
            json!({
                "type": "object",
                "properties": { "table": table_prop },
                "required": ["table"],
                "additionalProperties": false
            }),
        ),
        tool(
            "list_records",
            "List records from a table with optional filters, search, sorting, column selection, and pagination",
            json!({
                "type": "object",
                "properties": {
                    "table": table_prop,
                    "page": { "type": "integer", "minimum": 1 },
                    "pageSize": { "type": "integer", "minimum": 1 },
                    "sortBy": { "type": "string" },
                    "sortOrder": { "type": "string", "enum": ["asc", "desc"] },
                    "select": {
                        "type": "array",
                        "items": { "type": "string" },
                        "description": "Columns to project; omit for all"
                    },
                    "search": { "type": "string" },
                    "searchColumns": {
                        "type": "array",
                        "items": { "type": "string" }
                    },
                    "filters": {
                        "type": "object",
                        "additionalProperties": { "type": "string" },
                        "description": "column -> 'operator:value' (eq, neq, gt, gte, lt, lte, like, ilike, is, in)"
                    }
                },
                "required": ["table"],
                "additionalProperties": false
            }),
        ),
        tool(
            "get_record",
            "Fetch one record by primary key",
            json!({
                "type": "object",
                "properties": { "table": table_prop, "key": key_prop },
                "required": ["table", "key"],
                "additionalProperties": false
            }),
        ),
        tool(
            "create_record",
            "Insert one record (object) or several (array of objects)",
            json!({
                "type": "object",
                "properties": {
                    "table": table_prop,
                    "record": {
                        "description": "The record to insert, or an array of records",
                        "anyOf": [
                            { "type": "object" },
                            { "type": "array", "items": { "type": "object" } }
                        ]
                    }
                },
                "required": ["table", "record"],
                "additionalProperties": false
            }),
        ),
        tool(
            "update_record",
            "Partially update one record by primary key; only the supplied columns change",
            json!({
                "type": "object",
                "properties": {
                    "table": table_prop,
                    "key": key_prop,
                    "record": { "type": "object" }
                },
                "required": ["table", "key", "record"],
                "additionalProperties": false
            }),
        ),
        tool(
            "delete_record",
            "Delete one record by primary key (soft delete on tables with a deleted_at column)",
            json!({
                "type": "object",
                "properties": { "table": table_prop, "key": key_prop },
                "required": ["table", "key"],
                "additionalProperties": false
            }),
        ),
    ]
});

/// The advertised tool list.
pub fn available_tools() -> Vec<Tool> {
    TOOL_DEFS.iter().map(|def| def.tool.clone()).collect()
}

/// Validate a tool's arguments against its declared schema.
fn validate_arguments(name: &str, args: &JsonValue) -> ApiResult<()> {
    let def = TOOL_DEFS
        .iter()
        .find(|def| def.tool.name == name)
        .ok_or_else(|| ApiError::not_found(format!("Unknown tool '{name}'")))?;

    def.validator.validate(args).map_err(|e| {
        ApiError::validation_failed(format!("Invalid arguments for {name}: {e}"))
    })
}

/// Whether a tool name exists.
pub fn is_known_tool(name: &str) -> bool {
    TOOL_DEFS.iter().any(|def| def.tool.name == name)
}

// ============================================================================
// EXECUTION
// ============================================================================

/// Execute one tool call under the session's claims.
pub async fn execute_tool(
    state: &AppState,
    claims: &TokenClaims,
    name: &str,
    args: JsonValue,
) -> ApiResult<Vec<ContentBlock>> {
    validate_arguments(name, &args)?;

    match name {
        "list_tables" => {
            let tables: Vec<JsonValue> = state
                .model
                .entities()
                .filter(|entity| claims.can_see(&entity.namespace))
                .map(|entity| {
                    json!({
                        "table": entity.route_segment(),
                        "namespace": entity.namespace,
                        "name": entity.name,
                        "path": format!("/api/{}", entity.route_segment()),
                        "primary_key": entity.primary_key_columns,
                    })
                })
                .collect();
            Ok(vec![ContentBlock::json(&json!({ "tables": tables }))])
        }

        "describe_table" => {
            let entity = resolve(state, &args, claims)?;
            let descriptor = describe_entity(entity);
            Ok(vec![ContentBlock::json(&serde_json::to_value(descriptor)?)])
        }

        "list_records" => {
            let entity = resolve(state, &args, claims)?;
            let params = list_params_from_args(&args, state);
            let envelope = dispatch::list_records(state, claims, entity, &params).await?;
            Ok(vec![ContentBlock::json(&serde_json::to_value(envelope)?)])
        }

        "get_record" => {
            let entity = resolve(state, &args, claims)?;
            let key_values = key_values_from_args(entity, &args)?;
            let row = dispatch::get_record(state, claims, entity, &key_values).await?;
            Ok(vec![ContentBlock::json(&row)])
        }

        "create_record" => {
            let entity = resolve(state, &args, claims)?;
            let record = args["record"].clone();
            let payload = parse_write_payload(record, true, state.config.max_bulk_rows)?;
            let result = dispatch::create_records(state, claims, entity, &payload).await?;
            let value = match result {
                CreateResult::Single(row) => row,
                CreateResult::Bulk(envelope) => serde_json::to_value(envelope)?,
            };
            Ok(vec![ContentBlock::json(&value)])
        }

        "update_record" => {
            let entity = resolve(state, &args, claims)?;
            let key_values = key_values_from_args(entity, &args)?;
            let payload = parse_write_payload(args["record"].clone(), false, 0)?;
            let row = match payload {
                WritePayload::Single(row) => row,
                WritePayload::Bulk(_) => unreachable!("bulk disallowed above"),
            };
            let updated = dispatch::update_record(state, claims, entity, &key_values, &row).await?;
            Ok(vec![ContentBlock::json(&updated)])
        }

        "delete_record" => {
            let entity = resolve(state, &args, claims)?;
            let key_values = key_values_from_args(entity, &args)?;
            let envelope = dispatch::delete_record(state, claims, entity, &key_values).await?;
            Ok(vec![ContentBlock::json(&serde_json::to_value(envelope)?)])
        }

        other => Err(ApiError::not_found(format!("Unknown tool '{other}'"))),
    }
}

// ============================================================================
// ARGUMENT MARSHALLING
// ============================================================================

/// Resolve the `table` argument to an entity, enforcing visibility for
/// the describing tools (the data tools re-check the precise access mode
/// in dispatch).
fn resolve<'a>(
    state: &'a AppState,
    args: &JsonValue,
    claims: &TokenClaims,
) -> ApiResult<&'a pgcrud_core::Entity> {
    let segment = args["table"]
        .as_str()
        .ok_or_else(|| ApiError::validation_failed("Missing 'table' argument"))?;
    let entity = state
        .model
        .entity_by_segment(segment)
        .ok_or_else(|| ApiError::unknown_table(segment))?;
    if !claims.can_see(&entity.namespace) {
        return Err(ApiError::permission_denied(format!(
            "No access to schema '{}'",
            entity.namespace
        )));
    }
    Ok(entity)
}

fn key_values_from_args(entity: &pgcrud_core::Entity, args: &JsonValue) -> ApiResult<Vec<String>> {
    let key = args["key"]
        .as_str()
        .ok_or_else(|| ApiError::validation_failed("Missing 'key' argument"))?;
    crate::validation::parse_key_segment(entity, key)
}

fn list_params_from_args(args: &JsonValue, state: &AppState) -> ListParams {
    let string_list = |value: &JsonValue| -> Option<Vec<String>> {
        value.as_array().map(|items| {
            items
                .iter()
                .filter_map(|item| item.as_str().map(|s| s.to_string()))
                .collect()
        })
    };

    let filters = args["filters"]
        .as_object()
        .map(|map: &Map<String, JsonValue>| {
            map.iter()
                .filter_map(|(column, value)| {
                    value.as_str().map(|v| (column.clone(), v.to_string()))
                })
                .collect()
        })
        .unwrap_or_default();

    ListParams {
        filters,
        page: args["page"].as_i64().unwrap_or(1),
        page_size: args["pageSize"].as_i64().unwrap_or(state.config.default_page_size),
        sort_by: args["sortBy"].as_str().map(|s| s.to_string()),
        descending: args["sortOrder"].as_str() == Some("desc"),
        select: string_list(&args["select"]),
        search: args["search"].as_str().map(|s| s.to_string()),
        search_columns: string_list(&args["searchColumns"]),
    }
}

// ============================================================================
// TESTS
// ============================================================================
