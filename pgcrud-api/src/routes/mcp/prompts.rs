//! MCP prompt handlers
//!
//! Two prompts synthesized from the schema model: a database overview and
//! a per-table CRUD guide with concrete request examples.

use serde_json::Value as JsonValue;

use pgcrud_core::TokenClaims;

use super::types::{ContentBlock, GetPromptResult, Prompt, PromptArgument, PromptMessage};
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

// ============================================================================
// DEFINITIONS
// ============================================================================

/// The advertised prompt list.
pub fn available_prompts() -> Vec<Prompt> {
    vec![
        Prompt {
            name: "database_overview".to_string(),
            description: Some(
                "Orient an agent in this database: namespaces, tables, and how to query them"
                    .to_string(),
            ),
            arguments: None,
        },
        Prompt {
            name: "table_crud_guide".to_string(),
            description: Some(
                "Concrete CRUD walkthrough for one table, with example tool calls".to_string(),
            ),
            arguments: Some(vec![PromptArgument {
                name: "table".to_string(),
                description: Some("Table path segment".to_string()),
                required: true,
            }]),
        },
    ]
}

// ============================================================================
// RENDERING
// ============================================================================

/// Render a prompt for this session's claims.
pub fn render_prompt(
    state: &AppState,
    claims: &TokenClaims,
    name: &str,
    arguments: &JsonValue,
) -> ApiResult<GetPromptResult> {
    match name {
        "database_overview" => Ok(overview(state, claims)),
        "table_crud_guide" => {
            let segment = arguments["table"]
                .as_str()
                .ok_or_else(|| ApiError::validation_failed("Missing 'table' argument"))?;
            crud_guide(state, claims, segment)
        }
        other => Err(ApiError::not_found(format!("Unknown prompt '{other}'"))),
    }
}

fn overview(state: &AppState, claims: &TokenClaims) -> GetPromptResult {
    let mut text = String::from(
        "You are connected to a relational database through the pgcrud gateway.\n\
         Use list_tables and describe_table to explore, then list_records / \
         get_record / create_record / update_record / delete_record to work \
         with data.\n\nAccessible tables:\n",
    );

    for entity in state.model.entities() {
        if !claims.can_see(&entity.namespace) {
            continue;
        }
        text.push_str(&format!(
            "- {} (path segment: {}, primary key: {})\n",
            entity.qualified_identifier(),
            entity.route_segment(),
            if entity.primary_key_columns.is_empty() {
                "none".to_string()
            } else {
                entity.primary_key_columns.join(", ")
            },
        ));
    }

    text.push_str(
        "\nFilters use 'column -> operator:value' pairs with operators \
         eq, neq, gt, gte, lt, lte, like, ilike, is, in.\n",
    );

    GetPromptResult {
        description: Some("Database overview".to_string()),
        messages: vec![PromptMessage {
            role: "user".to_string(),
            content: ContentBlock::Text { text },
        }],
    }
}

fn crud_guide(state: &AppState, claims: &TokenClaims, segment: &str) -> ApiResult<GetPromptResult> {
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

    let columns: Vec<String> = entity
        .columns
        .iter()
        .map(|c| format!("{} ({})", c.name, c.sql_type_tag))
        .collect();

    let mut text = format!(
        "Working with table {} via the '{segment}' tools.\n\nColumns: {}.\n\n\
         List records:\n  list_records {{\"table\": \"{segment}\", \
         \"filters\": {{\"{col}\": \"eq:VALUE\"}}, \"page\": 1, \"pageSize\": 25}}\n",
        entity.qualified_identifier(),
        columns.join(", "),
        col = entity
            .default_sort_column()
            .unwrap_or("id"),
    );

    if entity.supports_by_key() {
        let key_shape = if entity.primary_key_columns.len() > 1 {
            format!(
                "comma-joined values for ({})",
                entity.primary_key_columns.join(", ")
            )
        } else {
            format!("the {} value", entity.primary_key_columns[0])
        };
        text.push_str(&format!(
            "\nRead / update / delete by key (key is {key_shape}):\n  \
             get_record {{\"table\": \"{segment}\", \"key\": \"…\"}}\n  \
             update_record {{\"table\": \"{segment}\", \"key\": \"…\", \"record\": {{…}}}}\n  \
             delete_record {{\"table\": \"{segment}\", \"key\": \"…\"}}\n",
        ));
    } else {
        text.push_str("\nThis table has no primary key: by-key operations are unavailable.\n");
    }

    if entity.has_deleted_at() {
        text.push_str(
            "\nDeletes on this table are soft (they stamp deleted_at). Soft-deleted \
             rows stay visible; filter live rows with \
             {\"deleted_at\": \"is:null\"}.\n",
        );
    }

    Ok(GetPromptResult {
        description: Some(format!("CRUD guide for {segment}")),
        messages: vec![PromptMessage {
            role: "user".to_string(),
            content: ContentBlock::Text { text },
        }],
    })
}
