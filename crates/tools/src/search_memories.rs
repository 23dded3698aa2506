//! Search memories tool — finds memories across the caller's events.

use async_trait::async_trait;
use keepsake_core::context::ExecutionContext;
use keepsake_core::error::ToolError;
use keepsake_core::tool::{Tool, ToolResult};
use serde_json::{Value, json};
use crate::optional_text;

const DEFAULT_LIMIT: usize = 5;

pub struct SearchMemoriesTool;

#[async_trait]
impl Tool for SearchMemoriesTool {
    fn name(&self) -> &str {
        "search_memories"
    }

    fn description(&self) -> &str {
        "Search the memories of every event the user belongs to. Use this when the user asks \
         about something they saved before."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "What to look for",
                    "minLength": 1
                },
                "limit": {
                    "type": "integer",
                    "description": "Maximum number of memories to return (default 5)",
                    "minimum": 1,
                    "maximum": 20
                }
            },
            "required": ["query"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, arguments: Value, ctx: &ExecutionContext) -> Result<ToolResult, ToolError> {
        let query = optional_text(&arguments, "query")
            .ok_or_else(|| ToolError::invalid(self.name(), "'query' must not be empty"))?;
        let limit = arguments["limit"].as_u64().map_or(DEFAULT_LIMIT, |l| l as usize);

        let hits = ctx
            .store()
            .search_memories(ctx.user_id(), &query, limit)
            .await
            .map_err(|e| ToolError::from_store(self.name(), e))?;

        let results: Vec<Value> = hits
            .iter()
            .map(|m| {
                json!({
                    "memory_id": m.id,
                    "event_id": m.event_id,
                    "text": m.text,
                    "media_description": m.media_description,
                    "has_media": m.media.is_some(),
                })
            })
            .collect();

        let output = if hits.is_empty() {
            format!("No memories found matching '{query}'.")
        } else {
            format!("Found {} memories matching '{query}'.", hits.len())
        };
        Ok(ToolResult::with_data(output, json!({ "results": results })))
    }
}
