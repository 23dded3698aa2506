//! Summarize event tool — gathers everything the model needs to write a recap.

use async_trait::async_trait;
use keepsake_core::context::ExecutionContext;
use keepsake_core::error::ToolError;
use keepsake_core::tool::{Access, Tool, ToolResult};
use serde_json::{Value, json};
use crate::{event_member_access, require_i64};

pub struct SummarizeEventTool;

#[async_trait]
impl Tool for SummarizeEventTool {
    fn name(&self) -> &str {
        "summarize_event"
    }

    fn description(&self) -> &str {
        "Collect an event's details, statistics, text memories, and photo links so you can \
         write the user a summary of it."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "event_id": {
                    "type": "integer",
                    "description": "ID of the event to summarize",
                    "minimum": 1
                }
            },
            "required": ["event_id"],
            "additionalProperties": false
        })
    }

    fn access(&self, arguments: &Value) -> Access {
        event_member_access(arguments)
    }

    async fn execute(&self, arguments: Value, ctx: &ExecutionContext) -> Result<ToolResult, ToolError> {
        let event_id = require_i64(self.name(), &arguments, "event_id")?;
        let store = ctx.store();
        let to_tool_error = |e| ToolError::from_store(self.name(), e);

        let event = store.get_event(event_id).await.map_err(to_tool_error)?;
        let members = store.members(event_id).await.map_err(to_tool_error)?;
        let memories = store.list_memories(event_id).await.map_err(to_tool_error)?;

        let with_media = memories.iter().filter(|m| m.media.is_some()).count();
        let with_text = memories.iter().filter(|m| m.text.is_some()).count();
        let texts: Vec<&str> = memories.iter().filter_map(|m| m.text.as_deref()).collect();

        let mut photos = Vec::new();
        for memory in memories.iter().filter(|m| m.media.is_some()) {
            if let Some(media) = &memory.media {
                let url = ctx
                    .media()
                    .url(&media.address)
                    .await
                    .map_err(|e| ToolError::from_media(self.name(), e))?;
                photos.push(json!({
                    "url": url,
                    "description": memory.media_description.as_deref().or(memory.text.as_deref()),
                    "created_at": memory.created_at.to_rfc3339(),
                }));
            }
        }

        let output = if memories.is_empty() {
            format!("'{}' has no memories yet.", event.name)
        } else {
            format!(
                "'{}' has {} memories ({} with media) from {} member(s).",
                event.name,
                memories.len(),
                with_media,
                members.len()
            )
        };

        Ok(ToolResult::with_data(
            output,
            json!({
                "event_name": event.name,
                "event_description": event.description,
                "event_date": event.event_date,
                "invite_code": event.invite_code,
                "statistics": {
                    "total_memories": memories.len(),
                    "with_media": with_media,
                    "with_text": with_text,
                    "members": members.len(),
                },
                "text_memories": texts,
                "photos": photos,
            }),
        ))
    }
}
