//! List memories tool — every memory of one event, with media URLs.

use async_trait::async_trait;
use keepsake_core::context::ExecutionContext;
use keepsake_core::error::ToolError;
use keepsake_core::tool::{Access, Tool, ToolResult};
use serde_json::{Value, json};
use crate::{event_member_access, require_i64};

pub struct ListMemoriesTool;

#[async_trait]
impl Tool for ListMemoriesTool {
    fn name(&self) -> &str {
        "list_memories"
    }

    fn description(&self) -> &str {
        "List the memories of an event the user belongs to, including links to photos and videos."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "event_id": {
                    "type": "integer",
                    "description": "ID of the event",
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
        let memories = ctx
            .store()
            .list_memories(event_id)
            .await
            .map_err(|e| ToolError::from_store(self.name(), e))?;

        let mut items = Vec::with_capacity(memories.len());
        for memory in &memories {
            let url = match &memory.media {
                Some(media) => Some(
                    ctx.media()
                        .url(&media.address)
                        .await
                        .map_err(|e| ToolError::from_media(self.name(), e))?,
                ),
                None => None,
            };
            items.push(json!({
                "memory_id": memory.id,
                "text": memory.text,
                "media_url": url,
                "media_description": memory.media_description,
                "created_at": memory.created_at.to_rfc3339(),
            }));
        }

        let output = if memories.is_empty() {
            format!("Event #{event_id} has no memories yet.")
        } else {
            format!("Event #{event_id} has {} memories.", memories.len())
        };
        Ok(ToolResult::with_data(output, json!({ "event_id": event_id, "memories": items })))
    }
}
