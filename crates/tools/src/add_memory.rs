//! Memory capture tools.
//!
//! `add_memory` saves one memory, optionally with a media item picked by its
//! position in the current batch. `add_batch_memories` saves every media item
//! of the batch at once, each with the text that arrived alongside it.
//!
//! Media is persisted before the store write and without holding any store
//! lock. The media store is content addressed, so a store failure afterwards
//! leaves nothing but an unreferenced blob that a retry will reuse.

use async_trait::async_trait;
use keepsake_core::batch::BatchMedia;
use keepsake_core::context::ExecutionContext;
use keepsake_core::error::ToolError;
use keepsake_core::store::{MemoryRecord, NewMemory};
use keepsake_core::tool::{Access, Tool, ToolResult};
use serde_json::{Value, json};
use tracing::info;
use crate::{event_member_access, optional_text, require_i64};

fn memory_summary(memories: &[MemoryRecord]) -> Value {
    Value::Array(
        memories
            .iter()
            .map(|m| {
                json!({
                    "memory_id": m.id,
                    "text": m.text,
                    "has_media": m.media.is_some(),
                })
            })
            .collect(),
    )
}

async fn persist_item(tool: &str, ctx: &ExecutionContext, item: &BatchMedia, text: Option<String>) -> Result<NewMemory, ToolError> {
    let stored = ctx
        .media()
        .persist(&item.media)
        .await
        .map_err(|e| ToolError::from_media(tool, e))?;
    Ok(NewMemory {
        text,
        media: Some(stored),
        media_description: None,
        source_message_id: Some(item.message_id.clone()),
    })
}

pub struct AddMemoryTool;

#[async_trait]
impl Tool for AddMemoryTool {
    fn name(&self) -> &str {
        "add_memory"
    }

    fn description(&self) -> &str {
        "Add a memory to an event. Provide text, a media_position pointing at one of the media \
         items the user just sent (1 = first), or both. Without text, the media's caption is used."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "event_id": {
                    "type": "integer",
                    "description": "ID of the event",
                    "minimum": 1
                },
                "text": {
                    "type": "string",
                    "description": "Text content of the memory"
                },
                "media_position": {
                    "type": "integer",
                    "description": "1-based position of a media item in the current messages",
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
        let text = optional_text(&arguments, "text");
        let position = arguments["media_position"].as_u64().map(|p| p as usize);

        let memory = match position {
            Some(position) => {
                let batch = ctx.batch();
                let item = batch.media_at(position).ok_or_else(|| {
                    ToolError::invalid(
                        self.name(),
                        format!("media_position {position} is out of range, {} media item(s) available", batch.media.len()),
                    )
                })?;
                let text = text.or_else(|| {
                    Some(batch.caption_for(item).to_string()).filter(|c| !c.is_empty())
                });
                persist_item(self.name(), ctx, item, text).await?
            }
            None => {
                let text = text.ok_or_else(|| {
                    ToolError::invalid(self.name(), "provide 'text', 'media_position', or both")
                })?;
                NewMemory {
                    text: Some(text),
                    source_message_id: ctx.batch().message_ids.last().cloned(),
                    ..NewMemory::default()
                }
            }
        };

        let created = ctx
            .store()
            .add_memories(ctx.user_id(), event_id, vec![memory])
            .await
            .map_err(|e| ToolError::from_store(self.name(), e))?;

        info!(event_id, user_id = ctx.user_id(), with_media = position.is_some(), "Memory added");

        let output = match position {
            Some(p) => format!("Memory with media #{p} added to event #{event_id}."),
            None => format!("Memory added to event #{event_id}."),
        };
        Ok(ToolResult::with_data(output, json!({ "memories": memory_summary(&created) })))
    }
}

pub struct AddBatchMemoriesTool;

#[async_trait]
impl Tool for AddBatchMemoriesTool {
    fn name(&self) -> &str {
        "add_batch_memories"
    }

    fn description(&self) -> &str {
        "Save every media item the user just sent to one event, each with the text that came with it. \
         All items are saved or none are."
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
        let batch = ctx.batch();
        if batch.media.is_empty() {
            return Err(ToolError::invalid(self.name(), "there are no media items in the current messages"));
        }

        let mut memories = Vec::with_capacity(batch.media.len());
        for item in &batch.media {
            let caption = Some(batch.caption_for(item).to_string()).filter(|c| !c.is_empty());
            memories.push(persist_item(self.name(), ctx, item, caption).await?);
        }

        let created = ctx
            .store()
            .add_memories(ctx.user_id(), event_id, memories)
            .await
            .map_err(|e| ToolError::from_store(self.name(), e))?;

        info!(event_id, user_id = ctx.user_id(), count = created.len(), "Batch memories added");

        Ok(ToolResult::with_data(
            format!("{} memories added to event #{event_id}.", created.len()),
            json!({ "memories": memory_summary(&created) }),
        ))
    }
}
