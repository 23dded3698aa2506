//! Update memory tool — corrects the text or media description of a memory.

use async_trait::async_trait;
use keepsake_core::context::ExecutionContext;
use keepsake_core::error::ToolError;
use keepsake_core::store::MemoryPatch;
use keepsake_core::tool::{Access, Tool, ToolResult};
use serde_json::{Value, json};
use crate::{optional_text, require_i64};

pub struct UpdateMemoryTool;

#[async_trait]
impl Tool for UpdateMemoryTool {
    fn name(&self) -> &str {
        "update_memory"
    }

    fn description(&self) -> &str {
        "Update an existing memory's text and/or media description. At least one must be given."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "memory_id": {
                    "type": "integer",
                    "description": "ID of the memory to update",
                    "minimum": 1
                },
                "text": {
                    "type": "string",
                    "description": "New text for the memory"
                },
                "media_description": {
                    "type": "string",
                    "description": "New description of the memory's photo or video"
                }
            },
            "required": ["memory_id"],
            "additionalProperties": false
        })
    }

    fn access(&self, arguments: &Value) -> Access {
        arguments["memory_id"].as_i64().map_or(Access::Open, Access::MemoryEditor)
    }

    async fn execute(&self, arguments: Value, ctx: &ExecutionContext) -> Result<ToolResult, ToolError> {
        let memory_id = require_i64(self.name(), &arguments, "memory_id")?;
        let patch = MemoryPatch {
            text: optional_text(&arguments, "text"),
            media_description: optional_text(&arguments, "media_description"),
        };
        if patch.is_empty() {
            return Err(ToolError::invalid(self.name(), "provide 'text' or 'media_description'"));
        }

        let memory = ctx
            .store()
            .update_memory(ctx.user_id(), memory_id, patch)
            .await
            .map_err(|e| ToolError::from_store(self.name(), e))?;

        Ok(ToolResult::with_data(
            format!("Memory #{} updated.", memory.id),
            json!({
                "memory_id": memory.id,
                "event_id": memory.event_id,
                "text": memory.text,
                "media_description": memory.media_description,
            }),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::Fixture;
    use keepsake_core::store::{NewMemory, Store};

    #[tokio::test]
    async fn updates_text() {
        let fx = Fixture::new();
        let ana = fx.user("100").await;
        let trip = fx.event(ana, "Lisbon").await;
        let memory = fx
            .store
            .add_memories(ana, trip.id, vec![NewMemory { text: Some("tram".into()), ..NewMemory::default() }])
            .await
            .unwrap()
            .remove(0);

        UpdateMemoryTool
            .execute(json!({"memory_id": memory.id, "text": "tram 28 to Alfama"}), &fx.ctx(ana))
            .await
            .unwrap();
        assert_eq!(fx.store.get_memory(memory.id).await.unwrap().text.as_deref(), Some("tram 28 to Alfama"));
    }

    #[tokio::test]
    async fn requires_a_change() {
        let fx = Fixture::new();
        let ana = fx.user("100").await;
        let err = UpdateMemoryTool
            .execute(json!({"memory_id": 1, "text": "  "}), &fx.ctx(ana))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments { .. }));
    }

    #[test]
    fn access_targets_memory() {
        assert_eq!(UpdateMemoryTool.access(&json!({"memory_id": 8})), Access::MemoryEditor(8));
    }
}
