//! List events tool — the caller's events.

use async_trait::async_trait;
use keepsake_core::context::ExecutionContext;
use keepsake_core::error::ToolError;
use keepsake_core::tool::{Tool, ToolResult};
use serde_json::{Value, json};

pub struct ListEventsTool;

#[async_trait]
impl Tool for ListEventsTool {
    fn name(&self) -> &str {
        "list_events"
    }

    fn description(&self) -> &str {
        "List all events the user is a member of."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {},
            "additionalProperties": false
        })
    }

    async fn execute(&self, _arguments: Value, ctx: &ExecutionContext) -> Result<ToolResult, ToolError> {
        let events = ctx
            .store()
            .list_events_for(ctx.user_id())
            .await
            .map_err(|e| ToolError::from_store(self.name(), e))?;

        if events.is_empty() {
            return Ok(ToolResult::with_data(
                "You are not part of any events yet.",
                json!({ "events": [] }),
            ));
        }

        let lines: Vec<String> = events
            .iter()
            .map(|e| match e.event_date {
                Some(date) => format!("#{} {} ({date})", e.id, e.name),
                None => format!("#{} {}", e.id, e.name),
            })
            .collect();
        let data: Vec<Value> = events
            .iter()
            .map(|e| {
                json!({
                    "event_id": e.id,
                    "name": e.name,
                    "description": e.description,
                    "event_date": e.event_date,
                })
            })
            .collect();

        Ok(ToolResult::with_data(lines.join("\n"), json!({ "events": data })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::Fixture;

    #[tokio::test]
    async fn lists_only_member_events() {
        let fx = Fixture::new();
        let ana = fx.user("100").await;
        let ben = fx.user("200").await;
        fx.event(ana, "Lisbon").await;
        fx.event(ben, "Berlin").await;

        let result = ListEventsTool.execute(json!({}), &fx.ctx(ana)).await.unwrap();
        let events = result.data.unwrap()["events"].as_array().unwrap().clone();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0]["name"], "Lisbon");
        assert!(result.output.contains("#1 Lisbon"));
    }

    #[tokio::test]
    async fn empty_list_is_success() {
        let fx = Fixture::new();
        let ana = fx.user("100").await;
        let result = ListEventsTool.execute(json!({}), &fx.ctx(ana)).await.unwrap();
        assert!(result.output.contains("not part of any events"));
    }
}
