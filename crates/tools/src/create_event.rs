//! Create event tool — opens a new event and makes the caller its first member.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate};
use keepsake_core::context::ExecutionContext;
use keepsake_core::error::ToolError;
use keepsake_core::store::NewEvent;
use keepsake_core::tool::{Tool, ToolResult};
use serde_json::{Value, json};
use tracing::info;
use crate::optional_text;

pub struct CreateEventTool;

/// Accepts `YYYY-MM-DD` or a full RFC 3339 timestamp.
fn parse_event_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.date_naive()))
}

#[async_trait]
impl Tool for CreateEventTool {
    fn name(&self) -> &str {
        "create_event"
    }

    fn description(&self) -> &str {
        "Create a new event to collect memories in. The user is added to the event automatically. \
         Returns the new event's id and invite code."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "name": {
                    "type": "string",
                    "description": "Name of the event",
                    "minLength": 1
                },
                "description": {
                    "type": "string",
                    "description": "Optional description of the event"
                },
                "event_date": {
                    "type": "string",
                    "description": "Optional date of the event in ISO format (YYYY-MM-DD)"
                }
            },
            "required": ["name"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, arguments: Value, ctx: &ExecutionContext) -> Result<ToolResult, ToolError> {
        let name = optional_text(&arguments, "name")
            .ok_or_else(|| ToolError::invalid(self.name(), "'name' must not be empty"))?;

        let event_date = match optional_text(&arguments, "event_date") {
            Some(raw) => Some(parse_event_date(&raw).ok_or_else(|| {
                ToolError::invalid(self.name(), format!("'{raw}' is not a valid date, use YYYY-MM-DD"))
            })?),
            None => None,
        };

        let event = ctx
            .store()
            .create_event(
                ctx.user_id(),
                NewEvent {
                    name,
                    description: optional_text(&arguments, "description"),
                    event_date,
                },
            )
            .await
            .map_err(|e| ToolError::from_store(self.name(), e))?;

        info!(event_id = event.id, user_id = ctx.user_id(), "Event created");

        Ok(ToolResult::with_data(
            format!("Event '{}' created with id #{}. You are its first member.", event.name, event.id),
            json!({
                "event_id": event.id,
                "name": event.name,
                "event_date": event.event_date,
                "invite_code": event.invite_code,
            }),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::Fixture;
    use keepsake_core::store::Store;

    #[test]
    fn parses_plain_and_rfc3339_dates() {
        assert_eq!(parse_event_date("2025-12-25"), NaiveDate::from_ymd_opt(2025, 12, 25));
        assert_eq!(parse_event_date("2025-06-01T18:30:00+02:00"), NaiveDate::from_ymd_opt(2025, 6, 1));
        assert_eq!(parse_event_date("next friday"), None);
    }

    #[tokio::test]
    async fn creates_event_with_date() {
        let fx = Fixture::new();
        let ana = fx.user("100").await;
        let result = CreateEventTool
            .execute(json!({"name": " Christmas ", "event_date": "2025-12-25"}), &fx.ctx(ana))
            .await
            .unwrap();

        let data = result.data.unwrap();
        assert_eq!(data["name"], "Christmas");
        assert_eq!(data["event_date"], "2025-12-25");
        let id = data["event_id"].as_i64().unwrap();
        assert!(fx.store.is_member(ana, id).await.unwrap());
    }

    #[tokio::test]
    async fn invalid_date_creates_nothing() {
        let fx = Fixture::new();
        let ana = fx.user("100").await;
        let err = CreateEventTool
            .execute(json!({"name": "Party", "event_date": "tomorrow"}), &fx.ctx(ana))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments { .. }));
        assert!(fx.store.list_events_for(ana).await.unwrap().is_empty());
    }
}
