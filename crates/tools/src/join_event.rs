//! Join tools — by event id, or by the invite code carried in a shared link.

use async_trait::async_trait;
use keepsake_core::context::ExecutionContext;
use keepsake_core::error::ToolError;
use keepsake_core::store::{EventRecord, JoinOutcome};
use keepsake_core::tool::{Tool, ToolResult};
use serde_json::{Value, json};
use tracing::info;
use crate::{optional_text, require_i64};

fn join_result(event: &EventRecord, outcome: JoinOutcome) -> ToolResult {
    let output = match outcome {
        JoinOutcome::Joined => format!(
            "Joined '{}' (#{}). You can now add memories, view them, and share invite links.",
            event.name, event.id
        ),
        JoinOutcome::AlreadyMember => {
            format!("You're already a member of '{}' (#{}).", event.name, event.id)
        }
    };
    ToolResult::with_data(
        output,
        json!({
            "event_id": event.id,
            "event_name": event.name,
            "outcome": outcome,
        }),
    )
}

pub struct JoinEventTool;

#[async_trait]
impl Tool for JoinEventTool {
    fn name(&self) -> &str {
        "join_event"
    }

    fn description(&self) -> &str {
        "Join an existing event by its numeric id."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "event_id": {
                    "type": "integer",
                    "description": "ID of the event to join",
                    "minimum": 1
                }
            },
            "required": ["event_id"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, arguments: Value, ctx: &ExecutionContext) -> Result<ToolResult, ToolError> {
        let event_id = require_i64(self.name(), &arguments, "event_id")?;
        let store = ctx.store();

        let event = store
            .get_event(event_id)
            .await
            .map_err(|e| ToolError::from_store(self.name(), e))?;
        let outcome = store
            .join_event(ctx.user_id(), event_id)
            .await
            .map_err(|e| ToolError::from_store(self.name(), e))?;

        info!(event_id, user_id = ctx.user_id(), ?outcome, "Join by id");
        Ok(join_result(&event, outcome))
    }
}

pub struct JoinEventInviteTool;

const INVITE_PREFIX: &str = "evt_";
const INVITE_SUFFIX_LEN: usize = 16;

/// `evt_` followed by exactly 16 lowercase letters or digits.
fn is_valid_invite_code(code: &str) -> bool {
    code.strip_prefix(INVITE_PREFIX).is_some_and(|suffix| {
        suffix.len() == INVITE_SUFFIX_LEN
            && suffix.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
    })
}

#[async_trait]
impl Tool for JoinEventInviteTool {
    fn name(&self) -> &str {
        "join_event_invite"
    }

    fn description(&self) -> &str {
        "Join an event using an invite code from a shared link (format: evt_ followed by 16 characters)."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "invite_code": {
                    "type": "string",
                    "description": "Event invite code (format: evt_<16 chars>)"
                }
            },
            "required": ["invite_code"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, arguments: Value, ctx: &ExecutionContext) -> Result<ToolResult, ToolError> {
        let code = optional_text(&arguments, "invite_code").unwrap_or_default();
        if !is_valid_invite_code(&code) {
            return Err(ToolError::invalid(self.name(), "invalid invite code format"));
        }

        let store = ctx.store();
        let event = store
            .find_event_by_invite(&code)
            .await
            .map_err(|e| ToolError::from_store(self.name(), e))?;
        let outcome = store
            .join_event(ctx.user_id(), event.id)
            .await
            .map_err(|e| ToolError::from_store(self.name(), e))?;

        info!(event_id = event.id, user_id = ctx.user_id(), ?outcome, "Join by invite");
        Ok(join_result(&event, outcome))
    }
}
