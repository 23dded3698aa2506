//! Invite link tool — a deep link that joins the opener to an event.

use async_trait::async_trait;
use keepsake_core::context::ExecutionContext;
use keepsake_core::error::ToolError;
use keepsake_core::tool::{Access, Tool, ToolResult};
use serde_json::{Value, json};
use crate::{event_member_access, require_i64};

pub struct GenerateInviteLinkTool {
    bot_username: String,
}

impl GenerateInviteLinkTool {
    pub fn new(bot_username: &str) -> Self {
        Self { bot_username: bot_username.trim_start_matches('@').to_string() }
    }

    fn link(&self, invite_code: &str) -> String {
        format!("https://t.me/{}?start={invite_code}", self.bot_username)
    }
}

#[async_trait]
impl Tool for GenerateInviteLinkTool {
    fn name(&self) -> &str {
        "generate_invite_link"
    }

    fn description(&self) -> &str {
        "Generate a shareable link that lets other people join an event."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "event_id": {
                    "type": "integer",
                    "description": "ID of the event to generate an invite link for",
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
        let event = ctx
            .store()
            .get_event(event_id)
            .await
            .map_err(|e| ToolError::from_store(self.name(), e))?;

        let link = self.link(&event.invite_code);
        Ok(ToolResult::with_data(
            format!("Invite link for '{}': {link}", event.name),
            json!({
                "event_id": event.id,
                "event_name": event.name,
                "invite_code": event.invite_code,
                "invite_link": link,
            }),
        ))
    }
}
