//! FAQ tool — canned help about what the bot can do.

use async_trait::async_trait;
use keepsake_core::context::ExecutionContext;
use keepsake_core::error::ToolError;
use keepsake_core::tool::{Tool, ToolResult};
use serde_json::{Value, json};

pub struct GetFaqTool;

const TOPICS: [&str; 5] = ["upload_image", "invite_user", "create_event", "add_memory", "general"];

fn faq(topic: &str) -> (&'static str, &'static [&'static str]) {
    match topic {
        "upload_image" => (
            "How to upload a photo or video",
            &[
                "Make sure you belong to an event (ask me to list your events).",
                "Send the photo or video, optionally with a caption.",
                "Say which event it belongs to, e.g. 'add this to event #1'.",
                "Sending several at once is fine: I save them all and ask once.",
            ],
        ),
        "invite_user" => (
            "How to invite people to an event",
            &[
                "Ask me for an invite link, e.g. 'invite link for event #1'.",
                "Share the link. Opening it joins the event.",
                "Everyone in the event sees and adds to the same memories.",
            ],
        ),
        "create_event" => (
            "How to create an event",
            &[
                "Tell me the name, e.g. 'Create event Summer Trip'.",
                "Optionally add a date: 'Create event Christmas on 2025-12-25'.",
                "You join events you create automatically.",
            ],
        ),
        "add_memory" => (
            "How to add a memory",
            &[
                "Text: 'Add to event #1: we watched the sunset from the castle'.",
                "Media: send a photo or video and tell me the event.",
                "You can correct a memory later: 'change memory #4 to ...'.",
            ],
        ),
        _ => (
            "What I can do",
            &[
                "Create events and join them by id or invite link.",
                "Save text, photos, and videos as memories.",
                "List events and memories, search them, and summarize an event.",
                "Generate invite links to share an event.",
            ],
        ),
    }
}

#[async_trait]
impl Tool for GetFaqTool {
    fn name(&self) -> &str {
        "get_faq"
    }

    fn description(&self) -> &str {
        "Get help and instructions about how to use the bot's features."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "topic": {
                    "type": "string",
                    "description": "The help topic",
                    "enum": TOPICS
                }
            },
            "required": ["topic"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, arguments: Value, _ctx: &ExecutionContext) -> Result<ToolResult, ToolError> {
        let topic = arguments["topic"].as_str().unwrap_or("general");
        let (title, steps) = faq(topic);
        Ok(ToolResult::with_data(
            title,
            json!({ "topic": topic, "title": title, "steps": steps }),
        ))
    }
}
