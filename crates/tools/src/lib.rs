//! Built-in tool implementations for Keepsake.
//!
//! Tools give the agent its only way to act: create and join events, attach
//! memories (text and media from the current batch), edit them, look things
//! up, and share invite links. Membership checks run in the registry before a
//! tool body executes; tools only declare which event they touch.

pub mod create_event;
pub mod join_event;
pub mod add_memory;
pub mod update_memory;
pub mod list_events;
pub mod list_memories;
pub mod summarize_event;
pub mod invite_link;
pub mod search_memories;
pub mod faq;

use keepsake_core::error::ToolError;
use keepsake_core::store::EventId;
use keepsake_core::tool::{Access, ToolRegistry};
use serde_json::Value;

/// Values tools need from configuration.
#[derive(Debug, Clone)]
pub struct ToolSettings {
    /// Bot account invite links point at
    pub bot_username: String,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self { bot_username: "memories_bot".into() }
    }
}

/// Create a tool registry with every built-in tool.
pub fn default_registry(settings: &ToolSettings) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(create_event::CreateEventTool));
    registry.register(Box::new(join_event::JoinEventTool));
    registry.register(Box::new(join_event::JoinEventInviteTool));
    registry.register(Box::new(add_memory::AddMemoryTool));
    registry.register(Box::new(add_memory::AddBatchMemoriesTool));
    registry.register(Box::new(update_memory::UpdateMemoryTool));
    registry.register(Box::new(list_events::ListEventsTool));
    registry.register(Box::new(list_memories::ListMemoriesTool));
    registry.register(Box::new(summarize_event::SummarizeEventTool));
    registry.register(Box::new(invite_link::GenerateInviteLinkTool::new(&settings.bot_username)));
    registry.register(Box::new(search_memories::SearchMemoriesTool));
    registry.register(Box::new(faq::GetFaqTool));
    registry
}

pub(crate) fn require_i64(tool: &str, arguments: &Value, key: &str) -> Result<i64, ToolError> {
    arguments[key]
        .as_i64()
        .ok_or_else(|| ToolError::invalid(tool, format!("'{key}' must be an integer")))
}

/// A trimmed, non-empty string argument.
pub(crate) fn optional_text(arguments: &Value, key: &str) -> Option<String> {
    arguments[key]
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Access rule for tools whose target is an `event_id` argument.
pub(crate) fn event_member_access(arguments: &Value) -> Access {
    arguments["event_id"]
        .as_i64()
        .map_or(Access::Open, |id: EventId| Access::EventMember(id))
}
