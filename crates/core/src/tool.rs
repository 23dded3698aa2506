//! Tool trait, registry, and dispatcher.
//!
//! Tools are the agent's only way to change state: create events, attach
//! memories, share invite links. The registry maps names to trait objects and
//! every call goes through the same pipeline before a tool body runs:
//! lookup, schema validation, then capability check against the store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::{debug, warn};
use crate::context::ExecutionContext;
use crate::error::{ToolError, ToolFailureKind};
use crate::provider::ToolDefinition;
use crate::schema;
use crate::store::{EventId, MemoryId};

/// A request to execute a tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique call ID (matches the model's tool_use id)
    pub id: String,

    /// Name of the tool to execute
    pub name: String,

    /// Arguments as a JSON value
    pub arguments: Value,
}

/// What a successful tool call hands back to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    /// Short human-readable summary
    pub output: String,

    /// Optional structured data
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ToolResult {
    pub fn text(output: impl Into<String>) -> Self {
        Self { output: output.into(), data: None }
    }

    pub fn with_data(output: impl Into<String>, data: Value) -> Self {
        Self { output: output.into(), data: Some(data) }
    }
}

/// The capability a call needs, derived from its (already validated) arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Anyone may call it; the tool scopes its own reads to the caller.
    Open,
    /// Caller must belong to the event.
    EventMember(EventId),
    /// Caller must belong to the event that owns the memory.
    MemoryEditor(MemoryId),
}

/// The core Tool trait.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "create_event").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the model).
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's parameters.
    fn parameters_schema(&self) -> Value;

    /// Capability required for these arguments. Called after validation.
    fn access(&self, _arguments: &Value) -> Access {
        Access::Open
    }

    /// Execute the tool. Must leave no partial state behind on error.
    async fn execute(&self, arguments: Value, ctx: &ExecutionContext) -> Result<ToolResult, ToolError>;

    /// Convert this tool into a ToolDefinition for sending to the model.
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ToolOutcome {
    Success(ToolResult),
    Failure { kind: ToolFailureKind, message: String },
}

/// Append-only record of one executed tool call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInvocation {
    pub call_id: String,
    pub name: String,
    pub arguments: Value,
    pub outcome: ToolOutcome,
    pub duration_ms: u64,
    pub completed_at: DateTime<Utc>,
}

impl ToolInvocation {
    pub fn succeeded(&self) -> bool {
        matches!(self.outcome, ToolOutcome::Success(_))
    }

    /// The payload fed back to the model for this call.
    pub fn to_model_payload(&self) -> Value {
        match &self.outcome {
            ToolOutcome::Success(result) => {
                let mut payload = json!({ "success": true, "output": result.output });
                if let Some(data) = &result.data {
                    payload["data"] = data.clone();
                }
                payload
            }
            ToolOutcome::Failure { kind, message } => json!({
                "success": false,
                "error": { "kind": kind, "message": message },
            }),
        }
    }
}

/// A registry of available tools, keyed and listed by name.
pub struct ToolRegistry {
    tools: BTreeMap<String, Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: BTreeMap::new(),
        }
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        let name = tool.name().to_string();
        self.tools.insert(name, tool);
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(name).map(|t| t.as_ref())
    }

    /// Schemas of every tool, sorted by name.
    pub fn schemas(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|t| t.to_definition()).collect()
    }

    /// List all registered tool names.
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Validate, authorize, and run one call.
    pub async fn execute(&self, call: &ToolCall, ctx: &ExecutionContext) -> Result<ToolResult, ToolError> {
        let tool = self
            .get(&call.name)
            .ok_or_else(|| ToolError::UnknownTool(call.name.clone()))?;

        schema::validate(&tool.parameters_schema(), &call.arguments)
            .map_err(|reason| ToolError::invalid(&call.name, reason))?;

        authorize(tool.name(), tool.access(&call.arguments), ctx).await?;

        tool.execute(call.arguments.clone(), ctx).await
    }

    /// Run one call and record it. Never fails: every error becomes a
    /// `Failure` outcome the model can read.
    pub async fn dispatch(&self, call: &ToolCall, ctx: &ExecutionContext) -> ToolInvocation {
        let started = Instant::now();
        let outcome = match self.execute(call, ctx).await {
            Ok(result) => {
                debug!(tool = %call.name, call_id = %call.id, "Tool succeeded");
                ToolOutcome::Success(result)
            }
            Err(e) => {
                warn!(tool = %call.name, call_id = %call.id, kind = ?e.kind(), error = %e, "Tool failed");
                ToolOutcome::Failure { kind: e.kind(), message: e.to_string() }
            }
        };

        ToolInvocation {
            call_id: call.id.clone(),
            name: call.name.clone(),
            arguments: call.arguments.clone(),
            outcome,
            duration_ms: started.elapsed().as_millis() as u64,
            completed_at: Utc::now(),
        }
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

async fn authorize(tool: &str, access: Access, ctx: &ExecutionContext) -> Result<(), ToolError> {
    let user = ctx.user_id();
    let event = match access {
        Access::Open => return Ok(()),
        Access::EventMember(event) => event,
        Access::MemoryEditor(memory) => {
            ctx.store()
                .get_memory(memory)
                .await
                .map_err(|e| ToolError::from_store(tool, e))?
                .event_id
        }
    };

    match ctx.store().is_member(user, event).await {
        Ok(true) => Ok(()),
        Ok(false) => Err(ToolError::denied(tool, format!("you are not a member of event {event}"))),
        Err(e) => Err(ToolError::from_store(tool, e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str { "echo" }
        fn description(&self) -> &str { "Echoes back the input" }
        fn parameters_schema(&self) -> Value {
            json!({
                "type": "object",
                "properties": {
                    "text": { "type": "string" }
                },
                "required": ["text"]
            })
        }
        async fn execute(&self, arguments: Value, _ctx: &ExecutionContext) -> Result<ToolResult, ToolError> {
            Ok(ToolResult::text(arguments["text"].as_str().unwrap_or("")))
        }
    }

    struct NoteTool;

    #[async_trait]
    impl Tool for NoteTool {
        fn name(&self) -> &str { "add_note" }
        fn description(&self) -> &str { "Adds a note" }
        fn parameters_schema(&self) -> Value {
            json!({ "type": "object", "properties": { "event_id": { "type": "integer" } } })
        }
        fn access(&self, arguments: &Value) -> Access {
            arguments["event_id"].as_i64().map_or(Access::Open, Access::EventMember)
        }
        async fn execute(&self, _arguments: Value, _ctx: &ExecutionContext) -> Result<ToolResult, ToolError> {
            Ok(ToolResult::text("noted"))
        }
    }

    #[test]
    fn registry_register_and_lookup() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool));
        assert!(registry.get("echo").is_some());
        assert!(registry.get("nonexistent").is_none());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn schemas_sorted_by_name() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool));
        registry.register(Box::new(NoteTool));
        let names: Vec<String> = registry.schemas().into_iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["add_note", "echo"]);
    }

    #[test]
    fn access_is_derived_from_arguments() {
        assert_eq!(NoteTool.access(&json!({"event_id": 4})), Access::EventMember(4));
        assert_eq!(EchoTool.access(&json!({"text": "x"})), Access::Open);
    }

    #[test]
    fn failure_payload_carries_kind() {
        let invocation = ToolInvocation {
            call_id: "c1".into(),
            name: "ghost".into(),
            arguments: json!({}),
            outcome: ToolOutcome::Failure {
                kind: ToolFailureKind::UnknownTool,
                message: "Unknown tool: ghost".into(),
            },
            duration_ms: 0,
            completed_at: Utc::now(),
        };
        let payload = invocation.to_model_payload();
        assert_eq!(payload["success"], false);
        assert_eq!(payload["error"]["kind"], "unknown_tool");
        assert!(!invocation.succeeded());
    }

    #[test]
    fn success_payload_includes_data() {
        let invocation = ToolInvocation {
            call_id: "c2".into(),
            name: "echo".into(),
            arguments: json!({"text": "hi"}),
            outcome: ToolOutcome::Success(ToolResult::with_data("hi", json!({"n": 1}))),
            duration_ms: 3,
            completed_at: Utc::now(),
        };
        let payload = invocation.to_model_payload();
        assert_eq!(payload["success"], true);
        assert_eq!(payload["output"], "hi");
        assert_eq!(payload["data"]["n"], 1);
    }
}
