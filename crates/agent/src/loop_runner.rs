//! The bounded reasoning loop.

use crate::retry::RetryPolicy;
use crate::turn::{AbortReason, AgentTurn};
use chrono::Utc;
use keepsake_config::AppConfig;
use keepsake_core::context::ExecutionContext;
use keepsake_core::event::{DomainEvent, EventBus};
use keepsake_core::message::Transcript;
use keepsake_core::provider::{Provider, ProviderRequest};
use keepsake_core::tool::{ToolCall, ToolRegistry};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Replies used when the model does not produce a usable answer.
#[derive(Debug, Clone)]
pub struct CannedReplies {
    /// Iteration cap reached
    pub fallback: String,
    /// The model answered with empty text
    pub clarify: String,
    /// The model could not be reached
    pub apology: String,
}

impl CannedReplies {
    fn from_config(config: &AppConfig) -> Self {
        Self {
            fallback: config.agent.fallback_message.clone(),
            clarify: config.agent.clarify_message.clone(),
            apology: config.agent.apology_message.clone(),
        }
    }
}

impl Default for CannedReplies {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

/// Orchestrates model calls and tool dispatch for one turn at a time.
pub struct AgentLoop {
    provider: Arc<dyn Provider>,
    tools: Arc<ToolRegistry>,
    events: Arc<EventBus>,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    max_iterations: u32,
    retry: RetryPolicy,
    replies: CannedReplies,
}

impl AgentLoop {
    /// Create a loop with default settings.
    pub fn new(provider: Arc<dyn Provider>, tools: Arc<ToolRegistry>, events: Arc<EventBus>) -> Self {
        Self::from_config(provider, tools, events, &AppConfig::default())
    }

    pub fn from_config(
        provider: Arc<dyn Provider>,
        tools: Arc<ToolRegistry>,
        events: Arc<EventBus>,
        config: &AppConfig,
    ) -> Self {
        Self {
            provider,
            tools,
            events,
            model: config.provider.model.clone(),
            temperature: config.provider.temperature,
            max_tokens: Some(config.provider.max_tokens),
            max_iterations: config.agent.max_iterations.max(1),
            retry: RetryPolicy::from_config(&config.retry),
            replies: CannedReplies::from_config(config),
        }
    }

    /// Set the maximum number of model calls per turn.
    pub fn with_max_iterations(mut self, max: u32) -> Self {
        self.max_iterations = max.max(1);
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_replies(mut self, replies: CannedReplies) -> Self {
        self.replies = replies;
        self
    }

    pub fn max_iterations(&self) -> u32 {
        self.max_iterations
    }

    pub fn replies(&self) -> &CannedReplies {
        &self.replies
    }

    /// Run one turn to a terminal state.
    ///
    /// Every path ends `Answered` or `Aborted` with a reply set. Tool calls
    /// are dispatched one at a time in the order the model listed them.
    pub async fn run(&self, transcript: Transcript, ctx: &ExecutionContext) -> AgentTurn {
        let mut turn = AgentTurn::new(transcript);
        let tool_definitions = self.tools.schemas();

        info!(
            turn_id = turn.id(),
            user_id = ctx.user_id(),
            messages = turn.transcript().len(),
            "Starting turn"
        );

        loop {
            if turn.iterations() >= self.max_iterations {
                warn!(
                    turn_id = turn.id(),
                    iterations = turn.iterations(),
                    "Iteration cap reached, aborting turn"
                );
                turn.abort(AbortReason::IterationLimit, self.replies.fallback.clone());
                break;
            }

            let iteration = turn.begin_iteration();
            debug!(turn_id = turn.id(), iteration, "Agent loop iteration");

            let request = ProviderRequest {
                model: self.model.clone(),
                messages: turn.transcript().messages().to_vec(),
                temperature: self.temperature,
                max_tokens: self.max_tokens,
                tools: tool_definitions.clone(),
            };

            let response = match self.retry.complete(self.provider.as_ref(), &request, &self.events).await {
                Ok(response) => response,
                Err(e) => {
                    warn!(turn_id = turn.id(), iteration, error = %e, "Model unavailable, aborting turn");
                    turn.abort(AbortReason::ModelUnavailable, self.replies.apology.clone());
                    break;
                }
            };

            if !response.requests_tools() {
                let text = response.message.content.trim().to_string();
                turn.push_message(response.message);
                if text.is_empty() {
                    debug!(turn_id = turn.id(), "Empty answer, asking the user to clarify");
                    turn.answer(self.replies.clarify.clone());
                } else {
                    turn.answer(text);
                }
                break;
            }

            let calls = response.message.tool_calls.clone();
            debug!(turn_id = turn.id(), iteration, tool_count = calls.len(), "Dispatching tool calls");
            turn.push_message(response.message);

            for tc in calls {
                let call = ToolCall {
                    id: tc.id,
                    name: tc.name,
                    arguments: tc.arguments,
                };
                let invocation = self.tools.dispatch(&call, ctx).await;
                self.events.publish(DomainEvent::ToolExecuted {
                    tool_name: invocation.name.clone(),
                    success: invocation.succeeded(),
                    duration_ms: invocation.duration_ms,
                    timestamp: Utc::now(),
                });
                turn.record(invocation);
            }
        }

        info!(
            turn_id = turn.id(),
            state = turn.state().label(),
            iterations = turn.iterations(),
            tool_calls = turn.invocations().len(),
            "Turn finished"
        );
        turn
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{ScriptedProvider, make_text_response, make_tool_call, make_tool_call_response};
    use crate::turn::TurnState;
    use keepsake_core::batch::SenderId;
    use keepsake_core::context::CallerIdentity;
    use keepsake_core::error::{ProviderError, ToolFailureKind};
    use keepsake_core::message::{Message, Role};
    use keepsake_core::store::{NewEvent, Store};
    use keepsake_core::tool::ToolOutcome;
    use keepsake_store::{InMemoryMediaStore, InMemoryStore};
    use keepsake_tools::{ToolSettings, default_registry};
    use serde_json::json;
    use std::time::Duration;

    struct Harness {
        store: Arc<InMemoryStore>,
        events: Arc<EventBus>,
        ctx: ExecutionContext,
    }

    async fn harness() -> Harness {
        let store = Arc::new(InMemoryStore::new());
        let media = Arc::new(InMemoryMediaStore::new());
        let user = store.upsert_user(&SenderId::new("100"), Some("Ana")).await.unwrap();
        let caller = CallerIdentity {
            user_id: user.id,
            sender: user.sender.clone(),
            display_name: user.display_name.clone(),
        };
        let ctx = ExecutionContext::new(caller, store.clone(), media);
        Harness { store, events: Arc::new(EventBus::default()), ctx }
    }

    fn agent(provider: Arc<ScriptedProvider>, events: Arc<EventBus>) -> AgentLoop {
        let tools = Arc::new(default_registry(&ToolSettings::default()));
        AgentLoop::new(provider, tools, events).with_max_iterations(5)
    }

    fn opening() -> Transcript {
        let mut t = Transcript::new();
        t.push(Message::system("rules"));
        t.push(Message::user("hello"));
        t
    }

    #[tokio::test]
    async fn simple_text_response() {
        let h = harness().await;
        let provider = Arc::new(ScriptedProvider::responses(vec![make_text_response("Hi Ana!")]));
        let turn = agent(provider.clone(), h.events.clone()).run(opening(), &h.ctx).await;

        assert_eq!(turn.state(), TurnState::Answered);
        assert_eq!(turn.reply(), Some("Hi Ana!"));
        assert_eq!(turn.iterations(), 1);
        // System + User + Assistant
        assert_eq!(turn.transcript().len(), 3);
        assert_eq!(provider.requests()[0].tools.len(), 12);
    }

    #[tokio::test]
    async fn unknown_tool_is_fed_back_and_loop_continues() {
        let h = harness().await;
        let provider = Arc::new(ScriptedProvider::responses(vec![
            make_tool_call_response(vec![make_tool_call("teleport", json!({}))], ""),
            make_text_response("I can't do that, sorry."),
        ]));
        let turn = agent(provider.clone(), h.events.clone()).run(opening(), &h.ctx).await;

        assert_eq!(turn.state(), TurnState::Answered);
        assert_eq!(turn.iterations(), 2);
        assert!(matches!(
            turn.invocations()[0].outcome,
            ToolOutcome::Failure { kind: ToolFailureKind::UnknownTool, .. }
        ));

        // The second model call saw the failure payload
        let second = &provider.requests()[1];
        let tool_msg = second.messages.iter().find(|m| m.role == Role::Tool).unwrap();
        assert_eq!(tool_msg.tool_call_id.as_deref(), Some("call_teleport"));
        assert!(tool_msg.content.contains("unknown_tool"));
    }

    #[tokio::test]
    async fn iteration_cap_aborts_with_fallback() {
        let h = harness().await;
        let provider = Arc::new(ScriptedProvider::always_tool("list_events", json!({}), 6));
        let turn = agent(provider.clone(), h.events.clone()).run(opening(), &h.ctx).await;

        assert_eq!(turn.state(), TurnState::Aborted(AbortReason::IterationLimit));
        assert_eq!(turn.reply(), Some(CannedReplies::default().fallback.as_str()));
        assert_eq!(turn.iterations(), 5);
        assert_eq!(provider.call_count(), 5);
        assert_eq!(turn.invocations().len(), 5);
    }

    #[tokio::test]
    async fn empty_answer_asks_for_clarification() {
        let h = harness().await;
        let provider = Arc::new(ScriptedProvider::responses(vec![make_text_response("  ")]));
        let turn = agent(provider, h.events.clone()).run(opening(), &h.ctx).await;

        assert_eq!(turn.state(), TurnState::Answered);
        assert_eq!(turn.reply(), Some(CannedReplies::default().clarify.as_str()));
    }

    #[tokio::test(start_paused = true)]
    async fn model_outage_aborts_with_apology() {
        let h = harness().await;
        let provider = Arc::new(ScriptedProvider::new(vec![
            Err(ProviderError::Network("down".into())),
            Err(ProviderError::Network("down".into())),
            Err(ProviderError::Network("down".into())),
        ]));
        let retry = RetryPolicy {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(8),
            request_timeout: Duration::from_secs(30),
            max_retry_after: Duration::from_secs(60),
        };
        let turn = agent(provider.clone(), h.events.clone())
            .with_retry_policy(retry)
            .run(opening(), &h.ctx)
            .await;

        assert_eq!(turn.state(), TurnState::Aborted(AbortReason::ModelUnavailable));
        assert_eq!(turn.reply(), Some(CannedReplies::default().apology.as_str()));
        assert_eq!(provider.call_count(), 3);
        assert_eq!(turn.iterations(), 1);
    }

    #[tokio::test]
    async fn tools_run_in_requested_order_and_publish_events() {
        let h = harness().await;
        let trip = h
            .store
            .create_event(h.ctx.user_id(), NewEvent { name: "Lisbon".into(), ..NewEvent::default() })
            .await
            .unwrap();
        let mut first = make_tool_call("add_memory", json!({"event_id": trip.id, "text": "first"}));
        first.id = "c1".into();
        let mut second = make_tool_call("add_memory", json!({"event_id": trip.id, "text": "second"}));
        second.id = "c2".into();
        let provider = Arc::new(ScriptedProvider::responses(vec![
            make_tool_call_response(vec![first, second], "Saving both"),
            make_text_response("Saved!"),
        ]));
        let mut rx = h.events.subscribe();

        let turn = agent(provider, h.events.clone()).run(opening(), &h.ctx).await;

        assert_eq!(turn.reply(), Some("Saved!"));
        let ids: Vec<&str> = turn.invocations().iter().map(|i| i.call_id.as_str()).collect();
        assert_eq!(ids, vec!["c1", "c2"]);
        let texts: Vec<Option<String>> = h
            .store
            .list_memories(trip.id)
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.text)
            .collect();
        assert_eq!(texts, vec![Some("first".to_string()), Some("second".to_string())]);

        for _ in 0..2 {
            let event = rx.recv().await.unwrap();
            assert!(matches!(*event, DomainEvent::ToolExecuted { success: true, .. }));
        }
    }
}
