//! The state of one reasoning turn.

use keepsake_core::batch::TurnReport;
use keepsake_core::message::{Message, Transcript};
use keepsake_core::tool::ToolInvocation;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Why a turn stopped without a final answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbortReason {
    /// The model kept requesting tools until the iteration cap.
    IterationLimit,
    /// The model could not be reached after every retry.
    ModelUnavailable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum TurnState {
    Running,
    Answered,
    Aborted(AbortReason),
}

impl TurnState {
    pub fn label(&self) -> &'static str {
        match self {
            TurnState::Running => "running",
            TurnState::Answered => "answered",
            TurnState::Aborted(_) => "aborted",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, TurnState::Running)
    }
}

/// One turn of the reasoning loop.
///
/// The transcript and invocation log only grow. A turn leaves `Running`
/// exactly once, and the reply is fixed at that moment.
#[derive(Debug, Clone)]
pub struct AgentTurn {
    id: String,
    iterations: u32,
    transcript: Transcript,
    invocations: Vec<ToolInvocation>,
    state: TurnState,
    reply: Option<String>,
}

impl AgentTurn {
    pub fn new(transcript: Transcript) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            iterations: 0,
            transcript,
            invocations: Vec::new(),
            state: TurnState::Running,
            reply: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    pub fn state(&self) -> TurnState {
        self.state
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn invocations(&self) -> &[ToolInvocation] {
        &self.invocations
    }

    pub fn reply(&self) -> Option<&str> {
        self.reply.as_deref()
    }

    /// Enter a new model call. Returns the iteration number (1-based).
    pub(crate) fn begin_iteration(&mut self) -> u32 {
        self.iterations += 1;
        self.iterations
    }

    pub(crate) fn push_message(&mut self, message: Message) {
        self.transcript.push(message);
    }

    /// Record a dispatched tool call and feed its result to the transcript.
    pub(crate) fn record(&mut self, invocation: ToolInvocation) {
        let payload = invocation.to_model_payload().to_string();
        self.transcript
            .push(Message::tool_result(invocation.call_id.clone(), payload));
        self.invocations.push(invocation);
    }

    pub(crate) fn answer(&mut self, reply: String) {
        self.finish(TurnState::Answered, reply);
    }

    pub(crate) fn abort(&mut self, reason: AbortReason, reply: String) {
        self.finish(TurnState::Aborted(reason), reply);
    }

    fn finish(&mut self, state: TurnState, reply: String) {
        if self.state.is_terminal() {
            return;
        }
        self.state = state;
        self.reply = Some(reply);
    }

    pub fn report(&self) -> TurnReport {
        TurnReport {
            turn_id: self.id.clone(),
            state: self.state.label().to_string(),
            iterations: self.iterations,
            tool_calls: self.invocations.len(),
            reply: self.reply.clone().unwrap_or_default(),
        }
    }
}
