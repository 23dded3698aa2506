//! The reasoning side of Keepsake.
//!
//! A flushed batch becomes one turn:
//!
//! 1. **Prepare** the caller, recent history, and batch metadata
//! 2. **Ask the model** with the transcript and every tool schema
//! 3. **If tool calls**: dispatch them in order, append results, loop back to step 2
//! 4. **If text**: that is the reply
//!
//! The loop is bounded by an iteration cap. Model calls are retried with
//! backoff, and every turn delivers exactly one reply.

pub mod loop_runner;
pub mod pipeline;
pub mod prompt;
pub mod retry;
#[doc(hidden)]
pub mod test_helpers;
pub mod turn;

pub use loop_runner::{AgentLoop, CannedReplies};
pub use pipeline::TurnPipeline;
pub use retry::RetryPolicy;
pub use turn::{AbortReason, AgentTurn, TurnState};
