//! Domain event system — monitoring hooks for the scheduler and the loop.
//!
//! Events are published when something interesting happens. Subscribers
//! (logging sinks, tests, metrics) react without coupling to the core.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Why a batch was flushed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlushTrigger {
    /// The debounce window elapsed with no new fragment
    Window,
    /// The fragment ceiling was reached
    SizeLimit,
    /// The aggregator is shutting down
    Shutdown,
}

/// All domain events in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DomainEvent {
    /// A fragment was accepted into a sender's pending batch
    FragmentIngested {
        sender: String,
        pending: usize,
        timestamp: DateTime<Utc>,
    },

    /// A pending batch was compiled and handed to the flush handler
    BatchFlushed {
        sender: String,
        fragments: usize,
        media: usize,
        trigger: FlushTrigger,
        timestamp: DateTime<Utc>,
    },

    /// The flush handler failed; the batch is gone
    BatchDropped {
        sender: String,
        fragments: usize,
        reason: String,
        timestamp: DateTime<Utc>,
    },

    /// A tool was executed
    ToolExecuted {
        tool_name: String,
        success: bool,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// A model call failed and will be retried
    ModelRetry {
        attempt: u32,
        error_message: String,
        timestamp: DateTime<Utc>,
    },

    /// A turn reached a terminal state
    TurnCompleted {
        sender: String,
        state: String,
        iterations: u32,
        tool_calls: usize,
        timestamp: DateTime<Utc>,
    },

    /// The single reply of a turn could not be delivered
    DeliveryFailed {
        channel: String,
        recipient: String,
        error_message: String,
        timestamp: DateTime<Utc>,
    },
}

/// A broadcast-based event bus for domain events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub.
pub struct EventBus {
    sender: broadcast::Sender<Arc<DomainEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: DomainEvent) {
        // No subscribers is fine
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<DomainEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
