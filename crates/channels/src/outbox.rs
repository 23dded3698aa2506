//! In-memory outbox channel.

use async_trait::async_trait;
use keepsake_core::batch::SenderId;
use keepsake_core::channel::DeliveryChannel;
use keepsake_core::error::ChannelError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

/// One delivered reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentReply {
    pub recipient: SenderId,
    pub text: String,
}

/// Records every reply instead of sending it anywhere.
///
/// When set to fail, attempts are still recorded before the error is returned,
/// so callers can check that exactly one delivery was attempted.
#[derive(Default)]
pub struct Outbox {
    sent: Mutex<Vec<SentReply>>,
    failing: AtomicBool,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// An outbox whose deliveries fail.
    pub fn failing() -> Self {
        let outbox = Self::default();
        outbox.set_failing(true);
        outbox
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::Release);
    }

    fn lock(&self) -> MutexGuard<'_, Vec<SentReply>> {
        self.sent.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn sent(&self) -> Vec<SentReply> {
        self.lock().clone()
    }

    /// Replies addressed to one recipient, oldest first.
    pub fn sent_to(&self, recipient: &SenderId) -> Vec<String> {
        self.lock()
            .iter()
            .filter(|r| &r.recipient == recipient)
            .map(|r| r.text.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

#[async_trait]
impl DeliveryChannel for Outbox {
    fn name(&self) -> &str {
        "outbox"
    }

    async fn deliver(&self, recipient: &SenderId, text: &str) -> Result<(), ChannelError> {
        self.lock().push(SentReply {
            recipient: recipient.clone(),
            text: text.to_string(),
        });
        if self.failing.load(Ordering::Acquire) {
            return Err(ChannelError::DeliveryFailed {
                channel: "outbox".into(),
                reason: "outbox is set to fail".into(),
            });
        }
        Ok(())
    }
}
