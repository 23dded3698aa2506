//! Delivery channel — where a turn's single reply goes.
//!
//! The core never retries delivery; a failure is reported once and logged.

use async_trait::async_trait;
use crate::batch::SenderId;
use crate::error::ChannelError;

#[async_trait]
pub trait DeliveryChannel: Send + Sync {
    /// Human-readable channel name (e.g., "console", "outbox").
    fn name(&self) -> &str;

    /// Deliver `text` to `recipient`.
    async fn deliver(&self, recipient: &SenderId, text: &str) -> std::result::Result<(), ChannelError>;
}
