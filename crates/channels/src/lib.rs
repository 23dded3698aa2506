//! Delivery channels for Keepsake replies.
//!
//! Available channels:
//! - **Console** — prints each reply to a terminal or any writer
//! - **Outbox** — keeps replies in memory, for tests and embedding

pub mod console;
pub mod outbox;

pub use console::ConsoleChannel;
pub use outbox::{Outbox, SentReply};
