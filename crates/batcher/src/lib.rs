//! Per-sender debounce batching.
//!
//! Fragments from one sender are held until that sender has been quiet for
//! the configured window, then compiled into one [`CompiledBatch`] and handed
//! to a [`BatchHandler`]. Different senders never wait on each other.
//!
//! [`CompiledBatch`]: keepsake_core::batch::CompiledBatch
//! [`BatchHandler`]: keepsake_core::batch::BatchHandler

pub mod aggregator;
pub mod compiler;
pub mod pending;

pub use aggregator::{BatchAggregator, BatchSettings};
pub use compiler::BatchCompiler;
pub use pending::{BatchState, PendingBatch};
