//! # Keepsake Core
//!
//! Domain types, traits, and error definitions for the Keepsake memories agent.
//! This crate defines the domain model that all other crates implement against:
//! fragments and compiled batches, the tool registry and dispatcher, the
//! execution context handed to tools, and the collaborator traits (store,
//! media store, model provider, delivery channel).
//!
//! ## Design Philosophy
//!
//! Every collaborator is a trait here. Implementations live in their
//! respective crates, so the scheduler and reasoning loop can be tested
//! against in-process fakes.

pub mod error;
pub mod message;
pub mod provider;
pub mod channel;
pub mod batch;
pub mod schema;
pub mod tool;
pub mod context;
pub mod store;
pub mod media;
pub mod event;

// Re-export key types at crate root for ergonomics
pub use error::{Error, Result};
pub use message::{Message, Role, Transcript};
pub use provider::{Provider, ProviderRequest, ProviderResponse, ToolDefinition};
pub use channel::DeliveryChannel;
pub use batch::{BatchHandler, BatchMedia, CompiledBatch, Fragment, MediaKind, MediaRef, SenderId, TurnReport};
pub use tool::{Access, Tool, ToolCall, ToolInvocation, ToolOutcome, ToolRegistry, ToolResult};
pub use context::{BatchMetadata, CallerIdentity, ExecutionContext};
pub use store::{EventId, MemoryId, Store, UserId};
pub use media::{MediaStore, StoredMedia};
pub use event::{DomainEvent, EventBus};
