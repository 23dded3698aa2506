//! Store implementations for Keepsake.
//!
//! Both stores keep everything in process memory. They implement the
//! atomicity and membership rules of the core traits so the scheduler and
//! reasoning loop can be exercised end to end without external services.

pub mod in_memory;
pub mod media;

pub use in_memory::InMemoryStore;
pub use media::InMemoryMediaStore;
