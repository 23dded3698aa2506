//! Execution context — what a tool can see and touch during one turn.
//!
//! A context is created when a turn starts and dropped when it ends. It is
//! deliberately not `Clone`: handles and caller identity never outlive or
//! leak out of the turn that owns them. The only mutable part is the batch
//! metadata, which is written exactly once at turn start.

use std::sync::{Arc, OnceLock};
use crate::batch::{BatchMedia, CompiledBatch, SenderId};
use crate::error::{Error, Result};
use crate::media::MediaStore;
use crate::store::{HistoryEntry, Store, UserId};

/// Who the turn is acting for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerIdentity {
    pub user_id: UserId,
    pub sender: SenderId,
    pub display_name: Option<String>,
}

/// Batch facts tools rely on for positional media handling.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchMetadata {
    pub is_batch: bool,
    pub media: Vec<BatchMedia>,
    pub segments: Vec<String>,
    pub message_ids: Vec<String>,
}

static EMPTY_BATCH: BatchMetadata = BatchMetadata {
    is_batch: false,
    media: Vec::new(),
    segments: Vec::new(),
    message_ids: Vec::new(),
};

impl BatchMetadata {
    pub fn from_batch(batch: &CompiledBatch) -> Self {
        Self {
            is_batch: batch.is_batch,
            media: batch.media.clone(),
            segments: batch.segments.clone(),
            message_ids: batch.message_ids.clone(),
        }
    }

    /// Media item by its 1-based position in arrival order.
    pub fn media_at(&self, position: usize) -> Option<&BatchMedia> {
        position.checked_sub(1).and_then(|i| self.media.get(i))
    }

    /// Text of the fragment a media item arrived with.
    pub fn caption_for(&self, item: &BatchMedia) -> &str {
        self.segments
            .get(item.fragment_index)
            .map(String::as_str)
            .unwrap_or("")
    }
}

pub struct ExecutionContext {
    caller: CallerIdentity,
    store: Arc<dyn Store>,
    media: Arc<dyn MediaStore>,
    history: Vec<HistoryEntry>,
    batch: OnceLock<BatchMetadata>,
}

impl ExecutionContext {
    pub fn new(caller: CallerIdentity, store: Arc<dyn Store>, media: Arc<dyn MediaStore>) -> Self {
        Self {
            caller,
            store,
            media,
            history: Vec::new(),
            batch: OnceLock::new(),
        }
    }

    pub fn with_history(mut self, history: Vec<HistoryEntry>) -> Self {
        self.history = history;
        self
    }

    /// Record the batch this turn serves. Fails if already set.
    pub fn set_batch(&self, metadata: BatchMetadata) -> Result<()> {
        self.batch
            .set(metadata)
            .map_err(|_| Error::Internal("batch metadata already set for this turn".into()))
    }

    /// Batch metadata, or an empty single-fragment record before it is set.
    pub fn batch(&self) -> &BatchMetadata {
        self.batch.get().unwrap_or(&EMPTY_BATCH)
    }

    pub fn caller(&self) -> &CallerIdentity {
        &self.caller
    }

    pub fn user_id(&self) -> UserId {
        self.caller.user_id
    }

    pub fn store(&self) -> &dyn Store {
        self.store.as_ref()
    }

    pub fn media(&self) -> &dyn MediaStore {
        self.media.as_ref()
    }

    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }
}

impl std::fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("caller", &self.caller)
            .field("store", &self.store.name())
            .field("media", &self.media.name())
            .field("history", &self.history.len())
            .field("batch", &self.batch.get())
            .finish()
    }
}
