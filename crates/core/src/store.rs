//! Store trait — the shared backing state tools read and mutate.
//!
//! Every method is one atomic unit (fetch, validate, mutate, commit). Methods
//! that mutate on behalf of a user re-check membership inside that unit and
//! fail with [`StoreError::Forbidden`] without touching state.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use crate::batch::SenderId;
use crate::error::StoreError;
use crate::media::StoredMedia;
use crate::message::Role;

pub type UserId = i64;
pub type EventId = i64;
pub type MemoryId = i64;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: UserId,
    pub sender: SenderId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// An event groups the memories of one shared experience.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub id: EventId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_date: Option<NaiveDate>,
    /// `evt_` followed by 16 lowercase alphanumerics
    pub invite_code: String,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct NewEvent {
    pub name: String,
    pub description: Option<String>,
    pub event_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryRecord {
    pub id: MemoryId,
    pub event_id: EventId,
    pub author: UserId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media: Option<StoredMedia>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_message_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct NewMemory {
    pub text: Option<String>,
    pub media: Option<StoredMedia>,
    pub media_description: Option<String>,
    pub source_message_id: Option<String>,
}

/// Fields to change on an existing memory; `None` leaves a field as is.
#[derive(Debug, Clone, Default)]
pub struct MemoryPatch {
    pub text: Option<String>,
    pub media_description: Option<String>,
}

impl MemoryPatch {
    pub fn is_empty(&self) -> bool {
        self.text.is_none() && self.media_description.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinOutcome {
    Joined,
    AlreadyMember,
}

/// One line of per-user conversation history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub role: Role,
    pub content: String,
    #[serde(default)]
    pub media_count: usize,
    pub timestamp: DateTime<Utc>,
}

impl HistoryEntry {
    pub fn new(role: Role, content: impl Into<String>, media_count: usize) -> Self {
        Self { role, content: content.into(), media_count, timestamp: Utc::now() }
    }
}

#[async_trait]
pub trait Store: Send + Sync {
    /// A human-readable name for this backend (e.g., "in_memory").
    fn name(&self) -> &str;

    /// Resolve a sender to a user, creating the user on first contact.
    async fn upsert_user(&self, sender: &SenderId, display_name: Option<&str>) -> Result<UserRecord, StoreError>;

    /// Create an event and make `creator` its first member in one unit.
    async fn create_event(&self, creator: UserId, event: NewEvent) -> Result<EventRecord, StoreError>;

    async fn get_event(&self, id: EventId) -> Result<EventRecord, StoreError>;

    async fn find_event_by_invite(&self, invite_code: &str) -> Result<EventRecord, StoreError>;

    /// `NotFound` if the event does not exist.
    async fn is_member(&self, user: UserId, event: EventId) -> Result<bool, StoreError>;

    async fn join_event(&self, user: UserId, event: EventId) -> Result<JoinOutcome, StoreError>;

    async fn members(&self, event: EventId) -> Result<Vec<UserId>, StoreError>;

    /// Events the user belongs to, oldest first.
    async fn list_events_for(&self, user: UserId) -> Result<Vec<EventRecord>, StoreError>;

    async fn get_memory(&self, id: MemoryId) -> Result<MemoryRecord, StoreError>;

    /// Insert every memory or none of them. The author must be a member.
    async fn add_memories(
        &self,
        author: UserId,
        event: EventId,
        memories: Vec<NewMemory>,
    ) -> Result<Vec<MemoryRecord>, StoreError>;

    /// Apply `patch`. The editor must be a member of the memory's event.
    async fn update_memory(&self, editor: UserId, id: MemoryId, patch: MemoryPatch) -> Result<MemoryRecord, StoreError>;

    /// Memories of an event, oldest first.
    async fn list_memories(&self, event: EventId) -> Result<Vec<MemoryRecord>, StoreError>;

    /// Keyword search over the memories of events `user` belongs to.
    async fn search_memories(&self, user: UserId, query: &str, limit: usize) -> Result<Vec<MemoryRecord>, StoreError>;

    async fn append_history(&self, user: UserId, entry: HistoryEntry) -> Result<(), StoreError>;

    /// The most recent `limit` entries, oldest first.
    async fn recent_history(&self, user: UserId, limit: usize) -> Result<Vec<HistoryEntry>, StoreError>;
}
