//! In-memory record store.
//!
//! All tables sit behind one `RwLock`. Each trait method takes the lock once
//! and does its whole fetch-validate-mutate-commit under it, so a failing
//! check never leaves a half-applied change.

use async_trait::async_trait;
use chrono::Utc;
use keepsake_core::batch::SenderId;
use keepsake_core::error::StoreError;
use keepsake_core::store::{
    EventId, EventRecord, HistoryEntry, JoinOutcome, MemoryId, MemoryPatch, MemoryRecord, NewEvent,
    NewMemory, Store, UserId, UserRecord,
};
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;
use tracing::debug;

const INVITE_PREFIX: &str = "evt_";
const INVITE_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
const INVITE_LEN: usize = 16;
const HISTORY_RETAINED: usize = 100;

#[derive(Default)]
struct Tables {
    last_user: UserId,
    last_event: EventId,
    last_memory: MemoryId,
    users: HashMap<UserId, UserRecord>,
    by_sender: HashMap<SenderId, UserId>,
    events: BTreeMap<EventId, EventRecord>,
    invites: HashMap<String, EventId>,
    members: HashMap<EventId, BTreeSet<UserId>>,
    memories: BTreeMap<MemoryId, MemoryRecord>,
    history: HashMap<UserId, VecDeque<HistoryEntry>>,
}

impl Tables {
    fn event(&self, id: EventId) -> Result<&EventRecord, StoreError> {
        self.events.get(&id).ok_or_else(|| not_found("event", id))
    }

    fn require_member(&self, user: UserId, event: EventId) -> Result<(), StoreError> {
        self.event(event)?;
        let is_member = self.members.get(&event).is_some_and(|m| m.contains(&user));
        if is_member {
            Ok(())
        } else {
            Err(StoreError::Forbidden(format!("user {user} is not a member of event {event}")))
        }
    }

    fn fresh_invite_code(&self) -> String {
        use rand::Rng;
        let mut rng = rand::rng();
        loop {
            let suffix: String = (0..INVITE_LEN)
                .map(|_| INVITE_ALPHABET[rng.random_range(0..INVITE_ALPHABET.len())] as char)
                .collect();
            let code = format!("{INVITE_PREFIX}{suffix}");
            if !self.invites.contains_key(&code) {
                return code;
            }
        }
    }
}

fn not_found(entity: &'static str, id: impl ToString) -> StoreError {
    StoreError::NotFound { entity, id: id.to_string() }
}

/// An in-memory store. Useful for tests and single-process deployments.
pub struct InMemoryStore {
    tables: RwLock<Tables>,
    unavailable: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            unavailable: AtomicBool::new(false),
        }
    }

    /// Simulate an outage: every call fails with `Unavailable` until reset.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("in-memory store is offline".into()))
        } else {
            Ok(())
        }
    }

    /// Total memories across all events.
    pub async fn memory_count(&self) -> usize {
        self.tables.read().await.memories.len()
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    fn name(&self) -> &str { "in_memory" }

    async fn upsert_user(&self, sender: &SenderId, display_name: Option<&str>) -> Result<UserRecord, StoreError> {
        self.check_available()?;
        let mut tables = self.tables.write().await;

        if let Some(id) = tables.by_sender.get(sender).copied() {
            let user = tables.users.get_mut(&id).ok_or_else(|| not_found("user", id))?;
            if let Some(name) = display_name {
                user.display_name = Some(name.to_string());
            }
            return Ok(user.clone());
        }

        tables.last_user += 1;
        let user = UserRecord {
            id: tables.last_user,
            sender: sender.clone(),
            display_name: display_name.map(str::to_string),
            created_at: Utc::now(),
        };
        tables.by_sender.insert(sender.clone(), user.id);
        tables.users.insert(user.id, user.clone());
        debug!(user_id = user.id, sender = %sender, "Created user");
        Ok(user)
    }

    async fn create_event(&self, creator: UserId, event: NewEvent) -> Result<EventRecord, StoreError> {
        self.check_available()?;
        let mut tables = self.tables.write().await;
        if !tables.users.contains_key(&creator) {
            return Err(not_found("user", creator));
        }

        tables.last_event += 1;
        let record = EventRecord {
            id: tables.last_event,
            name: event.name,
            description: event.description,
            event_date: event.event_date,
            invite_code: tables.fresh_invite_code(),
            created_by: creator,
            created_at: Utc::now(),
        };
        tables.invites.insert(record.invite_code.clone(), record.id);
        tables.members.entry(record.id).or_default().insert(creator);
        tables.events.insert(record.id, record.clone());
        Ok(record)
    }

    async fn get_event(&self, id: EventId) -> Result<EventRecord, StoreError> {
        self.check_available()?;
        self.tables.read().await.event(id).cloned()
    }

    async fn find_event_by_invite(&self, invite_code: &str) -> Result<EventRecord, StoreError> {
        self.check_available()?;
        let tables = self.tables.read().await;
        let id = tables
            .invites
            .get(invite_code)
            .copied()
            .ok_or_else(|| not_found("invite", invite_code))?;
        tables.event(id).cloned()
    }

    async fn is_member(&self, user: UserId, event: EventId) -> Result<bool, StoreError> {
        self.check_available()?;
        let tables = self.tables.read().await;
        tables.event(event)?;
        Ok(tables.members.get(&event).is_some_and(|m| m.contains(&user)))
    }

    async fn join_event(&self, user: UserId, event: EventId) -> Result<JoinOutcome, StoreError> {
        self.check_available()?;
        let mut tables = self.tables.write().await;
        tables.event(event)?;
        if !tables.users.contains_key(&user) {
            return Err(not_found("user", user));
        }
        let inserted = tables.members.entry(event).or_default().insert(user);
        Ok(if inserted { JoinOutcome::Joined } else { JoinOutcome::AlreadyMember })
    }

    async fn members(&self, event: EventId) -> Result<Vec<UserId>, StoreError> {
        self.check_available()?;
        let tables = self.tables.read().await;
        tables.event(event)?;
        Ok(tables
            .members
            .get(&event)
            .map(|m| m.iter().copied().collect())
            .unwrap_or_default())
    }

    async fn list_events_for(&self, user: UserId) -> Result<Vec<EventRecord>, StoreError> {
        self.check_available()?;
        let tables = self.tables.read().await;
        Ok(tables
            .events
            .values()
            .filter(|e| tables.members.get(&e.id).is_some_and(|m| m.contains(&user)))
            .cloned()
            .collect())
    }

    async fn get_memory(&self, id: MemoryId) -> Result<MemoryRecord, StoreError> {
        self.check_available()?;
        self.tables
            .read()
            .await
            .memories
            .get(&id)
            .cloned()
            .ok_or_else(|| not_found("memory", id))
    }

    async fn add_memories(
        &self,
        author: UserId,
        event: EventId,
        memories: Vec<NewMemory>,
    ) -> Result<Vec<MemoryRecord>, StoreError> {
        self.check_available()?;
        let mut tables = self.tables.write().await;
        tables.require_member(author, event)?;

        let now = Utc::now();
        let mut created = Vec::with_capacity(memories.len());
        for memory in memories {
            tables.last_memory += 1;
            let record = MemoryRecord {
                id: tables.last_memory,
                event_id: event,
                author,
                text: memory.text,
                media: memory.media,
                media_description: memory.media_description,
                source_message_id: memory.source_message_id,
                created_at: now,
            };
            tables.memories.insert(record.id, record.clone());
            created.push(record);
        }
        debug!(event_id = event, count = created.len(), "Stored memories");
        Ok(created)
    }

    async fn update_memory(&self, editor: UserId, id: MemoryId, patch: MemoryPatch) -> Result<MemoryRecord, StoreError> {
        self.check_available()?;
        let mut tables = self.tables.write().await;
        let event = tables
            .memories
            .get(&id)
            .map(|m| m.event_id)
            .ok_or_else(|| not_found("memory", id))?;
        tables.require_member(editor, event)?;

        let memory = tables.memories.get_mut(&id).ok_or_else(|| not_found("memory", id))?;
        if let Some(text) = patch.text {
            memory.text = Some(text);
        }
        if let Some(description) = patch.media_description {
            memory.media_description = Some(description);
        }
        Ok(memory.clone())
    }

    async fn list_memories(&self, event: EventId) -> Result<Vec<MemoryRecord>, StoreError> {
        self.check_available()?;
        let tables = self.tables.read().await;
        tables.event(event)?;
        Ok(tables
            .memories
            .values()
            .filter(|m| m.event_id == event)
            .cloned()
            .collect())
    }

    async fn search_memories(&self, user: UserId, query: &str, limit: usize) -> Result<Vec<MemoryRecord>, StoreError> {
        self.check_available()?;
        let terms: Vec<String> = query
            .split_whitespace()
            .map(|t| t.to_lowercase())
            .collect();
        if terms.is_empty() {
            return Ok(Vec::new());
        }

        let tables = self.tables.read().await;
        let mut scored: Vec<(usize, &MemoryRecord)> = tables
            .memories
            .values()
            .filter(|m| tables.members.get(&m.event_id).is_some_and(|s| s.contains(&user)))
            .filter_map(|m| {
                let haystack = format!(
                    "{} {}",
                    m.text.as_deref().unwrap_or(""),
                    m.media_description.as_deref().unwrap_or("")
                )
                .to_lowercase();
                let score = terms.iter().filter(|t| haystack.contains(t.as_str())).count();
                (score > 0).then_some((score, m))
            })
            .collect();

        // Best match first, newest first among equals
        scored.sort_by(|a, b| b.0.cmp(&a.0).then(b.1.id.cmp(&a.1.id)));
        Ok(scored.into_iter().take(limit).map(|(_, m)| m.clone()).collect())
    }

    async fn append_history(&self, user: UserId, entry: HistoryEntry) -> Result<(), StoreError> {
        self.check_available()?;
        let mut tables = self.tables.write().await;
        let log = tables.history.entry(user).or_default();
        log.push_back(entry);
        while log.len() > HISTORY_RETAINED {
            log.pop_front();
        }
        Ok(())
    }

    async fn recent_history(&self, user: UserId, limit: usize) -> Result<Vec<HistoryEntry>, StoreError> {
        self.check_available()?;
        let tables = self.tables.read().await;
        Ok(tables
            .history
            .get(&user)
            .map(|log| log.iter().skip(log.len().saturating_sub(limit)).cloned().collect())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keepsake_core::message::Role;

    async fn user(store: &InMemoryStore, sender: &str) -> UserId {
        store.upsert_user(&SenderId::new(sender), None).await.unwrap().id
    }

    fn event(name: &str) -> NewEvent {
        NewEvent { name: name.into(), ..NewEvent::default() }
    }

    fn note(text: &str) -> NewMemory {
        NewMemory { text: Some(text.into()), ..NewMemory::default() }
    }

    #[tokio::test]
    async fn upsert_is_idempotent_per_sender() {
        let store = InMemoryStore::new();
        let a = store.upsert_user(&SenderId::new("100"), Some("Ana")).await.unwrap();
        let again = store.upsert_user(&SenderId::new("100"), None).await.unwrap();
        assert_eq!(a.id, again.id);
        assert_eq!(again.display_name.as_deref(), Some("Ana"));
        let other = store.upsert_user(&SenderId::new("200"), None).await.unwrap();
        assert_ne!(a.id, other.id);
    }

    #[tokio::test]
    async fn creator_joins_new_event() {
        let store = InMemoryStore::new();
        let ana = user(&store, "100").await;
        let trip = store.create_event(ana, event("Lisbon trip")).await.unwrap();

        assert!(store.is_member(ana, trip.id).await.unwrap());
        assert!(trip.invite_code.starts_with("evt_"));
        assert_eq!(trip.invite_code.len(), 20);
        assert!(trip.invite_code[4..].chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
        assert_eq!(store.find_event_by_invite(&trip.invite_code).await.unwrap().id, trip.id);
    }

    #[tokio::test]
    async fn join_reports_existing_membership() {
        let store = InMemoryStore::new();
        let ana = user(&store, "100").await;
        let ben = user(&store, "200").await;
        let trip = store.create_event(ana, event("Lisbon trip")).await.unwrap();

        assert_eq!(store.join_event(ben, trip.id).await.unwrap(), JoinOutcome::Joined);
        assert_eq!(store.join_event(ben, trip.id).await.unwrap(), JoinOutcome::AlreadyMember);
        assert_eq!(store.members(trip.id).await.unwrap(), vec![ana, ben]);
    }

    #[tokio::test]
    async fn non_member_cannot_add_memories() {
        let store = InMemoryStore::new();
        let ana = user(&store, "100").await;
        let eve = user(&store, "666").await;
        let trip = store.create_event(ana, event("Lisbon trip")).await.unwrap();

        let err = store.add_memories(eve, trip.id, vec![note("sneaky")]).await.unwrap_err();
        assert!(matches!(err, StoreError::Forbidden(_)));
        assert!(store.list_memories(trip.id).await.unwrap().is_empty());
        assert_eq!(store.memory_count().await, 0);
    }

    #[tokio::test]
    async fn missing_event_is_not_found() {
        let store = InMemoryStore::new();
        let ana = user(&store, "100").await;
        let err = store.add_memories(ana, 99, vec![note("x")]).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { entity: "event", .. }));
        assert!(matches!(store.is_member(ana, 99).await, Err(StoreError::NotFound { .. })));
    }

    #[tokio::test]
    async fn update_requires_membership_and_keeps_record_on_denial() {
        let store = InMemoryStore::new();
        let ana = user(&store, "100").await;
        let eve = user(&store, "666").await;
        let trip = store.create_event(ana, event("Lisbon trip")).await.unwrap();
        let memory = store.add_memories(ana, trip.id, vec![note("tram 28")]).await.unwrap().remove(0);

        let patch = MemoryPatch { text: Some("defaced".into()), media_description: None };
        assert!(matches!(store.update_memory(eve, memory.id, patch).await, Err(StoreError::Forbidden(_))));
        assert_eq!(store.get_memory(memory.id).await.unwrap().text.as_deref(), Some("tram 28"));

        let patch = MemoryPatch { text: None, media_description: Some("yellow tram".into()) };
        let updated = store.update_memory(ana, memory.id, patch).await.unwrap();
        assert_eq!(updated.text.as_deref(), Some("tram 28"));
        assert_eq!(updated.media_description.as_deref(), Some("yellow tram"));
    }

    #[tokio::test]
    async fn search_is_scoped_to_member_events() {
        let store = InMemoryStore::new();
        let ana = user(&store, "100").await;
        let ben = user(&store, "200").await;
        let lisbon = store.create_event(ana, event("Lisbon")).await.unwrap();
        let berlin = store.create_event(ben, event("Berlin")).await.unwrap();
        store.add_memories(ana, lisbon.id, vec![note("pastel de nata by the river"), note("river cruise")]).await.unwrap();
        store.add_memories(ben, berlin.id, vec![note("river spree walk")]).await.unwrap();

        let hits = store.search_memories(ana, "river nata", 10).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].text.as_deref(), Some("pastel de nata by the river"));
        assert!(hits.iter().all(|m| m.event_id == lisbon.id));

        assert_eq!(store.search_memories(ana, "river", 1).await.unwrap().len(), 1);
        assert!(store.search_memories(ana, "   ", 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn history_returns_latest_in_order() {
        let store = InMemoryStore::new();
        let ana = user(&store, "100").await;
        for i in 0..5 {
            store.append_history(ana, HistoryEntry::new(Role::User, format!("msg {i}"), 0)).await.unwrap();
        }
        let recent = store.recent_history(ana, 3).await.unwrap();
        let contents: Vec<&str> = recent.iter().map(|e| e.content.as_str()).collect();
        assert_eq!(contents, vec!["msg 2", "msg 3", "msg 4"]);
    }

    #[tokio::test]
    async fn outage_fails_every_call() {
        let store = InMemoryStore::new();
        let ana = user(&store, "100").await;
        store.set_unavailable(true);
        assert!(matches!(store.list_events_for(ana).await, Err(StoreError::Unavailable(_))));
        store.set_unavailable(false);
        assert!(store.list_events_for(ana).await.unwrap().is_empty());
    }
}
