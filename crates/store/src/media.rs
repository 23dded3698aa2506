//! Content-addressed media store kept in memory.
//!
//! Addresses are the hex SHA-256 of the media kind and platform reference, so
//! persisting the same item twice is a no-op that returns the same address.

use async_trait::async_trait;
use keepsake_core::batch::MediaRef;
use keepsake_core::error::MediaError;
use keepsake_core::media::{MediaStore, StoredMedia};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::RwLock;

pub struct InMemoryMediaStore {
    base_url: String,
    objects: RwLock<HashMap<String, StoredMedia>>,
    writes: AtomicUsize,
    unavailable: AtomicBool,
}

impl InMemoryMediaStore {
    pub fn new() -> Self {
        Self::with_base_url("media://")
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            objects: RwLock::new(HashMap::new()),
            writes: AtomicUsize::new(0),
            unavailable: AtomicBool::new(false),
        }
    }

    /// Number of objects actually written (duplicates excluded).
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn address_of(media: &MediaRef) -> String {
        let mut hasher = Sha256::new();
        hasher.update(media.kind.label().as_bytes());
        hasher.update(b":");
        hasher.update(media.reference.as_bytes());
        hex::encode(hasher.finalize())
    }
}

impl Default for InMemoryMediaStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MediaStore for InMemoryMediaStore {
    fn name(&self) -> &str { "in_memory_media" }

    async fn persist(&self, media: &MediaRef) -> Result<StoredMedia, MediaError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(MediaError::Unavailable("media store is offline".into()));
        }
        if media.reference.trim().is_empty() {
            return Err(MediaError::Rejected("empty media reference".into()));
        }

        let address = Self::address_of(media);
        let mut objects = self.objects.write().await;
        let stored = objects.entry(address.clone()).or_insert_with(|| {
            self.writes.fetch_add(1, Ordering::SeqCst);
            StoredMedia {
                address,
                kind: media.kind,
                mime_type: media.mime_type.clone(),
            }
        });
        Ok(stored.clone())
    }

    async fn url(&self, address: &str) -> Result<String, MediaError> {
        if self.objects.read().await.contains_key(address) {
            Ok(format!("{}{}", self.base_url, address))
        } else {
            Err(MediaError::Rejected(format!("unknown media address {address}")))
        }
    }
}
