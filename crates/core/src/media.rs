//! Media store — write-once, content-addressed storage for inbound media.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use crate::batch::{MediaKind, MediaRef};
use crate::error::MediaError;

/// A media item after it has been persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredMedia {
    /// Content address; identical inputs always map to the same address
    pub address: String,
    pub kind: MediaKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

#[async_trait]
pub trait MediaStore: Send + Sync {
    fn name(&self) -> &str;

    /// Persist the referenced media. Persisting the same reference twice
    /// returns the same address and stores nothing new.
    async fn persist(&self, media: &MediaRef) -> Result<StoredMedia, MediaError>;

    /// A retrievable URL for a stored address.
    async fn url(&self, address: &str) -> Result<String, MediaError>;
}
