//! Inbound fragments and the compiled batches built from them.
//!
//! A [`Fragment`] is one atomic piece of sender input. The batcher collects a
//! burst of fragments per sender and compiles them into a [`CompiledBatch`],
//! which is handed to a [`BatchHandler`] exactly once.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use crate::error::SchedulingError;

/// External identity of whoever sent a fragment (chat id on the platform).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SenderId(pub String);

impl SenderId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SenderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Image,
    Video,
    Audio,
    Document,
}

impl MediaKind {
    pub fn label(&self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
            MediaKind::Audio => "audio",
            MediaKind::Document => "document",
        }
    }
}

impl std::str::FromStr for MediaKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "image" | "photo" => Ok(MediaKind::Image),
            "video" => Ok(MediaKind::Video),
            "audio" | "voice" => Ok(MediaKind::Audio),
            "document" | "doc" | "file" => Ok(MediaKind::Document),
            other => Err(format!("unknown media kind '{other}'")),
        }
    }
}

/// Opaque reference to a piece of media on the inbound platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaRef {
    pub kind: MediaKind,

    /// Platform file id, URL, or path. Never interpreted by the core.
    pub reference: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

impl MediaRef {
    pub fn new(kind: MediaKind, reference: impl Into<String>) -> Self {
        Self { kind, reference: reference.into(), mime_type: None }
    }
}

/// One unit of sender input. Immutable once received.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fragment {
    /// Source message identifier on the inbound platform
    pub message_id: String,

    /// Arrival timestamp
    pub received_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media: Option<MediaRef>,

    /// Display name the platform reported for the sender, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_name: Option<String>,
}

impl Fragment {
    pub fn text(message_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            message_id: message_id.into(),
            received_at: Utc::now(),
            text: Some(text.into()),
            media: None,
            sender_name: None,
        }
    }

    pub fn media(message_id: impl Into<String>, media: MediaRef, caption: Option<String>) -> Self {
        Self {
            message_id: message_id.into(),
            received_at: Utc::now(),
            text: caption,
            media: Some(media),
            sender_name: None,
        }
    }

    pub fn with_sender_name(mut self, name: impl Into<String>) -> Self {
        self.sender_name = Some(name.into());
        self
    }
}

/// A media item of a compiled batch, tagged with the fragment it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchMedia {
    /// Zero-based index of the originating fragment; also indexes `segments`
    pub fragment_index: usize,

    pub media: MediaRef,

    pub message_id: String,
}

/// The merged, order-preserving unit of work produced from one burst.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompiledBatch {
    pub sender: SenderId,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_name: Option<String>,

    /// Segments joined with the configured separator
    pub text: String,

    /// One normalized segment per fragment; media-only fragments give ""
    pub segments: Vec<String>,

    /// Media in arrival order
    pub media: Vec<BatchMedia>,

    pub message_ids: Vec<String>,

    pub opened_at: DateTime<Utc>,

    pub flushed_at: DateTime<Utc>,

    /// More than one fragment was merged
    pub is_batch: bool,
}

impl CompiledBatch {
    pub fn fragment_count(&self) -> usize {
        self.segments.len()
    }

    /// Caption that travelled with a media item (the text of its fragment).
    pub fn caption_for(&self, item: &BatchMedia) -> &str {
        self.segments
            .get(item.fragment_index)
            .map(String::as_str)
            .unwrap_or("")
    }
}

/// How a turn ended, as reported back to the scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnReport {
    pub turn_id: String,

    /// "answered" or "aborted"
    pub state: String,

    pub iterations: u32,

    pub tool_calls: usize,

    /// The reply that was delivered
    pub reply: String,
}

/// Receives each compiled batch exactly once.
///
/// The scheduler awaits this before opening a new window for the same
/// sender. An error is logged and the batch is dropped; it is never retried.
#[async_trait]
pub trait BatchHandler: Send + Sync {
    async fn on_flush(&self, batch: CompiledBatch) -> std::result::Result<TurnReport, SchedulingError>;
}
