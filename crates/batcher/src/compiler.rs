//! Batch compiler: merges a pending batch into one normalized record.

use crate::pending::PendingBatch;
use chrono::{DateTime, Utc};
use keepsake_core::batch::{BatchMedia, CompiledBatch};

#[derive(Debug, Clone)]
pub struct BatchCompiler {
    separator: String,
}

impl Default for BatchCompiler {
    fn default() -> Self {
        Self::new("\n")
    }
}

fn normalize(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\r', "\n").trim().to_string()
}

impl BatchCompiler {
    pub fn new(separator: impl Into<String>) -> Self {
        Self { separator: separator.into() }
    }

    /// Compile a batch. Pure: the result depends only on the inputs.
    ///
    /// Every fragment yields one segment (empty for media without a caption)
    /// so segment and media positions line up with arrival order.
    pub fn compile(&self, batch: &PendingBatch, flushed_at: DateTime<Utc>) -> CompiledBatch {
        let fragments = batch.fragments();
        let segments: Vec<String> = fragments
            .iter()
            .map(|f| f.text.as_deref().map(normalize).unwrap_or_default())
            .collect();

        let media = fragments
            .iter()
            .enumerate()
            .filter_map(|(index, f)| {
                f.media.as_ref().map(|m| BatchMedia {
                    fragment_index: index,
                    media: m.clone(),
                    message_id: f.message_id.clone(),
                })
            })
            .collect();

        let text = segments
            .iter()
            .filter(|s| !s.is_empty())
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(&self.separator);

        CompiledBatch {
            sender: batch.sender().clone(),
            sender_name: fragments.iter().rev().find_map(|f| f.sender_name.clone()),
            text,
            segments,
            media,
            message_ids: fragments.iter().map(|f| f.message_id.clone()).collect(),
            opened_at: batch.opened_at(),
            flushed_at,
            is_batch: fragments.len() > 1,
        }
    }
}
