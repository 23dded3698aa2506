//! The open batch of one sender.

use chrono::{DateTime, Utc};
use keepsake_core::batch::{Fragment, SenderId};
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchState {
    /// Accepting fragments; a flush deadline is armed
    Open,
    /// Handed to the compiler and the flush handler
    Flushing,
    /// Done, whatever the handler reported
    Closed,
}

/// Fragments collected for one sender since the batch opened.
///
/// Holding the deadline here means replacing it is the cancellation: the
/// actor only ever sleeps until the current value.
#[derive(Debug)]
pub struct PendingBatch {
    sender: SenderId,
    opened_at: DateTime<Utc>,
    fragments: Vec<Fragment>,
    deadline: Instant,
    state: BatchState,
}

impl PendingBatch {
    pub fn open(sender: SenderId, first: Fragment, deadline: Instant) -> Self {
        Self {
            sender,
            opened_at: first.received_at,
            fragments: vec![first],
            deadline,
            state: BatchState::Open,
        }
    }

    /// Append a fragment and move the deadline. Returns the new fragment
    /// count, or hands the fragment back if the batch no longer accepts input.
    pub fn push(&mut self, fragment: Fragment, deadline: Instant) -> Result<usize, Fragment> {
        if self.state != BatchState::Open {
            return Err(fragment);
        }
        self.fragments.push(fragment);
        self.deadline = deadline;
        Ok(self.fragments.len())
    }

    /// Open → Flushing. Returns false if the batch already left `Open`.
    pub fn begin_flush(&mut self) -> bool {
        if self.state != BatchState::Open {
            return false;
        }
        self.state = BatchState::Flushing;
        true
    }

    pub fn close(&mut self) {
        self.state = BatchState::Closed;
    }

    pub fn sender(&self) -> &SenderId {
        &self.sender
    }

    pub fn opened_at(&self) -> DateTime<Utc> {
        self.opened_at
    }

    pub fn fragments(&self) -> &[Fragment] {
        &self.fragments
    }

    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn state(&self) -> BatchState {
        self.state
    }
}
