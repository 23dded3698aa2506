//! Batch aggregator: one debounce actor per active sender.
//!
//! `ingest` only hands the fragment to the sender's actor. The actor owns
//! the sender's [`PendingBatch`], sleeps until its deadline, and on expiry
//! compiles the batch and awaits the flush handler before reading more
//! input. Fragments that arrive meanwhile wait in the actor's queue and open
//! the next batch.

use crate::compiler::BatchCompiler;
use crate::pending::PendingBatch;
use chrono::Utc;
use futures::future::join_all;
use keepsake_config::BatchConfig;
use keepsake_core::batch::{BatchHandler, Fragment, SenderId};
use keepsake_core::error::SchedulingError;
use keepsake_core::event::{DomainEvent, EventBus, FlushTrigger};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TryRecvError};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Scheduling parameters.
#[derive(Debug, Clone)]
pub struct BatchSettings {
    /// Quiet period after the latest fragment before a batch flushes
    pub window: Duration,
    /// Flush at this many fragments without waiting for the window;
    /// the fragment that reaches the count is part of the flushed batch
    pub max_fragments: usize,
    /// Joins segments in the compiled text
    pub separator: String,
}

impl BatchSettings {
    pub fn from_config(config: &BatchConfig) -> Self {
        Self {
            window: config.window(),
            max_fragments: config.max_fragments.max(1),
            separator: config.separator.clone(),
        }
    }
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self::from_config(&BatchConfig::default())
    }
}

struct Inbound {
    fragment: Fragment,
    received: Instant,
}

struct ActorSlot {
    id: u64,
    tx: mpsc::UnboundedSender<Inbound>,
    handle: JoinHandle<()>,
}

struct Shared {
    handler: Arc<dyn BatchHandler>,
    compiler: BatchCompiler,
    settings: BatchSettings,
    events: Arc<EventBus>,
    actors: Mutex<HashMap<SenderId, ActorSlot>>,
    next_actor: AtomicU64,
    closed: AtomicBool,
}

impl Shared {
    fn actors(&self) -> MutexGuard<'_, HashMap<SenderId, ActorSlot>> {
        self.actors.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Per-sender debounce scheduler.
///
/// Cloning is cheap; clones share the same sender map.
#[derive(Clone)]
pub struct BatchAggregator {
    shared: Arc<Shared>,
}

impl BatchAggregator {
    pub fn new(handler: Arc<dyn BatchHandler>, settings: BatchSettings, events: Arc<EventBus>) -> Self {
        Self {
            shared: Arc::new(Shared {
                handler,
                compiler: BatchCompiler::new(settings.separator.clone()),
                settings,
                events,
                actors: Mutex::new(HashMap::new()),
                next_actor: AtomicU64::new(1),
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Accept a fragment for `sender`. Never blocks and never runs the handler.
    ///
    /// Must be called from within a tokio runtime.
    pub fn ingest(&self, sender: SenderId, fragment: Fragment) -> Result<(), SchedulingError> {
        let mut inbound = Inbound {
            fragment,
            received: Instant::now(),
        };

        let mut actors = self.shared.actors();
        if self.shared.closed.load(Ordering::Acquire) {
            return Err(SchedulingError::Closed);
        }

        if let Some(slot) = actors.get(&sender) {
            match slot.tx.send(inbound) {
                Ok(()) => return Ok(()),
                // The actor is gone without retiring; start a fresh one.
                Err(mpsc::error::SendError(returned)) => inbound = returned,
            }
        }

        let id = self.shared.next_actor.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        // The receiver is alive, so this cannot fail.
        let _ = tx.send(inbound);
        let actor = SenderActor {
            id,
            sender: sender.clone(),
            shared: self.shared.clone(),
            rx,
            pending: None,
        };
        let handle = tokio::spawn(actor.run());
        debug!(sender = %sender, actor = id, "Started sender actor");
        actors.insert(sender, ActorSlot { id, tx, handle });
        Ok(())
    }

    /// Number of senders with a live actor.
    pub fn active_senders(&self) -> usize {
        self.shared.actors().len()
    }

    /// Stop accepting input, flush every pending batch, and wait for the
    /// actors to finish.
    pub async fn shutdown(&self) {
        let handles: Vec<JoinHandle<()>> = {
            let mut actors = self.shared.actors();
            self.shared.closed.store(true, Ordering::Release);
            // Dropping each sender closes the queue; the actor drains it,
            // flushes, and exits.
            actors.drain().map(|(_, slot)| slot.handle).collect()
        };
        info!(actors = handles.len(), "Shutting down batch aggregator");

        for result in join_all(handles).await {
            if let Err(e) = result {
                error!(error = %e, "Sender actor failed during shutdown");
            }
        }
    }
}

struct SenderActor {
    id: u64,
    sender: SenderId,
    shared: Arc<Shared>,
    rx: mpsc::UnboundedReceiver<Inbound>,
    pending: Option<PendingBatch>,
}

impl SenderActor {
    async fn run(mut self) {
        loop {
            let next = match self.pending.as_ref().map(PendingBatch::deadline) {
                Some(deadline) => {
                    tokio::select! {
                        biased;
                        inbound = self.rx.recv() => inbound,
                        _ = tokio::time::sleep_until(deadline) => {
                            self.flush(FlushTrigger::Window).await;
                            continue;
                        }
                    }
                }
                None => match self.rx.try_recv() {
                    Ok(inbound) => Some(inbound),
                    Err(TryRecvError::Disconnected) => None,
                    Err(TryRecvError::Empty) => match self.try_retire() {
                        Some(inbound) => Some(inbound),
                        None => return,
                    },
                },
            };

            match next {
                Some(inbound) => self.accept(inbound).await,
                None => {
                    if self.pending.is_some() {
                        self.flush(FlushTrigger::Shutdown).await;
                    }
                    debug!(sender = %self.sender, actor = self.id, "Sender queue closed");
                    return;
                }
            }
        }
    }

    /// Leave the sender map if no input is queued. Runs under the map lock,
    /// which `ingest` also holds while sending, so nothing can slip in
    /// between the last receive and removal. Returns a fragment that raced in.
    fn try_retire(&mut self) -> Option<Inbound> {
        let mut actors = self.shared.actors();
        if let Ok(inbound) = self.rx.try_recv() {
            return Some(inbound);
        }
        if actors.get(&self.sender).is_some_and(|slot| slot.id == self.id) {
            actors.remove(&self.sender);
        }
        debug!(sender = %self.sender, actor = self.id, "Sender actor retired");
        None
    }

    async fn accept(&mut self, inbound: Inbound) {
        // The queue can hold a fragment that arrived after the open batch's
        // deadline; that batch is already complete.
        if self
            .pending
            .as_ref()
            .is_some_and(|batch| batch.deadline() <= inbound.received)
        {
            self.flush(FlushTrigger::Window).await;
        }

        let deadline = inbound.received + self.shared.settings.window;
        let count = match self.pending.as_mut() {
            Some(batch) => match batch.push(inbound.fragment, deadline) {
                Ok(count) => count,
                Err(_) => {
                    // Unreachable: a batch leaves `Open` only inside flush,
                    // which clears `pending`.
                    warn!(sender = %self.sender, "Fragment offered to a closed batch");
                    return;
                }
            },
            None => {
                self.pending = Some(PendingBatch::open(self.sender.clone(), inbound.fragment, deadline));
                1
            }
        };

        self.shared.events.publish(DomainEvent::FragmentIngested {
            sender: self.sender.to_string(),
            pending: count,
            timestamp: Utc::now(),
        });
        debug!(sender = %self.sender, fragments = count, "Fragment ingested");

        if count >= self.shared.settings.max_fragments {
            self.flush(FlushTrigger::SizeLimit).await;
        }
    }

    async fn flush(&mut self, trigger: FlushTrigger) {
        let Some(mut batch) = self.pending.take() else {
            return;
        };
        if !batch.begin_flush() {
            return;
        }

        let compiled = self.shared.compiler.compile(&batch, Utc::now());
        let fragments = compiled.fragment_count();
        info!(
            sender = %self.sender,
            fragments,
            media = compiled.media.len(),
            trigger = ?trigger,
            "Flushing batch"
        );
        self.shared.events.publish(DomainEvent::BatchFlushed {
            sender: self.sender.to_string(),
            fragments,
            media: compiled.media.len(),
            trigger,
            timestamp: Utc::now(),
        });

        // A separate task keeps a panicking handler from taking the actor down.
        let handler = self.shared.handler.clone();
        let outcome = match tokio::spawn(async move { handler.on_flush(compiled).await }).await {
            Ok(result) => result,
            Err(e) if e.is_panic() => Err(SchedulingError::HandlerPanicked(e.to_string())),
            Err(e) => Err(SchedulingError::HandlerFailed(e.to_string())),
        };
        batch.close();

        match outcome {
            Ok(report) => {
                debug!(
                    sender = %self.sender,
                    turn_id = %report.turn_id,
                    state = %report.state,
                    "Flush handler finished"
                );
            }
            Err(e) => {
                error!(sender = %self.sender, fragments, error = %e, "Batch dropped");
                self.shared.events.publish(DomainEvent::BatchDropped {
                    sender: self.sender.to_string(),
                    fragments,
                    reason: e.to_string(),
                    timestamp: Utc::now(),
                });
            }
        }
    }
}
