//! Turn pipeline: the flush handler that turns a compiled batch into one reply.

use crate::loop_runner::AgentLoop;
use crate::prompt;
use async_trait::async_trait;
use chrono::Utc;
use keepsake_core::batch::{BatchHandler, CompiledBatch, TurnReport};
use keepsake_core::channel::DeliveryChannel;
use keepsake_core::context::{BatchMetadata, CallerIdentity, ExecutionContext};
use keepsake_core::error::SchedulingError;
use keepsake_core::event::{DomainEvent, EventBus};
use keepsake_core::media::MediaStore;
use keepsake_core::message::{Role, Transcript};
use keepsake_core::store::{HistoryEntry, Store};
use std::sync::Arc;
use tracing::{error, info, warn};

const DEFAULT_HISTORY_LIMIT: usize = 10;

pub struct TurnPipeline {
    agent: AgentLoop,
    store: Arc<dyn Store>,
    media: Arc<dyn MediaStore>,
    channel: Arc<dyn DeliveryChannel>,
    events: Arc<EventBus>,
    history_limit: usize,
}

impl TurnPipeline {
    pub fn new(
        agent: AgentLoop,
        store: Arc<dyn Store>,
        media: Arc<dyn MediaStore>,
        channel: Arc<dyn DeliveryChannel>,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            agent,
            store,
            media,
            channel,
            events,
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }

    /// Number of history entries loaded ahead of each batch.
    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }

    /// Resolve the caller and build the turn's context and opening transcript.
    async fn prepare(&self, batch: &CompiledBatch) -> keepsake_core::Result<(ExecutionContext, Transcript)> {
        let user = self
            .store
            .upsert_user(&batch.sender, batch.sender_name.as_deref())
            .await?;
        let history = self.store.recent_history(user.id, self.history_limit).await?;

        let caller = CallerIdentity {
            user_id: user.id,
            sender: user.sender,
            display_name: user.display_name,
        };
        let transcript = prompt::initial_transcript(&caller, &history, batch);
        let ctx = ExecutionContext::new(caller, self.store.clone(), self.media.clone()).with_history(history);
        ctx.set_batch(BatchMetadata::from_batch(batch))?;
        Ok((ctx, transcript))
    }

    async fn record_history(&self, ctx: &ExecutionContext, batch: &CompiledBatch, reply: &str) {
        let entries = [
            HistoryEntry::new(Role::User, batch.text.clone(), batch.media.len()),
            HistoryEntry::new(Role::Assistant, reply, 0),
        ];
        for entry in entries {
            if let Err(e) = self.store.append_history(ctx.user_id(), entry).await {
                warn!(sender = %batch.sender, error = %e, "Failed to record conversation history");
                return;
            }
        }
    }

    async fn deliver(&self, batch: &CompiledBatch, reply: &str) -> Result<(), SchedulingError> {
        match self.channel.deliver(&batch.sender, reply).await {
            Ok(()) => Ok(()),
            Err(e) => {
                error!(channel = self.channel.name(), sender = %batch.sender, error = %e, "Reply delivery failed");
                self.events.publish(DomainEvent::DeliveryFailed {
                    channel: self.channel.name().to_string(),
                    recipient: batch.sender.to_string(),
                    error_message: e.to_string(),
                    timestamp: Utc::now(),
                });
                Err(SchedulingError::DeliveryFailed(e.to_string()))
            }
        }
    }
}

#[async_trait]
impl BatchHandler for TurnPipeline {
    async fn on_flush(&self, batch: CompiledBatch) -> Result<TurnReport, SchedulingError> {
        let (ctx, transcript) = match self.prepare(&batch).await {
            Ok(prepared) => prepared,
            Err(e) => {
                error!(sender = %batch.sender, error = %e, "Turn setup failed");
                let apology = self.agent.replies().apology.clone();
                self.deliver(&batch, &apology).await?;
                return Err(SchedulingError::HandlerFailed(e.to_string()));
            }
        };

        let turn = self.agent.run(transcript, &ctx).await;
        let report = turn.report();

        self.record_history(&ctx, &batch, &report.reply).await;
        self.events.publish(DomainEvent::TurnCompleted {
            sender: batch.sender.to_string(),
            state: report.state.clone(),
            iterations: report.iterations,
            tool_calls: report.tool_calls,
            timestamp: Utc::now(),
        });

        self.deliver(&batch, &report.reply).await?;
        info!(
            sender = %batch.sender,
            fragments = batch.fragment_count(),
            state = %report.state,
            iterations = report.iterations,
            "Reply delivered"
        );
        Ok(report)
    }
}
