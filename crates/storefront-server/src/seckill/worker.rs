//! The single consumer that turns admitted intents into order rows.
//!
//! ## Stream transport
//!
//! ```text
//! startup ─→ drain pending ─→ read new (block) ─→ persist ─→ ack
//!                 ↑                                  │
//!                 └────────── infrastructure error ──┘
//! ```
//!
//! An entry is acknowledged once its outcome is known (created, duplicate,
//! sold out, or dropped on lock contention). Infrastructure faults leave it
//! unacknowledged; the worker then replays its pending list with a short
//! backoff until the list is empty, and only then goes back to new entries.
//!
//! ## Queue transport
//!
//! Intents are persisted in arrival order. A failed intent is logged and lost.
//! On shutdown the queue is closed and whatever is still buffered is persisted
//! before the worker returns.

use std::time::Duration;

use storefront_core::OrderIntent;
use storefront_kv::{DynKvStore, StreamCursor, StreamEntry};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::error::{SeckillError, SeckillResult};
use super::intent;
use super::persistence::{OrderPersister, PersistOutcome};
use super::transport::{IntentFeed, StreamFeed};
use crate::metrics;

pub struct OrderWorker {
    kv: DynKvStore,
    persister: OrderPersister,
    feed: IntentFeed,
    backoff: Duration,
}

impl OrderWorker {
    pub fn new(
        kv: DynKvStore,
        persister: OrderPersister,
        feed: IntentFeed,
        backoff: Duration,
    ) -> Self {
        Self {
            kv,
            persister,
            feed,
            backoff,
        }
    }

    /// Consumes intents until `cancel` fires.
    pub async fn run(self, cancel: CancellationToken) {
        let Self {
            kv,
            persister,
            feed,
            backoff,
        } = self;

        match feed {
            IntentFeed::Stream(feed) => {
                let consumer = StreamConsumer {
                    kv,
                    persister,
                    feed,
                    backoff,
                    cancel,
                };
                consumer.run().await;
            }
            IntentFeed::Queue(rx) => run_queue(persister, rx, cancel).await,
        }
        tracing::info!("Order worker stopped");
    }
}

async fn run_queue(
    persister: OrderPersister,
    mut rx: mpsc::Receiver<OrderIntent>,
    cancel: CancellationToken,
) {
    tracing::info!("Order worker consuming in-process queue");
    loop {
        let intent = tokio::select! {
            _ = cancel.cancelled() => break,
            intent = rx.recv() => intent,
        };
        let Some(intent) = intent else {
            return;
        };
        persist_queued(&persister, &intent).await;
    }

    // Every buffered intent already holds reserved stock
    rx.close();
    let mut drained = 0usize;
    while let Some(intent) = rx.recv().await {
        persist_queued(&persister, &intent).await;
        drained += 1;
    }
    if drained > 0 {
        tracing::info!(drained, "Drained queued intents on shutdown");
    }
}

async fn persist_queued(persister: &OrderPersister, intent: &OrderIntent) {
    match persister.persist(intent).await {
        Ok(outcome) => metrics::record_order(outcome.as_str()),
        Err(e) => {
            metrics::record_order_failure(e.category());
            tracing::error!(
                order_id = intent.order_id,
                user_id = intent.user_id,
                voucher_id = intent.voucher_id,
                category = e.category(),
                error = %e,
                "Failed to persist order, intent lost"
            );
        }
    }
}

struct StreamConsumer {
    kv: DynKvStore,
    persister: OrderPersister,
    feed: StreamFeed,
    backoff: Duration,
    cancel: CancellationToken,
}

impl StreamConsumer {
    async fn run(&self) {
        if !self.ensure_group().await {
            return;
        }
        tracing::info!(
            stream = %self.feed.stream_key,
            group = %self.feed.group,
            consumer = %self.feed.consumer,
            "Order worker consuming stream"
        );

        // Entries delivered before a crash are only visible in the pending list
        self.drain_pending().await;

        while !self.cancel.is_cancelled() {
            let read = tokio::select! {
                _ = self.cancel.cancelled() => return,
                read = self.kv.read_group(
                    &self.feed.stream_key,
                    &self.feed.group,
                    &self.feed.consumer,
                    StreamCursor::New {
                        block: Some(self.feed.block),
                    },
                    1,
                ) => read,
            };

            let failed = match read {
                Ok(entries) => {
                    let mut failed = false;
                    for entry in &entries {
                        if let Err(e) = self.handle(entry).await {
                            tracing::error!(entry_id = %entry.id, error = %e, "Failed to process order entry");
                            failed = true;
                        }
                    }
                    failed
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to read order stream");
                    if !self.pause().await {
                        return;
                    }
                    true
                }
            };

            if failed {
                self.drain_pending().await;
            }
        }
    }

    /// Creates the consumer group, retrying until it succeeds or the worker
    /// is cancelled.
    async fn ensure_group(&self) -> bool {
        loop {
            match self
                .kv
                .ensure_group(&self.feed.stream_key, &self.feed.group)
                .await
            {
                Ok(()) => return true,
                Err(e) => {
                    tracing::error!(stream = %self.feed.stream_key, error = %e, "Failed to create consumer group");
                    if !self.pause().await {
                        return false;
                    }
                }
            }
        }
    }

    /// Replays unacknowledged entries until none are left.
    async fn drain_pending(&self) {
        while !self.cancel.is_cancelled() {
            let read = self
                .kv
                .read_group(
                    &self.feed.stream_key,
                    &self.feed.group,
                    &self.feed.consumer,
                    StreamCursor::Pending,
                    1,
                )
                .await;

            match read {
                Ok(entries) if entries.is_empty() => return,
                Ok(entries) => {
                    for entry in &entries {
                        if let Err(e) = self.handle(entry).await {
                            tracing::error!(entry_id = %entry.id, error = %e, "Failed to process pending order entry");
                            if !self.pause().await {
                                return;
                            }
                        }
                    }
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to read pending order entries");
                    if !self.pause().await {
                        return;
                    }
                }
            }
        }
    }

    /// Persists one entry and acknowledges it.
    async fn handle(&self, entry: &StreamEntry) -> SeckillResult<()> {
        match intent::from_entry(entry) {
            Ok(intent) => {
                let outcome = match self.persister.persist(&intent).await {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        metrics::record_order_failure(e.category());
                        return Err(e);
                    }
                };
                metrics::record_order(outcome.as_str());
                if outcome == PersistOutcome::LockUnavailable {
                    tracing::debug!(entry_id = %entry.id, "Acknowledging intent dropped on lock contention");
                }
            }
            // Replaying can never fix it
            Err(e @ SeckillError::MalformedIntent { .. }) => {
                metrics::record_order("malformed");
                tracing::error!(entry_id = %entry.id, error = %e, "Discarding malformed order entry");
            }
            Err(e) => return Err(e),
        }

        self.kv
            .ack(&self.feed.stream_key, &self.feed.group, &entry.id)
            .await?;
        Ok(())
    }

    /// Sleeps for the backoff. Returns `false` if cancelled meanwhile.
    async fn pause(&self) -> bool {
        tokio::select! {
            _ = self.cancel.cancelled() => false,
            _ = tokio::time::sleep(self.backoff) => true,
        }
    }
}
