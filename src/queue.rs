//! Durable offline queue with ordered replay.
//!
//! Mutating requests that cannot complete while offline are persisted
//! here and replayed on reconnect. Items replay strictly in enqueue
//! order; one failure bumps that item's retry counter and moves on, so a
//! single bad item never blocks the rest of the drain. Items that have
//! already failed [`MAX_RETRY_ATTEMPTS`] times are dropped without
//! another attempt — the caller got a fallback result at enqueue time,
//! so nothing is owed to anyone.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, info, instrument, warn};

use crate::backend::ReplayTransport;
use crate::error::Result;
use crate::store::StoreAdapter;
use crate::telemetry;
use crate::types::{QueueItem, QueueMethod};

/// Replay attempts allowed per item before it is dropped.
pub const MAX_RETRY_ATTEMPTS: u32 = 3;

/// What a drain pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainOutcome {
    /// A drain was already running; this call did nothing.
    pub skipped: bool,
    /// Items replayed successfully (and deleted).
    pub replayed: u64,
    /// Items dropped for exceeding the retry ceiling.
    pub expired: u64,
    /// Items that failed this pass (retry counter bumped, kept).
    pub failed: u64,
}

/// Clears the drain-in-progress flag when the pass ends, however it ends.
struct DrainGuard<'a>(&'a AtomicBool);

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Durable FIFO of pending mutating requests.
pub struct OfflineQueue {
    store: Arc<StoreAdapter>,
    transport: Arc<dyn ReplayTransport>,
    draining: AtomicBool,
}

impl OfflineQueue {
    /// Create a queue over the given store and replay transport.
    pub fn new(store: Arc<StoreAdapter>, transport: Arc<dyn ReplayTransport>) -> Self {
        Self {
            store,
            transport,
            draining: AtomicBool::new(false),
        }
    }

    /// Persist a request for later replay. Returns the stored item with
    /// its assigned id and `retry_count = 0`.
    pub fn enqueue(
        &self,
        method: QueueMethod,
        endpoint: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<QueueItem> {
        let item = self.store.enqueue_item(method, endpoint, body)?;
        metrics::counter!(telemetry::QUEUE_ENQUEUED_TOTAL).increment(1);
        debug!(id = item.id, endpoint, "queued offline request");
        Ok(item)
    }

    /// Number of items awaiting replay.
    pub fn len(&self) -> Result<u64> {
        self.store.queue_len()
    }

    /// Whether the queue is empty.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Replay all queued items in enqueue order.
    ///
    /// Re-entrant calls no-op: rapid online/offline flapping can trigger
    /// overlapping drains, and only one may iterate at a time. The
    /// in-progress flag is cleared by a drop guard, so an error mid-drain
    /// cannot wedge future drains.
    #[instrument(skip(self))]
    pub async fn drain(&self) -> Result<DrainOutcome> {
        if self
            .draining
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            debug!("drain already in progress");
            return Ok(DrainOutcome {
                skipped: true,
                ..DrainOutcome::default()
            });
        }
        let _guard = DrainGuard(&self.draining);
        metrics::counter!(telemetry::QUEUE_DRAINS_TOTAL).increment(1);

        let items = self.store.queue_items()?;
        let mut outcome = DrainOutcome::default();

        for item in items {
            if item.retry_count >= MAX_RETRY_ATTEMPTS {
                // expired before this pass; never attempted again
                self.store.delete_item(item.id)?;
                metrics::counter!(telemetry::QUEUE_EXPIRED_TOTAL).increment(1);
                warn!(id = item.id, retries = item.retry_count, "dropping expired queue item");
                outcome.expired += 1;
                continue;
            }

            match self.transport.replay(&item).await {
                Ok(()) => {
                    self.store.delete_item(item.id)?;
                    metrics::counter!(telemetry::QUEUE_REPLAYED_TOTAL).increment(1);
                    outcome.replayed += 1;
                }
                Err(e) => {
                    // keep the item, move on to the next one
                    self.store.bump_retry(item.id)?;
                    warn!(id = item.id, error = %e, "queued request replay failed");
                    outcome.failed += 1;
                }
            }
        }

        if outcome.replayed > 0 || outcome.expired > 0 {
            info!(
                replayed = outcome.replayed,
                expired = outcome.expired,
                failed = outcome.failed,
                "queue drain finished"
            );
        }
        Ok(outcome)
    }
}
