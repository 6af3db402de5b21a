//! Background writer that persists cart snapshots.
//!
//! All writes go through one task fed by an unbounded queue, so queuing a
//! write never blocks a cart operation and writes reach storage in the order
//! the snapshots were committed. When several snapshots are waiting, only the
//! newest is written and every waiting receipt gets that write's result: once
//! a newer snapshot is durable, the older ones no longer matter.

use std::sync::Arc;
use std::time::Duration;

use go_market_core::CartSnapshot;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, instrument, warn};

use crate::error::PersistError;
use crate::storage::KeyValueStorage;

/// Base delay before retrying a failed write; grows linearly per attempt.
const RETRY_BACKOFF: Duration = Duration::from_millis(50);

type PersistResult = Result<(), PersistError>;

/// A snapshot waiting to be written.
pub(crate) struct PersistJob {
    snapshot: CartSnapshot,
    done: oneshot::Sender<PersistResult>,
}

impl PersistJob {
    /// Create a job and the receipt that observes it.
    pub(crate) fn new(snapshot: CartSnapshot) -> (Self, PersistReceipt) {
        let (done, rx) = oneshot::channel();
        (Self { snapshot, done }, PersistReceipt::pending(rx))
    }
}

/// How a persisted operation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistOutcome {
    /// The resulting snapshot (or a newer one) is in storage.
    Written,
    /// The operation changed nothing, so nothing was written.
    Unchanged,
}

/// Completion signal for the write queued by a cart operation.
///
/// Dropping the receipt leaves the write running in the background; awaiting
/// [`PersistReceipt::wait`] waits until it is durable.
#[derive(Debug)]
pub struct PersistReceipt {
    pending: Option<oneshot::Receiver<PersistResult>>,
}

impl PersistReceipt {
    /// Receipt for an operation that did not change the cart.
    pub(crate) const fn unchanged() -> Self {
        Self { pending: None }
    }

    const fn pending(rx: oneshot::Receiver<PersistResult>) -> Self {
        Self { pending: Some(rx) }
    }

    /// Whether the operation left the cart as it was.
    #[must_use]
    pub const fn is_unchanged(&self) -> bool {
        self.pending.is_none()
    }

    /// Wait for the write to finish.
    ///
    /// # Errors
    ///
    /// Returns the [`PersistError`] of the final failed attempt, or
    /// [`PersistError::WriterClosed`] if the writer went away first.
    pub async fn wait(self) -> Result<PersistOutcome, PersistError> {
        match self.pending {
            None => Ok(PersistOutcome::Unchanged),
            Some(rx) => {
                rx.await.map_err(|_| PersistError::WriterClosed)??;
                Ok(PersistOutcome::Written)
            }
        }
    }
}

pub(crate) type JobSender = mpsc::UnboundedSender<PersistJob>;

/// Consumer side of the write queue for one storage slot.
pub(crate) struct PersistWriter {
    storage: Arc<dyn KeyValueStorage>,
    key: String,
    retries: u32,
    rx: mpsc::UnboundedReceiver<PersistJob>,
}

impl PersistWriter {
    /// Create the queue. Jobs sent before [`PersistWriter::run`] starts wait
    /// in the queue.
    pub(crate) fn new(
        storage: Arc<dyn KeyValueStorage>,
        key: String,
        retries: u32,
    ) -> (JobSender, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            tx,
            Self {
                storage,
                key,
                retries,
                rx,
            },
        )
    }

    /// Process jobs until every sender is dropped and the queue is drained.
    pub(crate) async fn run(mut self) {
        while let Some(first) = self.rx.recv().await {
            let mut batch = vec![first];
            while let Ok(job) = self.rx.try_recv() {
                batch.push(job);
            }

            let Some(latest) = batch.last().map(|job| job.snapshot.clone()) else {
                continue;
            };
            if batch.len() > 1 {
                debug!(coalesced = batch.len(), "Writing newest of queued snapshots");
            }

            let result =
                write_snapshot(self.storage.as_ref(), &self.key, &latest, self.retries).await;
            for job in batch {
                // The caller may have dropped its receipt.
                let _ = job.done.send(result.clone());
            }
        }
        debug!("Persistence writer stopped");
    }
}

/// Serialize and store one snapshot, retrying failed writes.
#[instrument(skip(storage, snapshot), fields(items = snapshot.len()))]
async fn write_snapshot(
    storage: &dyn KeyValueStorage,
    key: &str,
    snapshot: &CartSnapshot,
    retries: u32,
) -> PersistResult {
    let value = serde_json::to_string(snapshot).map_err(|e| {
        error!(error = %e, "Failed to serialize cart");
        PersistError::Serialize(e.to_string())
    })?;

    let attempts = retries.saturating_add(1);
    let mut attempt = 1;
    loop {
        match storage.set(key, &value).await {
            Ok(()) => {
                debug!(attempt, "Cart persisted");
                return Ok(());
            }
            Err(e) if attempt < attempts => {
                warn!(attempt, error = %e, "Cart write failed, retrying");
                tokio::time::sleep(RETRY_BACKOFF * attempt).await;
                attempt += 1;
            }
            Err(e) => {
                error!(attempts, error = %e, "Cart write failed, giving up");
                return Err(PersistError::Storage {
                    attempts,
                    message: e.to_string(),
                });
            }
        }
    }
}
