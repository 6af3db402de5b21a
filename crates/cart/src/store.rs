//! The cart store and the handles consumers use to reach it.
//!
//! [`CartStore`] owns the canonical [`CartSnapshot`], the storage it is
//! persisted to, and the background task that loads and saves it. Consumers
//! never touch the store directly: they hold a [`Cart`], a cheap cloneable
//! handle that stops working once the store is disposed or dropped.
//!
//! # Lifecycle
//!
//! `CartStore::start` → [`StoreStatus::Hydrating`] → [`StoreStatus::Ready`] →
//! `CartStore::dispose` → [`StoreStatus::Disposed`]
//!
//! Operations are accepted while hydrating. The stored cart is merged
//! underneath whatever was added in the meantime, and nothing is written to
//! storage until the stored cart has been read.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use go_market_core::{CartItem, CartSnapshot, NewCartItem, ProductId};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use crate::config::CartConfig;
use crate::error::{CartError, HydrationError};
use crate::persistence::{JobSender, PersistJob, PersistReceipt, PersistWriter};
use crate::storage::KeyValueStorage;

/// Where a store is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreStatus {
    /// The stored cart is being loaded.
    Hydrating,
    /// The stored cart has been loaded (or found missing or unreadable).
    Ready,
    /// The store no longer accepts operations.
    Disposed,
}

/// Write side of the store. Holding the lock serializes commits so that
/// snapshots are published and queued for writing in the same order.
struct WriteGate {
    /// `None` once the store is disposed.
    writer: Option<JobSender>,
    /// Commits applied so far.
    commits: u64,
}

struct StoreInner {
    snapshot: watch::Sender<CartSnapshot>,
    status: watch::Sender<StoreStatus>,
    gate: Mutex<WriteGate>,
}

impl StoreInner {
    fn gate(&self) -> MutexGuard<'_, WriteGate> {
        // Commits never panic while holding the lock, so a poisoned gate still
        // holds consistent data.
        self.gate.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_active(&self) -> bool {
        self.gate().writer.is_some()
    }

    /// Apply `op` to the current snapshot. If it yields a new snapshot, publish
    /// it and queue that same snapshot for writing.
    fn commit(
        &self,
        op: impl FnOnce(&CartSnapshot) -> Option<CartSnapshot>,
    ) -> Result<PersistReceipt, CartError> {
        let mut gate = self.gate();
        let WriteGate { writer, commits } = &mut *gate;
        let writer = writer.as_ref().ok_or(CartError::ContextMisuse)?;

        let mut receipt = PersistReceipt::unchanged();
        self.snapshot.send_if_modified(|current| {
            let Some(next) = op(&*current) else {
                return false;
            };
            receipt = queue_write(writer, next.clone());
            *current = next;
            *commits += 1;
            true
        });
        Ok(receipt)
    }

    /// Install the cart read from storage.
    ///
    /// `normalized` is set when the stored value had duplicate or empty lines
    /// that were cleaned up on the way in.
    fn apply_hydrated(&self, stored: CartSnapshot, normalized: bool) {
        let gate = self.gate();
        let Some(writer) = gate.writer.as_ref() else {
            debug!("Store disposed during hydration, discarding stored cart");
            return;
        };
        let touched = gate.commits > 0;

        self.snapshot.send_if_modified(|current| {
            let next = if touched {
                stored.merged_with(&*current)
            } else {
                stored
            };
            if touched || normalized {
                if touched {
                    info!(
                        stored = next.len(),
                        "Merged stored cart with items added during hydration"
                    );
                }
                // Nobody waits on this receipt; failures are logged by the writer.
                let _ = queue_write(writer, next.clone());
            }
            if *current == next {
                return false;
            }
            *current = next;
            true
        });
    }

    fn set_status(&self, status: StoreStatus) {
        self.status.send_if_modified(|current| {
            // Disposed is terminal.
            if *current == status || *current == StoreStatus::Disposed {
                return false;
            }
            *current = status;
            true
        });
    }
}

fn queue_write(writer: &JobSender, snapshot: CartSnapshot) -> PersistReceipt {
    let (job, receipt) = PersistJob::new(snapshot);
    if writer.send(job).is_err() {
        error!("Persistence writer is gone, change kept in memory only");
    }
    receipt
}

/// Owner of the cart state.
///
/// Create one per application with [`CartStore::start`], hand out [`Cart`]
/// handles with [`CartStore::cart`], and call [`CartStore::dispose`] on
/// shutdown to flush pending writes. Dropping the store without disposing it
/// detaches every handle immediately; writes already queued still complete.
pub struct CartStore {
    inner: Arc<StoreInner>,
    task: Option<JoinHandle<()>>,
}

impl CartStore {
    /// Start a store backed by `storage`.
    ///
    /// Returns immediately in [`StoreStatus::Hydrating`]; the stored cart is
    /// loaded in the background. Use [`CartStore::ready`] to wait for it.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn start<S>(storage: Arc<S>, config: &CartConfig) -> Self
    where
        S: KeyValueStorage + 'static,
    {
        let storage: Arc<dyn KeyValueStorage> = storage;
        let (writer_tx, writer) = PersistWriter::new(
            Arc::clone(&storage),
            config.storage_key.clone(),
            config.persist_retries,
        );

        let (snapshot, _) = watch::channel(CartSnapshot::empty());
        let (status, _) = watch::channel(StoreStatus::Hydrating);
        let inner = Arc::new(StoreInner {
            snapshot,
            status,
            gate: Mutex::new(WriteGate {
                writer: Some(writer_tx),
                commits: 0,
            }),
        });

        // Hydration runs on the writer task so that no queued write can reach
        // storage before the stored cart has been read.
        let key = config.storage_key.clone();
        let hydrating = Arc::clone(&inner);
        let task = tokio::spawn(async move {
            hydrate(&hydrating, storage.as_ref(), &key).await;
            drop(hydrating);
            writer.run().await;
        });

        info!(key = %config.storage_key, "Cart store started");
        Self {
            inner,
            task: Some(task),
        }
    }

    /// A handle for consumers.
    #[must_use]
    pub fn cart(&self) -> Cart {
        Cart {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// The current snapshot.
    #[must_use]
    pub fn products(&self) -> CartSnapshot {
        self.inner.snapshot.borrow().clone()
    }

    /// Receive every snapshot published from now on.
    ///
    /// # Deadlocks
    ///
    /// Cart operations take the channel's write lock. Holding a reference
    /// returned by `borrow` on the receiver while calling an operation on the
    /// same thread deadlocks; clone the snapshot out of the borrow first.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<CartSnapshot> {
        self.inner.snapshot.subscribe()
    }

    /// The current lifecycle status.
    #[must_use]
    pub fn status(&self) -> StoreStatus {
        *self.inner.status.borrow()
    }

    /// Wait until the stored cart has been loaded.
    pub async fn ready(&self) {
        let mut status = self.inner.status.subscribe();
        // The sender lives as long as `self`, so this cannot fail.
        let _ = status
            .wait_for(|status| *status != StoreStatus::Hydrating)
            .await;
    }

    /// Stop accepting operations and wait for queued writes to finish.
    pub async fn dispose(mut self) {
        self.close();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                error!(error = %e, "Cart writer task failed");
            }
        }
        info!("Cart store disposed");
    }

    fn close(&self) {
        let writer = self.inner.gate().writer.take();
        if writer.is_some() {
            self.inner.set_status(StoreStatus::Disposed);
        }
    }
}

impl Drop for CartStore {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for CartStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartStore")
            .field("status", &self.status())
            .field("items", &self.inner.snapshot.borrow().len())
            .finish_non_exhaustive()
    }
}

/// Read the stored cart and install it, then mark the store ready.
#[instrument(skip(inner, storage))]
async fn hydrate(inner: &StoreInner, storage: &dyn KeyValueStorage, key: &str) {
    match load_stored(storage, key).await {
        Ok(Some((stored, normalized))) => {
            if normalized {
                warn!("Stored cart had damaged, duplicate or empty lines, normalized it");
            }
            info!(items = stored.len(), "Loaded stored cart");
            inner.apply_hydrated(stored, normalized);
        }
        Ok(None) => debug!("No stored cart, starting empty"),
        Err(e @ HydrationError::Parse(_)) => {
            warn!(error = %e, "Ignoring unreadable stored cart, starting empty");
        }
        Err(e @ HydrationError::Storage(_)) => {
            error!(error = %e, "Could not read stored cart, starting empty");
        }
    }
    inner.set_status(StoreStatus::Ready);
}

/// Read and decode the stored cart. The flag reports whether decoding had to
/// skip damaged lines, merge duplicate IDs or drop empty lines.
///
/// Lines are decoded one at a time so that a single bad entry (`null`, a
/// negative quantity, a price out of range) costs only that line.
async fn load_stored(
    storage: &dyn KeyValueStorage,
    key: &str,
) -> Result<Option<(CartSnapshot, bool)>, HydrationError> {
    let Some(raw) = storage.get(key).await? else {
        return Ok(None);
    };
    let lines: Vec<serde_json::Value> = serde_json::from_str(&raw)?;
    let line_count = lines.len();
    let items: Vec<CartItem> = lines
        .into_iter()
        .enumerate()
        .filter_map(|(index, line)| match serde_json::from_value(line) {
            Ok(item) => Some(item),
            Err(e) => {
                warn!(index, error = %e, "Skipping damaged stored cart line");
                None
            }
        })
        .collect();
    let snapshot = CartSnapshot::from_items(items);
    let normalized = snapshot.len() != line_count;
    Ok(Some((snapshot, normalized)))
}

/// A consumer's handle to a [`CartStore`].
///
/// Every method fails with [`CartError::ContextMisuse`] once the store has
/// been disposed or dropped.
#[derive(Clone)]
pub struct Cart {
    inner: Weak<StoreInner>,
}

impl Cart {
    fn store(&self) -> Result<Arc<StoreInner>, CartError> {
        let inner = self.inner.upgrade().ok_or(CartError::ContextMisuse)?;
        if inner.is_active() {
            Ok(inner)
        } else {
            Err(CartError::ContextMisuse)
        }
    }

    /// The current snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::ContextMisuse`] if the store is gone.
    pub fn products(&self) -> Result<CartSnapshot, CartError> {
        Ok(self.store()?.snapshot.borrow().clone())
    }

    /// Receive every snapshot published from now on.
    ///
    /// # Deadlocks
    ///
    /// Cart operations take the channel's write lock. Holding a reference
    /// returned by `borrow` on the receiver while calling an operation on the
    /// same thread deadlocks; clone the snapshot out of the borrow first.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::ContextMisuse`] if the store is gone.
    pub fn subscribe(&self) -> Result<watch::Receiver<CartSnapshot>, CartError> {
        Ok(self.store()?.snapshot.subscribe())
    }

    /// The store's lifecycle status; [`StoreStatus::Disposed`] once it is gone.
    #[must_use]
    pub fn status(&self) -> StoreStatus {
        self.inner
            .upgrade()
            .map_or(StoreStatus::Disposed, |inner| *inner.status.borrow())
    }

    /// Add one unit of a product, appending it if it is not in the cart yet.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::ContextMisuse`] if the store is gone.
    #[instrument(skip_all, fields(id = %item.id))]
    pub fn add_to_cart(&self, item: NewCartItem) -> Result<PersistReceipt, CartError> {
        let receipt = self.store()?.commit(|cart| Some(cart.with_added(item)))?;
        debug!("Added to cart");
        Ok(receipt)
    }

    /// Add one unit to a product already in the cart. Unknown IDs are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::ContextMisuse`] if the store is gone.
    #[instrument(skip_all, fields(id = %id))]
    pub fn increment(&self, id: &ProductId) -> Result<PersistReceipt, CartError> {
        let receipt = self.store()?.commit(|cart| cart.with_incremented(id))?;
        if receipt.is_unchanged() {
            debug!("Product not in cart, nothing to increment");
        }
        Ok(receipt)
    }

    /// Remove one unit of a product, dropping the line at zero. Unknown IDs are
    /// ignored.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::ContextMisuse`] if the store is gone.
    #[instrument(skip_all, fields(id = %id))]
    pub fn decrement(&self, id: &ProductId) -> Result<PersistReceipt, CartError> {
        let receipt = self.store()?.commit(|cart| cart.with_decremented(id))?;
        if receipt.is_unchanged() {
            debug!("Product not in cart, nothing to decrement");
        }
        Ok(receipt)
    }

    /// Remove every line.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::ContextMisuse`] if the store is gone.
    #[instrument(skip(self))]
    pub fn clear(&self) -> Result<PersistReceipt, CartError> {
        self.store()?
            .commit(|cart| (!cart.is_empty()).then(CartSnapshot::empty))
    }
}

impl std::fmt::Debug for Cart {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cart")
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}
