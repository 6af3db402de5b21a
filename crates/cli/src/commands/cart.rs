//! Cart commands.
//!
//! # Usage
//!
//! ```bash
//! gm-cart add --id 1 --title "Pineapple" --image-url https://cdn.example.com/1.png --price 4.99
//! gm-cart increment 1
//! gm-cart decrement 1
//! gm-cart show --json
//! gm-cart clear
//! ```
//!
//! # Environment Variables
//!
//! - `GO_MARKET_STORAGE_DIR` - Directory holding the cart file
//! - `GO_MARKET_STORAGE_KEY` - Storage key of the cart
//! - `GO_MARKET_PERSIST_RETRIES` - Retries after a failed write

use std::path::Path;
use std::sync::Arc;

use go_market_cart::{
    Cart, CartConfig, CartError, CartStore, FileStorage, PersistError, PersistOutcome,
    PersistReceipt,
};
use go_market_core::{CartSnapshot, NewCartItem, ProductId};
use thiserror::Error;
use tracing::{info, warn};

/// Errors that can occur while running a cart command.
#[derive(Debug, Error)]
pub enum CommandError {
    /// The store rejected the operation.
    #[error("Cart error: {0}")]
    Cart(#[from] CartError),

    /// The change could not be saved.
    #[error("Failed to save cart: {0}")]
    Persist(#[from] PersistError),
}

/// Open the cart stored under `dir` and wait for it to load.
async fn open(dir: &Path, config: &CartConfig) -> CartStore {
    let storage = Arc::new(FileStorage::new(dir));
    let store = CartStore::start(storage, config);
    store.ready().await;
    store
}

/// Run one mutation, wait until it is on disk, and return the resulting cart.
async fn mutate(
    dir: &Path,
    config: &CartConfig,
    op: impl FnOnce(&Cart) -> Result<PersistReceipt, CartError>,
) -> Result<CartSnapshot, CommandError> {
    let store = open(dir, config).await;
    let cart = store.cart();

    let outcome = op(&cart)?.wait().await;
    let snapshot = store.products();
    store.dispose().await;

    match outcome? {
        PersistOutcome::Written => info!(items = snapshot.len(), "Cart saved"),
        PersistOutcome::Unchanged => warn!("Product not in cart, nothing changed"),
    }
    Ok(snapshot)
}

/// Load the cart without changing it.
pub async fn show(dir: &Path, config: &CartConfig) -> CartSnapshot {
    let store = open(dir, config).await;
    let snapshot = store.products();
    store.dispose().await;
    snapshot
}

/// Add one unit of a product.
///
/// # Errors
///
/// Returns an error if the cart could not be saved.
pub async fn add(
    dir: &Path,
    config: &CartConfig,
    item: NewCartItem,
) -> Result<CartSnapshot, CommandError> {
    mutate(dir, config, |cart| cart.add_to_cart(item)).await
}

/// Add one unit to a product already in the cart.
///
/// # Errors
///
/// Returns an error if the cart could not be saved.
pub async fn increment(
    dir: &Path,
    config: &CartConfig,
    id: &ProductId,
) -> Result<CartSnapshot, CommandError> {
    mutate(dir, config, |cart| cart.increment(id)).await
}

/// Remove one unit of a product.
///
/// # Errors
///
/// Returns an error if the cart could not be saved.
pub async fn decrement(
    dir: &Path,
    config: &CartConfig,
    id: &ProductId,
) -> Result<CartSnapshot, CommandError> {
    mutate(dir, config, |cart| cart.decrement(id)).await
}

/// Empty the cart.
///
/// # Errors
///
/// Returns an error if the cart could not be saved.
pub async fn clear(dir: &Path, config: &CartConfig) -> Result<CartSnapshot, CommandError> {
    mutate(dir, config, Cart::clear).await
}
