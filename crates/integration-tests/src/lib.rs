//! Integration tests for the Go Market cart.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p go-market-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `cart_properties` - Behaviour of the public cart operations
//! - `persistence` - Storage round trips, failures, and file-backed carts
//!
//! This library holds the fixtures those tests share.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use go_market_cart::{
    CartConfig, CartStore, DEFAULT_STORAGE_KEY, KeyValueStorage, MemoryStorage, StorageError,
};
use go_market_core::{CartSnapshot, NewCartItem, Price, ProductId};

/// A product payload with a price in cents.
#[must_use]
pub fn product(id: &str, title: &str, cents: i64) -> NewCartItem {
    NewCartItem {
        id: ProductId::new(id),
        title: title.to_string(),
        image_url: "u".to_string(),
        price: Price::from_cents(cents),
    }
}

/// Start a store over `storage` with default configuration and wait for it to
/// finish loading.
pub async fn ready_store<S>(storage: &Arc<S>) -> CartStore
where
    S: KeyValueStorage + 'static,
{
    let store = CartStore::start(Arc::clone(storage), &CartConfig::default());
    store.ready().await;
    store
}

/// Storage pre-populated with a raw cart value under the default key.
#[must_use]
pub fn storage_with(raw: &str) -> Arc<MemoryStorage> {
    Arc::new(MemoryStorage::with_entry(DEFAULT_STORAGE_KEY, raw))
}

/// Decode whatever is stored under the default key.
///
/// # Errors
///
/// Returns an error if storage fails, nothing is stored, or the value does
/// not decode.
pub async fn stored_cart(
    storage: &dyn KeyValueStorage,
) -> Result<CartSnapshot, Box<dyn std::error::Error>> {
    let raw = storage
        .get(DEFAULT_STORAGE_KEY)
        .await?
        .ok_or("nothing stored")?;
    Ok(serde_json::from_str(&raw)?)
}

/// Storage that counts writes and can be told to fail the first N of them.
#[derive(Debug, Default)]
pub struct CountingStorage {
    inner: MemoryStorage,
    writes: AtomicU32,
    fail_first: u32,
}

impl CountingStorage {
    /// Storage that never fails.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage whose first `n` writes fail.
    #[must_use]
    pub fn failing_first(n: u32) -> Self {
        Self {
            fail_first: n,
            ..Self::default()
        }
    }

    /// Write attempts so far, failed ones included.
    #[must_use]
    pub fn writes(&self) -> u32 {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl KeyValueStorage for CountingStorage {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let attempt = self.writes.fetch_add(1, Ordering::SeqCst);
        if attempt < self.fail_first {
            return Err(StorageError::Backend("quota exceeded".to_string()));
        }
        self.inner.set(key, value).await
    }
}
