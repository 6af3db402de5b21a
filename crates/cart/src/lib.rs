//! Go Market Cart - Shopping cart state container.
//!
//! Holds the cart for one app session, publishes every change to subscribers,
//! and keeps a copy in key-value storage so the cart survives restarts.
//!
//! # Architecture
//!
//! - [`CartStore`] owns the state and is created explicitly; there is no
//!   global cart. Consumers get [`Cart`] handles from it.
//! - Every operation computes the next [`CartSnapshot`], publishes it on a
//!   `tokio::sync::watch` channel, and queues that same snapshot for writing.
//! - One background task reads the stored cart at startup and then performs
//!   all writes in commit order, retrying failed writes before reporting them.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use go_market_cart::{CartConfig, CartStore, MemoryStorage};
//! use go_market_core::{NewCartItem, Price, ProductId};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = CartStore::start(Arc::new(MemoryStorage::new()), &CartConfig::default());
//! let cart = store.cart();
//!
//! cart.add_to_cart(NewCartItem {
//!     id: ProductId::new("1"),
//!     title: "Pineapple".to_string(),
//!     image_url: "https://cdn.example.com/pineapple.png".to_string(),
//!     price: Price::from_cents(499),
//! })?;
//!
//! // Wait for the write only when durability matters.
//! cart.increment(&ProductId::new("1"))?.wait().await?;
//! assert_eq!(cart.products()?.item_count(), 2);
//!
//! store.dispose().await;
//! # Ok(())
//! # }
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod error;
pub mod persistence;
pub mod storage;
pub mod store;

pub use config::{CartConfig, ConfigError, DEFAULT_STORAGE_KEY};
pub use error::{CartError, HydrationError, PersistError};
pub use persistence::{PersistOutcome, PersistReceipt};
pub use storage::{FileStorage, KeyValueStorage, MemoryStorage, StorageError};
pub use store::{Cart, CartStore, StoreStatus};
