//! Key-value storage the cart is persisted to.
//!
//! The cart only ever needs two calls: read a whole value by key, and
//! overwrite a whole value by key. Backends:
//!
//! - [`MemoryStorage`] - in-process map, used by tests and embedders
//! - [`FileStorage`] - one file per key under a directory, used by the CLI

mod file;
mod memory;

pub use file::FileStorage;
pub use memory::MemoryStorage;

use async_trait::async_trait;
use thiserror::Error;

/// Errors a storage backend can report.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Filesystem operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Backend-specific failure.
    #[error("Storage backend error: {0}")]
    Backend(String),
}

/// Asynchronous string key-value storage.
///
/// Writes replace the whole value; there are no partial updates.
#[async_trait]
pub trait KeyValueStorage: Send + Sync {
    /// Read the value stored under `key`.
    ///
    /// Returns `Ok(None)` if the key has never been written.
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Store `value` under `key`, replacing any previous value.
    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
}
