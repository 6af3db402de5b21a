//! Error types for the cart store.
//!
//! Cart operations themselves only fail on misuse. Storage problems never
//! reach the caller of an operation: hydration failures are logged and the
//! cart starts empty, and write failures are logged and reported through the
//! operation's [`PersistReceipt`](crate::PersistReceipt).

use thiserror::Error;

use crate::storage::StorageError;

/// Errors returned synchronously by cart operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CartError {
    /// The cart was used without an active store behind it, either because the
    /// store was disposed or because it was dropped.
    #[error("cart used outside of an active CartStore")]
    ContextMisuse,
}

/// A snapshot could not be written to storage.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PersistError {
    /// The snapshot could not be encoded.
    #[error("failed to serialize cart: {0}")]
    Serialize(String),

    /// Storage rejected every attempt.
    #[error("storage write failed after {attempts} attempt(s): {message}")]
    Storage {
        /// Attempts made, including the first.
        attempts: u32,
        /// Last error reported by storage.
        message: String,
    },

    /// The writer stopped before reporting a result.
    #[error("persistence writer is closed")]
    WriterClosed,
}

/// The stored cart could not be loaded.
#[derive(Debug, Error)]
pub enum HydrationError {
    /// Storage read failed.
    #[error("failed to read stored cart: {0}")]
    Storage(#[from] StorageError),

    /// The stored value is not a valid cart.
    #[error("stored cart is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
}
