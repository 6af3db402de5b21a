//! Core types for Go Market.
//!
//! This module provides type-safe wrappers for the cart domain.

pub mod cart;
pub mod id;
pub mod price;

pub use cart::{CartItem, CartSnapshot, NewCartItem};
pub use id::{ProductId, ProductIdError};
pub use price::{Price, PriceError};
