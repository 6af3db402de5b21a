//! Go Market Core - Cart domain types.
//!
//! This crate provides the types shared by the cart store and its consumers:
//! - `cart` - Cart state container with storage persistence
//! - `cli` - Command-line driver for a file-backed cart
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no storage
//! access, no async runtime. Every cart mutation is expressed here as a
//! function from one [`CartSnapshot`] to the next, which keeps the store a thin
//! layer of publishing and persistence around it.
//!
//! # Modules
//!
//! - [`types`] - Product IDs, prices, cart items and snapshots

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
