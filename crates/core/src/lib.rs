//! # Backing Core
//!
//! Core types, constants and address helpers for the backing trust relayer.
//!
//! This crate holds the pieces every relayer component agrees on: how a
//! backing event is identified, which contract emits it, where indexing
//! starts, and the fixed parameters of the trust-batch transaction.
//!
//! ## Features
//!
//! - **Ethereum Types**: Uses Alloy primitives for Address, B256 and U96
//! - **Domain Types**: BackingEvent, EventId, BlockRange, TrustReceipt
//! - **Constants**: Deployment block, emitter address, gas limit, expiry sentinel
//! - **Addresses**: Lenient parsing and order-preserving deduplication

#![warn(missing_docs)]

pub mod address;
pub mod constants;
pub mod error;
pub mod types;

// Re-export commonly used items
pub use address::{parse_address, unique_in_order};
pub use constants::*;
pub use error::{CoreError, Result};
pub use types::*;

// Re-export Alloy primitives for convenience
pub use alloy_primitives::{aliases::U96, Address, B256};
