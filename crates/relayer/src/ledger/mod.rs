//! Ledger access: block height, backing event queries and transaction submission.
//!
//! This module provides:
//! - `circles_query` request/response types and row parsing
//! - RPC client wrapper for the node
//! - The [`BackingSource`] seam the event processor polls through

pub mod client;
pub mod query;

use async_trait::async_trait;
use backing_core::{BackingEvent, BlockRange};
use std::sync::Arc;

use crate::error::LedgerError;

pub use client::LedgerClient;
pub use query::{QueryResult, TableQuery};

/// Where the event processor reads chain progress and backing events from.
#[async_trait]
pub trait BackingSource: Send + Sync {
    /// Latest block number of the chain.
    async fn current_block_height(&self) -> Result<u64, LedgerError>;

    /// Backing events for `range`.
    ///
    /// Never fails: transport and parse failures are logged and reported as
    /// "no events this cycle".
    async fn fetch_backing_events(&self, range: BlockRange) -> Vec<BackingEvent>;
}

#[async_trait]
impl<T: BackingSource + ?Sized> BackingSource for Arc<T> {
    async fn current_block_height(&self) -> Result<u64, LedgerError> {
        (**self).current_block_height().await
    }

    async fn fetch_backing_events(&self, range: BlockRange) -> Vec<BackingEvent> {
        (**self).fetch_backing_events(range).await
    }
}
