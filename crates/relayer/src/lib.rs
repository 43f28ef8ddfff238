//! Backing-completed relayer.
//!
//! This crate provides:
//! - A ledger client that queries `CirclesBackingCompleted` rows and submits transactions
//! - A screening client that filters out bot or blocked backers
//! - A trust batch submitter for the group contract
//! - The event processor tying them together in a poll loop
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  backing-relayer                        │
//! │                                         │
//! │  ┌──────────────────┐                   │
//! │  │ Event Processor  │ ← poll interval   │
//! │  └──┬─────┬─────┬───┘                   │
//! │     │     │     │                       │
//! │     ▼     │     ▼                       │
//! │  Ledger   │   Submitter ──► BaseGroup   │
//! │  Client   │   trustBatchWithConditions  │
//! │  (query)  ▼                             │
//! │        Screening ──► bot-analytics/     │
//! │        Client         classify          │
//! └─────────────────────────────────────────┘
//! ```
//!
//! One cycle at a time: height, fetch, dedup, screen, trust, mark processed.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod dedup;
pub mod error;
pub mod ledger;
pub mod processor;
pub mod screening;
pub mod submitter;

pub use config::Config;
pub use dedup::EventDeduplicator;
pub use error::{LedgerError, ScreeningError, SubmitError};
pub use ledger::{BackingSource, LedgerClient};
pub use processor::{BackingEventProcessor, CycleOutcome, ProcessorOptions};
pub use screening::{Screener, ScreeningClient};
pub use submitter::{TrustBatchSubmitter, TrustGranter};

pub use backing_core::{
    constants, parse_address, unique_in_order, Address, BackingEvent, BlockRange, CoreError,
    EventId, TrustReceipt, B256, U96,
};
