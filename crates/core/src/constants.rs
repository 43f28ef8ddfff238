//! Fixed protocol constants for the backing relayer.
//!
//! These values are properties of the deployed contracts and the indexing
//! endpoint, not operator preferences. Operator-tunable values live in the
//! relayer configuration and default to the constants below.

use alloy_primitives::{address, aliases::U96, Address};

/// Block in which the backing contract was deployed. Indexing never starts earlier.
pub const DEPLOYMENT_BLOCK: u64 = 39_741_602;

/// Contract that emits `CirclesBackingCompleted`.
pub const BACKING_EMITTER: Address = address!("eced91232c609a42f6016860e8223b8aecaa7bd0");

/// How many blocks behind the head a fresh process starts scanning.
pub const BACKFILL_WINDOW: u64 = 1_000;

/// Row cap sent with every structured query.
pub const QUERY_ROW_LIMIT: u32 = 1_000;

/// Namespace of the backing table on the indexing endpoint.
pub const QUERY_NAMESPACE: &str = "CrcV2";

/// Table holding `CirclesBackingCompleted` rows.
pub const BACKING_COMPLETED_TABLE: &str = "CirclesBackingCompleted";

/// JSON-RPC method of the structured query endpoint.
pub const QUERY_METHOD: &str = "circles_query";

/// Gas limit of a trust-batch transaction.
pub const TRUST_BATCH_GAS_LIMIT: u64 = 1_000_000;

/// Expiry passed with every trust grant: `2^96 - 1`, i.e. never.
pub const TRUST_EXPIRY_NEVER: U96 = U96::MAX;

/// Seconds between poll cycles.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 15;
