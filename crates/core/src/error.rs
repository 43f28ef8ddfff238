//! Error types for the core crate.

use thiserror::Error;

/// Core error type.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// Invalid address format.
    #[error("Invalid address: {0:?}")]
    InvalidAddress(String),

    /// Invalid transaction hash format.
    #[error("Invalid transaction hash: {0:?}")]
    InvalidTxHash(String),

    /// Invalid block number.
    #[error("Invalid block number: {0}")]
    InvalidBlockNumber(String),

    /// Block range whose lower bound exceeds its upper bound.
    #[error("Invalid block range: {from} > {to}")]
    InvalidRange {
        /// Lower bound
        from: u64,
        /// Upper bound
        to: u64,
    },
}

/// Result type alias for CoreError.
pub type Result<T> = std::result::Result<T, CoreError>;
