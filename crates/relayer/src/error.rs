//! Error kinds for the relayer components.
//!
//! Each external boundary has its own error type so the orchestrator can tell
//! a transient transport failure from a malformed payload or a reverted
//! transaction. Process-level glue uses `anyhow` on top of these.

use alloy::primitives::B256;
use std::time::Duration;
use thiserror::Error;

/// Failures talking to the ledger node or its indexing endpoint.
#[derive(Error, Debug)]
pub enum LedgerError {
    /// Node unreachable while constructing the client.
    #[error("Ledger node unreachable at {url}: {reason}")]
    Connection {
        /// RPC endpoint that was tried
        url: String,
        /// Underlying failure
        reason: String,
    },

    /// HTTP or JSON-RPC transport failure.
    #[error("Ledger transport error: {0}")]
    Transport(String),

    /// The endpoint answered with a JSON-RPC error object.
    #[error("Ledger RPC error {code}: {message}")]
    Rpc {
        /// JSON-RPC error code
        code: i64,
        /// JSON-RPC error message
        message: String,
    },

    /// The endpoint answered with a payload of the wrong shape.
    #[error("Malformed ledger response: {0}")]
    MalformedResponse(String),

    /// Building, signing or broadcasting a transaction failed.
    #[error("Transaction failed: {0}")]
    Transaction(String),

    /// No receipt arrived before the confirmation deadline.
    #[error("Transaction 0x{} not confirmed within {:?}", hex::encode(.tx_hash), .timeout)]
    ConfirmationTimeout {
        /// Hash of the broadcast transaction
        tx_hash: B256,
        /// Deadline that elapsed
        timeout: Duration,
    },
}

impl From<reqwest::Error> for LedgerError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            LedgerError::MalformedResponse(err.to_string())
        } else {
            LedgerError::Transport(err.to_string())
        }
    }
}

/// Failures talking to the screening service.
#[derive(Error, Debug)]
pub enum ScreeningError {
    /// Request could not be sent or the connection failed.
    #[error("Screening request failed: {0}")]
    Request(String),

    /// The service answered with a non-success HTTP status.
    #[error("Screening service returned HTTP {0}")]
    Status(u16),

    /// The service answered with a payload of the wrong shape.
    #[error("Malformed screening response: {0}")]
    MalformedResponse(String),
}

impl From<reqwest::Error> for ScreeningError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            ScreeningError::Status(status.as_u16())
        } else if err.is_decode() {
            ScreeningError::MalformedResponse(err.to_string())
        } else {
            ScreeningError::Request(err.to_string())
        }
    }
}

/// Failures submitting a trust batch.
#[derive(Error, Debug)]
pub enum SubmitError {
    /// Called with no addresses; nothing was built.
    #[error("No addresses provided for trust batch")]
    EmptyBatch,

    /// Transaction mined but reverted (receipt status != 1).
    #[error("Trust batch 0x{} reverted in block {}", hex::encode(.tx_hash), .block_number)]
    Reverted {
        /// Hash of the reverted transaction
        tx_hash: B256,
        /// Block the transaction was mined in
        block_number: u64,
    },

    /// Signing, broadcast or confirmation failed.
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

impl SubmitError {
    /// Whether the failure is an input error rather than a chain/transport one.
    pub fn is_input_error(&self) -> bool {
        matches!(self, SubmitError::EmptyBatch)
    }
}
