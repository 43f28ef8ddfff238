//! Trust batch submitter.
//!
//! Grants group trust to a batch of addresses with a single
//! `trustBatchWithConditions` call on the group contract.

use alloy::network::TransactionBuilder;
use alloy::primitives::{aliases::U96, Address};
use alloy::rpc::types::TransactionRequest;
use alloy::signers::local::PrivateKeySigner;
use alloy::sol;
use alloy::sol_types::SolCall;
use anyhow::{Context, Result};
use async_trait::async_trait;
use backing_core::{unique_in_order, TrustReceipt, TRUST_EXPIRY_NEVER};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::SubmitError;
use crate::ledger::LedgerClient;

// Generate the group contract call binding
sol! {
    #[allow(missing_docs)]
    contract BaseGroup {
        function trustBatchWithConditions(address[] memory _members, uint96 _expiry) external;
    }
}

/// Grants trust to a batch of addresses.
#[async_trait]
pub trait TrustGranter: Send + Sync {
    /// Submit one trust transaction for `addresses` and wait for it.
    ///
    /// Rejects an empty batch with [`SubmitError::EmptyBatch`] and a
    /// non-success receipt with [`SubmitError::Reverted`].
    async fn trust_batch(&self, addresses: &[Address]) -> Result<TrustReceipt, SubmitError>;
}

#[async_trait]
impl<T: TrustGranter + ?Sized> TrustGranter for Arc<T> {
    async fn trust_batch(&self, addresses: &[Address]) -> Result<TrustReceipt, SubmitError> {
        (**self).trust_batch(addresses).await
    }
}

/// ABI-encoded `trustBatchWithConditions(members, expiry)` call data.
pub fn encode_trust_batch(members: Vec<Address>, expiry: U96) -> Vec<u8> {
    BaseGroup::trustBatchWithConditionsCall {
        _members: members,
        _expiry: expiry,
    }
    .abi_encode()
}

/// Unsigned trust batch transaction with a fixed gas limit and legacy gas price.
pub fn build_trust_batch_tx(
    base_group: Address,
    members: Vec<Address>,
    gas_limit: u64,
    gas_price: u128,
) -> TransactionRequest {
    TransactionRequest::default()
        .with_to(base_group)
        .with_input(encode_trust_batch(members, TRUST_EXPIRY_NEVER))
        .with_gas_limit(gas_limit)
        .with_gas_price(gas_price)
}

/// Signs and submits trust batches through the ledger client.
pub struct TrustBatchSubmitter {
    ledger: Arc<LedgerClient>,
    signer: PrivateKeySigner,
    base_group: Address,
    gas_limit: u64,
    confirmation_timeout: Duration,
}

impl TrustBatchSubmitter {
    /// Create a submitter from the configured key and group contract.
    pub fn new(ledger: Arc<LedgerClient>, config: &Config) -> Result<Self> {
        let signer = config
            .submitter
            .private_key
            .trim_start_matches("0x")
            .parse::<PrivateKeySigner>()
            .context("Failed to parse submitter private key")?;

        info!(
            "Trust batch submitter ready: group={} signer={}",
            config.contracts.base_group,
            signer.address()
        );

        Ok(Self {
            ledger,
            signer,
            base_group: config.contracts.base_group,
            gas_limit: config.submitter.gas_limit,
            confirmation_timeout: config.submitter.confirmation_timeout(),
        })
    }

    /// Address transactions are sent from.
    pub fn signer_address(&self) -> Address {
        self.signer.address()
    }
}

#[async_trait]
impl TrustGranter for TrustBatchSubmitter {
    async fn trust_batch(&self, addresses: &[Address]) -> Result<TrustReceipt, SubmitError> {
        if addresses.is_empty() {
            return Err(SubmitError::EmptyBatch);
        }

        let members = unique_in_order(addresses.iter().copied());
        let member_count = members.len();

        let gas_price = self.ledger.gas_price().await?;
        let tx = build_trust_batch_tx(self.base_group, members, self.gas_limit, gas_price);

        info!(
            "Sending trust batch transaction for {} addresses...",
            member_count
        );

        let receipt = self
            .ledger
            .submit_signed_transaction(tx, &self.signer, self.confirmation_timeout)
            .await?;

        ensure_confirmed(receipt)
    }
}

/// Pass a successful receipt through; turn any other status into
/// [`SubmitError::Reverted`].
pub fn ensure_confirmed(receipt: TrustReceipt) -> Result<TrustReceipt, SubmitError> {
    if !receipt.is_success() {
        warn!(
            "Transaction reverted: 0x{} in block {}",
            hex::encode(receipt.transaction_hash),
            receipt.block_number
        );
        return Err(SubmitError::Reverted {
            tx_hash: receipt.transaction_hash,
            block_number: receipt.block_number,
        });
    }

    info!("Transaction confirmed in block {}", receipt.block_number);
    Ok(receipt)
}
