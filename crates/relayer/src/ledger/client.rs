//! RPC client wrapper for the ledger node.

use alloy::network::{EthereumWallet, TransactionBuilder};
use alloy::primitives::Address;
use alloy::providers::{Provider, ProviderBuilder, RootProvider};
use alloy::rpc::types::TransactionRequest;
use alloy::signers::local::PrivateKeySigner;
use alloy::transports::http::{Client, Http};
use async_trait::async_trait;
use backing_core::{BackingEvent, BlockRange, TrustReceipt};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::query::{JsonRpcRequest, JsonRpcResponse, QueryResult, TableQuery};
use super::BackingSource;
use crate::config::Config;
use crate::error::LedgerError;

/// HTTP client for the ledger node.
///
/// Standard `eth_*` calls go through an Alloy provider; `circles_query`
/// is posted directly since it is not part of the Ethereum namespace.
pub struct LedgerClient {
    provider: RootProvider<Http<Client>>,
    http: reqwest::Client,
    rpc_url: String,
    chain_id: u64,
    emitter: Address,
    query_limit: u32,
    filter_block_range: bool,
    next_request_id: AtomicU64,
}

impl LedgerClient {
    /// Connect to the node.
    ///
    /// Fails with [`LedgerError::Connection`] if the node cannot be reached,
    /// so a misconfigured process never enters the poll loop.
    pub async fn connect(config: &Config) -> Result<Self, LedgerError> {
        let rpc_url = config.network.rpc_url.trim().to_string();
        let connection_error = |reason: String| LedgerError::Connection {
            url: rpc_url.clone(),
            reason,
        };

        let url = rpc_url
            .parse()
            .map_err(|e| connection_error(format!("invalid URL: {}", e)))?;
        let provider = ProviderBuilder::new().on_http(url);

        let chain_id = provider
            .get_chain_id()
            .await
            .map_err(|e| connection_error(e.to_string()))?;

        let http = reqwest::Client::builder()
            .user_agent("backing-relayer/ledger")
            .build()
            .map_err(|e| connection_error(e.to_string()))?;

        info!("Connected to ledger node (chain id {})", chain_id);

        Ok(Self {
            provider,
            http,
            rpc_url,
            chain_id,
            emitter: config.contracts.backing_emitter,
            query_limit: config.sync.query_limit,
            filter_block_range: config.sync.filter_block_range,
            next_request_id: AtomicU64::new(1),
        })
    }

    /// Chain id reported by the node at connect time.
    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    /// Get the latest block number.
    pub async fn current_block_height(&self) -> Result<u64, LedgerError> {
        self.provider
            .get_block_number()
            .await
            .map_err(|e| LedgerError::Transport(format!("Failed to get block number: {}", e)))
    }

    /// Current suggested legacy gas price, in wei.
    pub async fn gas_price(&self) -> Result<u128, LedgerError> {
        self.provider
            .get_gas_price()
            .await
            .map_err(|e| LedgerError::Transport(format!("Failed to get gas price: {}", e)))
    }

    /// Run the backing query, surfacing every failure.
    pub async fn query_backing_events(
        &self,
        range: Option<BlockRange>,
    ) -> Result<Vec<BackingEvent>, LedgerError> {
        let query = TableQuery::backing_completed(self.emitter, range, self.query_limit);
        let id = self.next_request_id.fetch_add(1, Ordering::Relaxed);
        post_table_query(&self.http, &self.rpc_url, id, query).await
    }

    /// Sign `tx` with `signer`, broadcast it and wait for its receipt.
    ///
    /// Sender, nonce and chain id are filled here; gas and call data are the
    /// caller's. The wait is bounded by `timeout`.
    pub async fn submit_signed_transaction(
        &self,
        tx: TransactionRequest,
        signer: &PrivateKeySigner,
        timeout: Duration,
    ) -> Result<TrustReceipt, LedgerError> {
        let from = signer.address();
        let nonce = self
            .provider
            .get_transaction_count(from)
            .await
            .map_err(|e| LedgerError::Transaction(format!("Failed to get nonce: {}", e)))?;

        let tx = tx
            .with_from(from)
            .with_nonce(nonce)
            .with_chain_id(self.chain_id);

        let wallet = EthereumWallet::from(signer.clone());
        let envelope = tx
            .build(&wallet)
            .await
            .map_err(|e| LedgerError::Transaction(format!("Failed to sign transaction: {}", e)))?;

        let pending = self
            .provider
            .send_tx_envelope(envelope)
            .await
            .map_err(|e| LedgerError::Transaction(format!("Failed to broadcast transaction: {}", e)))?;

        let tx_hash = *pending.tx_hash();
        info!("Transaction sent: 0x{}", hex::encode(tx_hash));

        let receipt = match tokio::time::timeout(timeout, pending.get_receipt()).await {
            Ok(result) => result.map_err(|e| {
                LedgerError::Transaction(format!("Failed to get transaction receipt: {}", e))
            })?,
            Err(_) => return Err(LedgerError::ConfirmationTimeout { tx_hash, timeout }),
        };

        let block_number = receipt.block_number.ok_or_else(|| {
            LedgerError::MalformedResponse("Transaction receipt missing block number".to_string())
        })?;

        Ok(TrustReceipt {
            transaction_hash: receipt.transaction_hash,
            block_number,
            status: u8::from(receipt.status()),
        })
    }
}

#[async_trait]
impl BackingSource for LedgerClient {
    async fn current_block_height(&self) -> Result<u64, LedgerError> {
        LedgerClient::current_block_height(self).await
    }

    async fn fetch_backing_events(&self, range: BlockRange) -> Vec<BackingEvent> {
        let filter = self.filter_block_range.then_some(range);
        match self.query_backing_events(filter).await {
            Ok(events) => {
                debug!("Query returned {} backing events for {}", events.len(), range);
                events
            }
            Err(e) => {
                warn!("Error fetching backing events for {}: {}", range, e);
                Vec::new()
            }
        }
    }
}

/// Post a `circles_query` request and parse the rows into events.
pub async fn post_table_query(
    http: &reqwest::Client,
    rpc_url: &str,
    id: u64,
    query: TableQuery,
) -> Result<Vec<BackingEvent>, LedgerError> {
    let request = JsonRpcRequest::circles_query(id, query);

    let response: JsonRpcResponse<QueryResult> = http
        .post(rpc_url)
        .json(&request)
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;

    match response.into_result()? {
        Some(result) => result.into_backing_events(),
        None => Ok(Vec::new()),
    }
}
