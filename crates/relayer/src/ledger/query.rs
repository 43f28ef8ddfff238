//! Structured table queries against the indexing endpoint.
//!
//! The node exposes `circles_query`, a JSON-RPC method that selects columns
//! from an indexed event table with simple predicates. Responses are
//! `{ columns: [...], rows: [[...]] }`; cells are located by column name,
//! never by position.

use alloy::primitives::{Address, B256};
use backing_core::{
    parse_address, BackingEvent, BlockRange, CoreError, BACKING_COMPLETED_TABLE, QUERY_METHOD,
    QUERY_NAMESPACE,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::error::LedgerError;

/// Column holding the backer address.
pub const COLUMN_BACKER: &str = "backer";
/// Column holding the backing instance address.
pub const COLUMN_INSTANCE: &str = "circlesBackingInstance";
/// Column holding the block number.
pub const COLUMN_BLOCK_NUMBER: &str = "blockNumber";
/// Column holding the transaction hash.
pub const COLUMN_TX_HASH: &str = "transactionHash";
/// Column holding the emitting contract.
pub const COLUMN_EMITTER: &str = "emitter";

/// Predicate comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FilterType {
    /// `column == value`
    Equals,
    /// `column >= value`
    GreaterThanOrEqual,
    /// `column <= value`
    LessThanOrEqual,
}

/// Single column predicate. Multiple predicates are combined with AND.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct FilterPredicate {
    #[serde(rename = "Type")]
    kind: &'static str,
    column: String,
    filter_type: FilterType,
    value: String,
}

impl FilterPredicate {
    /// Build a predicate on `column`.
    pub fn new(column: &str, filter_type: FilterType, value: impl Into<String>) -> Self {
        Self {
            kind: "FilterPredicate",
            column: column.to_string(),
            filter_type,
            value: value.into(),
        }
    }
}

/// Parameters of a `circles_query` call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct TableQuery {
    namespace: String,
    table: String,
    columns: Vec<String>,
    filter: Vec<FilterPredicate>,
    order: Vec<Value>,
    limit: u32,
}

impl TableQuery {
    /// Query for `CirclesBackingCompleted` rows emitted by `emitter`.
    ///
    /// With a range, only rows whose block lies inside it are selected.
    pub fn backing_completed(emitter: Address, range: Option<BlockRange>, limit: u32) -> Self {
        let mut filter = vec![FilterPredicate::new(
            COLUMN_EMITTER,
            FilterType::Equals,
            alloy::hex::encode_prefixed(emitter),
        )];

        if let Some(range) = range {
            filter.push(FilterPredicate::new(
                COLUMN_BLOCK_NUMBER,
                FilterType::GreaterThanOrEqual,
                range.from().to_string(),
            ));
            filter.push(FilterPredicate::new(
                COLUMN_BLOCK_NUMBER,
                FilterType::LessThanOrEqual,
                range.to().to_string(),
            ));
        }

        Self {
            namespace: QUERY_NAMESPACE.to_string(),
            table: BACKING_COMPLETED_TABLE.to_string(),
            columns: [
                COLUMN_BACKER,
                COLUMN_INSTANCE,
                COLUMN_BLOCK_NUMBER,
                COLUMN_TX_HASH,
            ]
            .iter()
            .map(|c| c.to_string())
            .collect(),
            filter,
            order: Vec::new(),
            limit,
        }
    }
}

/// JSON-RPC 2.0 request envelope.
#[derive(Debug, Serialize)]
pub struct JsonRpcRequest<'a, P> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: P,
}

impl<'a> JsonRpcRequest<'a, [TableQuery; 1]> {
    /// Wrap a table query in a `circles_query` request.
    pub fn circles_query(id: u64, query: TableQuery) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            method: QUERY_METHOD,
            params: [query],
        }
    }
}

/// JSON-RPC error object.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcErrorObject {
    /// Error code
    pub code: i64,
    /// Error message
    pub message: String,
}

/// JSON-RPC 2.0 response envelope.
#[derive(Debug, Deserialize)]
pub struct JsonRpcResponse<R> {
    /// Present on success
    pub result: Option<R>,
    /// Present on failure
    pub error: Option<JsonRpcErrorObject>,
}

impl<R> JsonRpcResponse<R> {
    /// Unwrap the envelope, mapping an error object to [`LedgerError::Rpc`].
    pub fn into_result(self) -> Result<Option<R>, LedgerError> {
        match self.error {
            Some(err) => Err(LedgerError::Rpc {
                code: err.code,
                message: err.message,
            }),
            None => Ok(self.result),
        }
    }
}

/// Tabular result of a `circles_query` call.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QueryResult {
    /// Column names, in row order
    #[serde(default)]
    pub columns: Vec<String>,
    /// Rows of cells
    #[serde(default)]
    pub rows: Vec<Vec<Value>>,
}

struct BackingColumns {
    backer: usize,
    instance: usize,
    block_number: usize,
    tx_hash: usize,
}

impl QueryResult {
    fn column(&self, name: &str) -> Result<usize, LedgerError> {
        self.columns
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| LedgerError::MalformedResponse(format!("missing column '{}'", name)))
    }

    /// Convert rows into backing events.
    ///
    /// A missing column fails the whole result. A row with an unreadable cell
    /// is skipped with a warning and the rest are still returned.
    pub fn into_backing_events(self) -> Result<Vec<BackingEvent>, LedgerError> {
        if self.rows.is_empty() {
            return Ok(Vec::new());
        }

        let columns = BackingColumns {
            backer: self.column(COLUMN_BACKER)?,
            instance: self.column(COLUMN_INSTANCE)?,
            block_number: self.column(COLUMN_BLOCK_NUMBER)?,
            tx_hash: self.column(COLUMN_TX_HASH)?,
        };

        let mut events = Vec::with_capacity(self.rows.len());
        for (index, row) in self.rows.iter().enumerate() {
            match parse_row(row, &columns) {
                Ok(event) => events.push(event),
                Err(e) => warn!("Skipping backing row {}: {}", index, e),
            }
        }

        Ok(events)
    }
}

fn parse_row(row: &[Value], columns: &BackingColumns) -> Result<BackingEvent, CoreError> {
    let cell = |idx: usize| row.get(idx).unwrap_or(&Value::Null);

    let backer = parse_address(cell_str(cell(columns.backer)).unwrap_or_default())?;
    let instance = parse_address(cell_str(cell(columns.instance)).unwrap_or_default())?;
    let block_number = parse_block_number(cell(columns.block_number))?;
    let tx_hash = parse_tx_hash(cell(columns.tx_hash))?;

    Ok(BackingEvent::new(backer, instance, block_number, tx_hash))
}

fn cell_str(value: &Value) -> Option<&str> {
    value.as_str()
}

/// Block numbers arrive as JSON numbers, decimal strings or 0x-hex strings.
fn parse_block_number(value: &Value) -> Result<u64, CoreError> {
    let invalid = || CoreError::InvalidBlockNumber(value.to_string());
    match value {
        Value::Number(n) => n.as_u64().ok_or_else(invalid),
        Value::String(s) => {
            let s = s.trim();
            match s.strip_prefix("0x") {
                Some(hex) => u64::from_str_radix(hex, 16).map_err(|_| invalid()),
                None => s.parse().map_err(|_| invalid()),
            }
        }
        _ => Err(invalid()),
    }
}

fn parse_tx_hash(value: &Value) -> Result<B256, CoreError> {
    let raw = cell_str(value).unwrap_or_default();
    raw.trim()
        .to_ascii_lowercase()
        .parse::<B256>()
        .map_err(|_| CoreError::InvalidTxHash(raw.to_string()))
}
