//! Mock ledger node and screening service for integration tests.

#![allow(dead_code)]

use alloy::primitives::keccak256;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use backing_relayer::config::Config;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

/// Test signing key (anvil account #0).
pub const TEST_KEY: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

/// Serve `app` on an ephemeral localhost port and return its base URL.
pub async fn spawn(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral port");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("mock server");
    });
    format!("http://{}", addr)
}

/// How the mock node answers `circles_query`.
#[derive(Clone)]
pub enum QueryReply {
    /// `{ columns, rows }` result
    Rows(Value),
    /// JSON-RPC error object
    Error { code: i64, message: String },
    /// HTTP 200 with a body that is not JSON
    Garbage,
}

/// Nonce the mock node reports for every account.
pub const NODE_NONCE: u64 = 7;
/// Block the mock node mines every transaction in.
pub const RECEIPT_BLOCK: u64 = 1011;

/// Shared state of the mock node.
pub struct NodeState {
    pub chain_id: u64,
    pub head: Mutex<u64>,
    pub query: Mutex<QueryReply>,
    /// Receipt status for broadcast transactions; `None` never mines them
    pub receipt_status: Mutex<Option<u8>>,
    pub raw_transactions: Mutex<Vec<Vec<u8>>>,
    pub requests: Mutex<Vec<Value>>,
}

impl NodeState {
    pub fn new(chain_id: u64, head: u64, query: QueryReply) -> Arc<Self> {
        Arc::new(Self {
            chain_id,
            head: Mutex::new(head),
            query: Mutex::new(query),
            receipt_status: Mutex::new(Some(1)),
            raw_transactions: Mutex::new(Vec::new()),
            requests: Mutex::new(Vec::new()),
        })
    }

    /// Params of every request for `method`.
    pub fn params_of(&self, method: &str) -> Vec<Value> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r["method"] == method)
            .map(|r| r["params"].clone())
            .collect()
    }

    /// Methods of every request received so far, in order.
    pub fn methods(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter_map(|r| r["method"].as_str().map(str::to_string))
            .collect()
    }

    /// Params of every `circles_query` request received so far.
    pub fn queries(&self) -> Vec<Value> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r["method"] == "circles_query")
            .map(|r| r["params"][0].clone())
            .collect()
    }
}

async fn node_handler(
    State(state): State<Arc<NodeState>>,
    Json(request): Json<Value>,
) -> Response {
    state.requests.lock().unwrap().push(request.clone());
    let id = request["id"].clone();

    let reply = match request["method"].as_str().unwrap_or_default() {
        "eth_chainId" => json!({"jsonrpc": "2.0", "id": id, "result": format!("{:#x}", state.chain_id)}),
        "eth_blockNumber" => {
            let head = *state.head.lock().unwrap();
            json!({"jsonrpc": "2.0", "id": id, "result": format!("{:#x}", head)})
        }
        "eth_gasPrice" => json!({"jsonrpc": "2.0", "id": id, "result": "0x3b9aca00"}),
        "eth_getTransactionCount" => {
            json!({"jsonrpc": "2.0", "id": id, "result": format!("{:#x}", NODE_NONCE)})
        }
        "eth_sendRawTransaction" => {
            let raw = request["params"][0].as_str().unwrap_or_default();
            let bytes = alloy::hex::decode(raw).unwrap_or_default();
            let hash = keccak256(&bytes);
            state.raw_transactions.lock().unwrap().push(bytes);
            json!({"jsonrpc": "2.0", "id": id, "result": hash})
        }
        "eth_getTransactionReceipt" => {
            let hash = request["params"][0].clone();
            let status = *state.receipt_status.lock().unwrap();
            let known = state
                .raw_transactions
                .lock()
                .unwrap()
                .iter()
                .any(|raw| json!(keccak256(raw)) == hash);
            let result = match status {
                Some(status) if known => receipt_json(&hash, status),
                _ => Value::Null,
            };
            json!({"jsonrpc": "2.0", "id": id, "result": result})
        }
        "eth_getBlockByNumber" => json!({"jsonrpc": "2.0", "id": id, "result": null}),
        "eth_newBlockFilter" => json!({"jsonrpc": "2.0", "id": id, "result": "0x1"}),
        "eth_getFilterChanges" => json!({"jsonrpc": "2.0", "id": id, "result": []}),
        "circles_query" => match state.query.lock().unwrap().clone() {
            QueryReply::Rows(result) => json!({"jsonrpc": "2.0", "id": id, "result": result}),
            QueryReply::Error { code, message } => json!({
                "jsonrpc": "2.0",
                "id": id,
                "error": {"code": code, "message": message}
            }),
            QueryReply::Garbage => return (StatusCode::OK, "<html>not json</html>").into_response(),
        },
        other => json!({
            "jsonrpc": "2.0",
            "id": id,
            "error": {"code": -32601, "message": format!("method {} not found", other)}
        }),
    };

    Json(reply).into_response()
}

/// Legacy transaction receipt mined in [`RECEIPT_BLOCK`].
fn receipt_json(hash: &Value, status: u8) -> Value {
    json!({
        "transactionHash": hash,
        "transactionIndex": "0x0",
        "blockHash": format!("0x{}", "ab".repeat(32)),
        "blockNumber": format!("{:#x}", RECEIPT_BLOCK),
        "from": "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266",
        "to": "0x1111111111111111111111111111111111111111",
        "cumulativeGasUsed": "0x5208",
        "gasUsed": "0x5208",
        "effectiveGasPrice": "0x3b9aca00",
        "contractAddress": null,
        "logs": [],
        "logsBloom": format!("0x{}", "00".repeat(256)),
        "type": "0x0",
        "status": format!("{:#x}", status)
    })
}

/// Start a mock ledger node.
pub async fn spawn_node(state: Arc<NodeState>) -> String {
    let app = Router::new()
        .route("/", post(node_handler))
        .with_state(state);
    spawn(app).await
}

/// How the mock screening service answers.
#[derive(Clone)]
pub enum ScreeningReply {
    /// Flag these lowercase hex addresses as bots, everything else clean
    Flag(Vec<String>),
    /// Respond with this HTTP status and an empty body
    Status(u16),
    /// Respond 200 with this exact body
    Raw(Value),
}

/// Shared state of the mock screening service.
pub struct ScreeningState {
    pub reply: ScreeningReply,
    pub requests: Mutex<Vec<Value>>,
}

impl ScreeningState {
    pub fn new(reply: ScreeningReply) -> Arc<Self> {
        Arc::new(Self {
            reply,
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn requests(&self) -> Vec<Value> {
        self.requests.lock().unwrap().clone()
    }
}

async fn classify_handler(
    State(state): State<Arc<ScreeningState>>,
    Json(request): Json<Value>,
) -> (StatusCode, Json<Value>) {
    state.requests.lock().unwrap().push(request.clone());

    match &state.reply {
        ScreeningReply::Flag(flagged) => {
            let verdicts: Vec<Value> = request["addresses"]
                .as_array()
                .cloned()
                .unwrap_or_default()
                .into_iter()
                .map(|a| {
                    let address = a.as_str().unwrap_or_default().to_string();
                    let is_bot = flagged.contains(&address);
                    json!({
                        "address": address,
                        "is_bot": is_bot,
                        "category": if is_bot { "flagged" } else { "clean" }
                    })
                })
                .collect();
            (StatusCode::OK, Json(json!({ "verdicts": verdicts })))
        }
        ScreeningReply::Raw(body) => (StatusCode::OK, Json(body.clone())),
        ScreeningReply::Status(code) => (
            StatusCode::from_u16(*code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            Json(json!({})),
        ),
    }
}

/// Start a mock screening service.
pub async fn spawn_screening(state: Arc<ScreeningState>) -> String {
    let app = Router::new()
        .route("/bot-analytics/classify", post(classify_handler))
        .with_state(state);
    spawn(app).await
}

/// Config pointing at the given mock endpoints.
pub fn test_config(rpc_url: &str, screening_url: &str) -> Config {
    let toml = format!(
        r#"
[network]
rpc_url = "{rpc_url}"

[contracts]
base_group = "0x1111111111111111111111111111111111111111"

[screening]
base_url = "{screening_url}"
timeout_secs = 5

[sync]
deployment_block = 1000
backfill_blocks = 100
poll_interval_secs = 1

[submitter]
private_key = "{TEST_KEY}"
confirmation_timeout_secs = 5
"#
    );
    Config::from_toml_str(&toml).expect("valid test config")
}

/// A `circles_query` result with the given `(backer, instance, block, tx)` rows.
pub fn backing_rows(rows: &[(&str, &str, u64, &str)]) -> Value {
    json!({
        "columns": ["backer", "circlesBackingInstance", "blockNumber", "transactionHash"],
        "rows": rows
            .iter()
            .map(|(backer, instance, block, tx)| json!([backer, instance, block, tx]))
            .collect::<Vec<_>>()
    })
}
