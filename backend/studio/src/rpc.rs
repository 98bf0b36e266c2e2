//! Chain JSON-RPC transport and the response shapes the ledger client reads.
//!
//! ## Resilience
//!
//! * Rate-limit (`429`) and unavailable (`503`) responses are retried with
//!   exponential back-off, at most [`MAX_ATTEMPTS`] times.
//! * Transport errors and RPC error objects are returned to the caller
//!   immediately; the ledger client decides whether they degrade or surface.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::errors::{Result, StudioError};

const MAX_ATTEMPTS: u32 = 3;
const INITIAL_BACKOFF_MS: u64 = 250;

// ─────────────────────────────────────────────────────────
// JSON-RPC response shapes
// ─────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct RpcResponse {
    pub result: Option<Value>,
    pub error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawLog {
    pub address: String,
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default)]
    pub data: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawReceipt {
    pub transaction_hash: String,
    pub gas_used: String,
    /// `0x1` on success, `0x0` on revert
    pub status: Option<String>,
    #[serde(default)]
    pub logs: Vec<RawLog>,
    pub block_number: Option<String>,
}

impl RawReceipt {
    pub fn succeeded(&self) -> bool {
        self.status.as_deref().map_or(true, |s| s != "0x0")
    }
}

// ─────────────────────────────────────────────────────────
// Public API
// ─────────────────────────────────────────────────────────

/// Thin JSON-RPC client bound to one endpoint.
#[derive(Debug, Clone)]
pub struct RpcClient {
    client: Client,
    url: String,
}

impl RpcClient {
    pub fn new(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Perform one JSON-RPC request and deserialize its `result`.
    pub async fn request<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T> {
        let mut backoff = INITIAL_BACKOFF_MS;
        let mut attempt = 1;

        loop {
            let resp = self
                .client
                .post(&self.url)
                .json(&json!({
                    "jsonrpc": "2.0",
                    "id": 1,
                    "method": method,
                    "params": params,
                }))
                .send()
                .await?;

            let status = resp.status();
            if matches!(
                status,
                StatusCode::TOO_MANY_REQUESTS | StatusCode::SERVICE_UNAVAILABLE
            ) && attempt < MAX_ATTEMPTS
            {
                warn!("RPC {method} returned {status} (retry {attempt} in {backoff}ms)");
                tokio::time::sleep(Duration::from_millis(backoff)).await;
                backoff *= 2;
                attempt += 1;
                continue;
            }

            let body: RpcResponse = resp.error_for_status()?.json().await?;
            if let Some(err) = body.error {
                return Err(StudioError::Rpc {
                    code: err.code,
                    message: err.message,
                });
            }

            debug!("RPC {method} ok");
            let result = body.result.unwrap_or(Value::Null);
            return Ok(serde_json::from_value(result)?);
        }
    }

    pub async fn chain_id(&self) -> Result<u64> {
        let hex_id: String = self.request("eth_chainId", json!([])).await?;
        parse_quantity(&hex_id)
    }

    pub async fn get_code(&self, address: &str) -> Result<String> {
        self.request("eth_getCode", json!([address, "latest"])).await
    }

    pub async fn call(&self, to: &str, data: &str) -> Result<String> {
        self.request("eth_call", json!([{ "to": to, "data": data }, "latest"]))
            .await
    }

    pub async fn send_transaction(&self, from: &str, to: &str, data: &str) -> Result<String> {
        self.request(
            "eth_sendTransaction",
            json!([{ "from": from, "to": to, "data": data }]),
        )
        .await
    }

    /// `None` until the transaction has been included.
    pub async fn transaction_receipt(&self, tx_hash: &str) -> Result<Option<RawReceipt>> {
        self.request("eth_getTransactionReceipt", json!([tx_hash]))
            .await
    }
}

/// Parse a `0x`-prefixed hex quantity.
pub fn parse_quantity(raw: &str) -> Result<u64> {
    let digits = raw.strip_prefix("0x").unwrap_or(raw);
    u64::from_str_radix(digits, 16)
        .map_err(|_| StudioError::AbiDecode(format!("invalid hex quantity: {raw}")))
}

/// Decode `0x`-prefixed hex data; `"0x"` is empty.
pub fn decode_hex_data(raw: &str) -> Result<Vec<u8>> {
    let digits = raw.strip_prefix("0x").unwrap_or(raw);
    hex::decode(digits).map_err(|_| StudioError::AbiDecode(format!("invalid hex data: {raw}")))
}

// ─────────────────────────────────────────────────────────
// Unit tests
// ─────────────────────────────────────────────────────────
