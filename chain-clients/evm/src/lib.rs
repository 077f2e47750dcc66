//! EVM JSON-RPC Client
//!
//! Thin transport over an EVM-compatible node's JSON-RPC API. Used for both
//! the side chain and the relay chain. Every method maps to one RPC call and
//! returns the node's view as plain hex strings; interpretation of those values
//! belongs to the caller.

use anyhow::{Context, Result};
use chain_clients_common::{format_hex_u64, parse_hex_u64};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::debug;

/// Per-request ceiling for a single JSON-RPC round trip.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// JSON-RPC error code geth uses for execution reverts.
const EXECUTION_REVERTED_CODE: i64 = 3;

// ============================================================================
// API RESPONSE STRUCTURES
// ============================================================================

/// EVM JSON-RPC request wrapper
#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    method: &'a str,
    params: Vec<serde_json::Value>,
    id: u64,
}

/// EVM JSON-RPC response wrapper
#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    #[serde(default)]
    result: Option<serde_json::Value>,
    #[serde(default)]
    error: Option<JsonRpcError>,
}

/// Error object returned by the node.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

/// EVM event log entry, as embedded in a receipt
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct EvmLog {
    /// Address of the contract that emitted the event
    pub address: String,
    /// Array of topics (indexed event parameters)
    pub topics: Vec<String>,
    /// Event data (non-indexed parameters)
    pub data: String,
    #[serde(rename = "blockNumber", default)]
    pub block_number: Option<String>,
    #[serde(rename = "transactionHash", default)]
    pub transaction_hash: Option<String>,
    #[serde(rename = "logIndex", default)]
    pub log_index: Option<String>,
}

/// EVM transaction receipt from `eth_getTransactionReceipt`
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EvmTransactionReceipt {
    #[serde(rename = "transactionHash")]
    pub transaction_hash: String,
    #[serde(rename = "blockNumber", default)]
    pub block_number: Option<String>,
    #[serde(rename = "blockHash", default)]
    pub block_hash: Option<String>,
    /// `0x1` success, `0x0` failure
    #[serde(default)]
    pub status: Option<String>,
    #[serde(rename = "gasUsed", default)]
    pub gas_used: Option<String>,
    #[serde(default)]
    pub logs: Vec<EvmLog>,
}

/// EVM transaction details from `eth_getTransactionByHash`
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EvmTransaction {
    pub hash: String,
    /// Null while the transaction sits in the pending pool
    #[serde(rename = "blockNumber", default)]
    pub block_number: Option<String>,
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default)]
    pub nonce: Option<String>,
    #[serde(default)]
    pub input: Option<String>,
}

impl EvmTransaction {
    pub fn is_pending(&self) -> bool {
        self.block_number.is_none()
    }
}

/// Block header as returned by `eth_getBlockByNumber(tag, false)`.
///
/// Field order matches the node's own JSON header encoding, so serializing
/// this struct reproduces the canonical header JSON. Optional fork fields are
/// omitted when the node does not report them.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct EvmBlockHeader {
    #[serde(rename = "parentHash")]
    pub parent_hash: String,
    #[serde(rename = "sha3Uncles")]
    pub sha3_uncles: String,
    pub miner: String,
    #[serde(rename = "stateRoot")]
    pub state_root: String,
    #[serde(rename = "transactionsRoot")]
    pub transactions_root: String,
    #[serde(rename = "receiptsRoot")]
    pub receipts_root: String,
    #[serde(rename = "logsBloom")]
    pub logs_bloom: String,
    pub difficulty: String,
    pub number: String,
    #[serde(rename = "gasLimit")]
    pub gas_limit: String,
    #[serde(rename = "gasUsed")]
    pub gas_used: String,
    pub timestamp: String,
    #[serde(rename = "extraData")]
    pub extra_data: String,
    #[serde(rename = "mixHash")]
    pub mix_hash: String,
    pub nonce: String,
    #[serde(rename = "baseFeePerGas", default, skip_serializing_if = "Option::is_none")]
    pub base_fee_per_gas: Option<String>,
    #[serde(rename = "withdrawalsRoot", default, skip_serializing_if = "Option::is_none")]
    pub withdrawals_root: Option<String>,
    #[serde(rename = "blobGasUsed", default, skip_serializing_if = "Option::is_none")]
    pub blob_gas_used: Option<String>,
    #[serde(rename = "excessBlobGas", default, skip_serializing_if = "Option::is_none")]
    pub excess_blob_gas: Option<String>,
    #[serde(rename = "parentBeaconBlockRoot", default, skip_serializing_if = "Option::is_none")]
    pub parent_beacon_block_root: Option<String>,
    #[serde(rename = "requestsHash", default, skip_serializing_if = "Option::is_none")]
    pub requests_hash: Option<String>,
    pub hash: String,
}

impl EvmBlockHeader {
    /// Block height parsed from the `number` quantity.
    pub fn height(&self) -> Result<u64> {
        parse_hex_u64(&self.number).context("Failed to parse block number")
    }
}

/// Result of an `eth_call` simulation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallOutcome {
    /// Call succeeded; raw return data
    Success(Vec<u8>),
    /// Call reverted; the node's message verbatim plus any revert data
    Reverted {
        message: String,
        data: Option<String>,
    },
}

// ============================================================================
// EVM CLIENT IMPLEMENTATION
// ============================================================================

/// Client for communicating with EVM-compatible blockchain nodes via JSON-RPC
pub struct EvmClient {
    /// HTTP client for making requests
    client: Client,
    /// Node URL (e.g., "http://127.0.0.1:8545")
    rpc_url: String,
    next_id: AtomicU64,
}

impl EvmClient {
    /// Creates a new EVM client for the given node URL
    ///
    /// # Arguments
    ///
    /// * `rpc_url` - JSON-RPC endpoint of the node
    ///
    /// # Returns
    ///
    /// * `Ok(EvmClient)` - Successfully created client
    /// * `Err(anyhow::Error)` - Failed to create HTTP client
    pub fn new(rpc_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            rpc_url: rpc_url.to_string(),
            next_id: AtomicU64::new(1),
        })
    }

    pub fn rpc_url(&self) -> &str {
        &self.rpc_url
    }

    /// Sends one JSON-RPC request and returns the raw envelope.
    async fn send(&self, method: &str, params: Vec<serde_json::Value>) -> Result<JsonRpcResponse> {
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            method,
            params,
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
        };

        let rpc_future = async {
            let resp = self
                .client
                .post(&self.rpc_url)
                .json(&request)
                .send()
                .await
                .with_context(|| format!("Failed to send {} request to {}", method, self.rpc_url))?;
            resp.json::<JsonRpcResponse>()
                .await
                .with_context(|| format!("Failed to parse {} response from {}", method, self.rpc_url))
        };

        tokio::time::timeout(REQUEST_TIMEOUT, rpc_future)
            .await
            .map_err(|_| {
                anyhow::anyhow!(
                    "Timed out after {}s waiting for {} from {}",
                    REQUEST_TIMEOUT.as_secs(),
                    method,
                    self.rpc_url
                )
            })?
    }

    /// Generic JSON-RPC call. A `null` result comes back as `Ok(None)`.
    ///
    /// # Arguments
    ///
    /// * `method` - RPC method name
    /// * `params` - Positional parameters
    pub async fn request<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Vec<serde_json::Value>,
    ) -> Result<Option<T>> {
        let response = self.send(method, params).await?;

        if let Some(error) = response.error {
            anyhow::bail!(
                "JSON-RPC error from {} ({}): {} (code: {})",
                self.rpc_url,
                method,
                error.message,
                error.code
            );
        }

        match response.result {
            None | Some(serde_json::Value::Null) => Ok(None),
            Some(value) => serde_json::from_value(value)
                .map(Some)
                .with_context(|| format!("Failed to deserialize {} result", method)),
        }
    }

    /// Like [`request`](Self::request) but treats a `null` result as an error.
    async fn request_required<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Vec<serde_json::Value>,
    ) -> Result<T> {
        self.request(method, params)
            .await?
            .ok_or_else(|| anyhow::anyhow!("No result in {} response from {}", method, self.rpc_url))
    }

    async fn request_quantity(&self, method: &str, params: Vec<serde_json::Value>) -> Result<u64> {
        let hex: String = self.request_required(method, params).await?;
        parse_hex_u64(&hex).with_context(|| format!("Failed to parse {} quantity '{}'", method, hex))
    }

    /// Returns the node's EIP-155 chain id (`eth_chainId`).
    pub async fn chain_id(&self) -> Result<u64> {
        self.request_quantity("eth_chainId", vec![]).await
    }

    /// Returns the latest block number (`eth_blockNumber`).
    pub async fn block_number(&self) -> Result<u64> {
        self.request_quantity("eth_blockNumber", vec![]).await
    }

    /// Returns the nonce for `address` including pending transactions.
    pub async fn pending_nonce(&self, address: &str) -> Result<u64> {
        self.request_quantity(
            "eth_getTransactionCount",
            vec![serde_json::json!(address), serde_json::json!("pending")],
        )
        .await
    }

    /// Returns the node's suggested gas price as a hex quantity string.
    ///
    /// Left unparsed because gas prices can exceed u64 on some networks.
    pub async fn gas_price(&self) -> Result<String> {
        self.request_required("eth_gasPrice", vec![]).await
    }

    /// Fetches a block header by tag (`"latest"`, `"earliest"`, or a hex height).
    ///
    /// # Returns
    ///
    /// * `Ok(Some(header))` - Block exists
    /// * `Ok(None)` - Node does not know the block
    pub async fn block_header(&self, tag: &str) -> Result<Option<EvmBlockHeader>> {
        self.request(
            "eth_getBlockByNumber",
            vec![serde_json::json!(tag), serde_json::json!(false)],
        )
        .await
    }

    pub async fn block_header_at(&self, height: u64) -> Result<Option<EvmBlockHeader>> {
        self.block_header(&format_hex_u64(height)).await
    }

    /// Fetches a transaction by hash. `Ok(None)` when the node has never seen it.
    pub async fn transaction(&self, tx_hash: &str) -> Result<Option<EvmTransaction>> {
        self.request("eth_getTransactionByHash", vec![serde_json::json!(tx_hash)])
            .await
    }

    /// Fetches a transaction receipt. `Ok(None)` while unmined.
    pub async fn transaction_receipt(&self, tx_hash: &str) -> Result<Option<EvmTransactionReceipt>> {
        self.request("eth_getTransactionReceipt", vec![serde_json::json!(tx_hash)])
            .await
    }

    /// Broadcasts a signed, RLP-encoded transaction and returns its hash.
    pub async fn send_raw_transaction(&self, raw_tx: &str) -> Result<String> {
        let hash: String = self
            .request_required("eth_sendRawTransaction", vec![serde_json::json!(raw_tx)])
            .await?;
        debug!("eth_sendRawTransaction accepted {}", hash);
        Ok(hash)
    }

    /// Simulates a call with `eth_call`.
    ///
    /// Execution reverts are returned as [`CallOutcome::Reverted`] rather than
    /// an error so the caller can surface the node's message unchanged.
    ///
    /// # Arguments
    ///
    /// * `from` - Caller address
    /// * `to` - Contract address
    /// * `data` - `0x`-prefixed calldata
    /// * `block` - Block tag to execute against
    pub async fn call(&self, from: &str, to: &str, data: &str, block: &str) -> Result<CallOutcome> {
        let call = serde_json::json!({
            "from": from,
            "to": to,
            "data": data,
        });
        let response = self
            .send("eth_call", vec![call, serde_json::json!(block)])
            .await?;

        if let Some(error) = response.error {
            if is_revert(&error) {
                let data = error.data.as_ref().and_then(|d| d.as_str()).map(str::to_string);
                return Ok(CallOutcome::Reverted {
                    message: error.message,
                    data,
                });
            }
            anyhow::bail!(
                "JSON-RPC error from {} (eth_call): {} (code: {})",
                self.rpc_url,
                error.message,
                error.code
            );
        }

        let hex = match response.result {
            Some(serde_json::Value::String(s)) => s,
            Some(serde_json::Value::Null) | None => String::new(),
            Some(other) => anyhow::bail!("Unexpected eth_call result: {}", other),
        };
        let bytes = chain_clients_common::hex_to_bytes(&hex)
            .with_context(|| format!("Failed to decode eth_call result '{}'", hex))?;
        Ok(CallOutcome::Success(bytes))
    }
}

fn is_revert(error: &JsonRpcError) -> bool {
    error.code == EXECUTION_REVERTED_CODE || error.message.contains("revert")
}
