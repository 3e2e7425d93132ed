//! Chain JSON-RPC client.
//!
//! Execution transactions are sent with `eth_sendTransaction` from the
//! relayer account (the node holds its key) and confirmed by polling
//! `eth_getTransactionReceipt`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use zkms_core::{Address, OnChainCall, TxHash};

use crate::config::ChainRpcConfig;
use crate::error::ChainError;

/// A mined transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub tx_hash: TxHash,
    pub block_number: u64,
    /// `false` when the transaction reverted.
    pub success: bool,
    pub gas_used: u64,
}

/// The chain as seen by the execution coordinator.
#[async_trait]
pub trait ChainRpc: Send + Sync {
    /// Submit `call` and return its transaction hash without waiting for it
    /// to be mined.
    async fn call(&self, call: &OnChainCall) -> Result<TxHash, ChainError>;

    /// Wait until `tx_hash` is mined. Callers bound this with a timeout.
    async fn wait_for_receipt(&self, tx_hash: &TxHash) -> Result<Receipt, ChainError>;
}

// -- JSON-RPC envelope ----------------------------------------------------------

#[derive(Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: serde_json::Value,
}

#[derive(Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<serde_json::Value>,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

#[derive(Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SendTransactionParams {
    from: Address,
    to: Address,
    value: String,
    data: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcReceipt {
    transaction_hash: TxHash,
    block_number: String,
    status: String,
    gas_used: String,
}

fn parse_quantity(method: &'static str, raw: &str) -> Result<u64, ChainError> {
    let digits = raw
        .strip_prefix("0x")
        .ok_or_else(|| ChainError::Decode {
            method,
            reason: format!("quantity {raw:?} is not 0x-prefixed"),
        })?;
    u64::from_str_radix(digits, 16).map_err(|e| ChainError::Decode {
        method,
        reason: format!("quantity {raw:?}: {e}"),
    })
}

// -- Client -------------------------------------------------------------------

/// JSON-RPC implementation over `reqwest`.
#[derive(Debug)]
pub struct JsonRpcChain {
    http: reqwest::Client,
    rpc_url: url::Url,
    relayer: Address,
    poll_interval: Duration,
    next_id: AtomicU64,
}

impl JsonRpcChain {
    pub fn new(config: ChainRpcConfig) -> Result<Self, ChainError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ChainError::Http {
                method: "client_init",
                source: e,
            })?;
        Ok(Self {
            http,
            rpc_url: config.rpc_url,
            relayer: config.relayer,
            poll_interval: Duration::from_millis(config.receipt_poll_interval_ms),
            next_id: AtomicU64::new(1),
        })
    }

    async fn request<T: DeserializeOwned>(
        &self,
        method: &'static str,
        params: serde_json::Value,
    ) -> Result<T, ChainError> {
        let body = RpcRequest {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };
        let resp = self
            .http
            .post(self.rpc_url.clone())
            .json(&body)
            .send()
            .await
            .map_err(|e| ChainError::Http { method, source: e })?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp
                .text()
                .await
                .unwrap_or_else(|e| format!("<failed to read response body: {e}>"));
            return Err(ChainError::Status {
                method,
                status,
                body,
            });
        }

        let envelope: RpcResponse = resp.json().await.map_err(|e| ChainError::Decode {
            method,
            reason: e.to_string(),
        })?;
        if let Some(err) = envelope.error {
            return Err(ChainError::Rpc {
                method,
                code: err.code,
                message: err.message,
            });
        }
        serde_json::from_value(envelope.result.unwrap_or(serde_json::Value::Null)).map_err(|e| {
            ChainError::Decode {
                method,
                reason: e.to_string(),
            }
        })
    }
}

#[async_trait]
impl ChainRpc for JsonRpcChain {
    async fn call(&self, call: &OnChainCall) -> Result<TxHash, ChainError> {
        let params = SendTransactionParams {
            from: self.relayer,
            to: call.to,
            value: format!("{:#x}", call.value),
            data: call.data.to_hex(),
        };
        let params = serde_json::to_value([params]).map_err(|e| ChainError::Decode {
            method: "eth_sendTransaction",
            reason: e.to_string(),
        })?;
        let hash: TxHash = self.request("eth_sendTransaction", params).await?;
        tracing::info!(tx_hash = %hash, to = %call.to, "Transaction sent");
        Ok(hash)
    }

    async fn wait_for_receipt(&self, tx_hash: &TxHash) -> Result<Receipt, ChainError> {
        const METHOD: &str = "eth_getTransactionReceipt";
        loop {
            let receipt: Option<RpcReceipt> = self
                .request(METHOD, serde_json::json!([tx_hash.to_hex()]))
                .await?;
            if let Some(r) = receipt {
                return Ok(Receipt {
                    tx_hash: r.transaction_hash,
                    block_number: parse_quantity(METHOD, &r.block_number)?,
                    success: parse_quantity(METHOD, &r.status)? == 1,
                    gas_used: parse_quantity(METHOD, &r.gas_used)?,
                });
            }
            tracing::trace!(tx_hash = %tx_hash, "Receipt not available yet");
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}
