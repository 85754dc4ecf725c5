//! JSON-RPC client for the five cluster calls the session needs:
//! balance, latest blockhash, broadcast, confirmation, and airdrop.
//!
//! The wire protocol is plain JSON-RPC 2.0 over HTTP. Transport is behind
//! the [`RpcTransport`] trait so tests can script responses without a
//! network. Confirmation is poll-based over `getSignatureStatuses` at
//! "confirmed" commitment, bounded by both a wall-clock timeout and the
//! blockhash validity window. No call is ever retried — a failure surfaces
//! immediately and resubmission is the user's decision.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tokio::time::Instant;
use tracing::debug;

use sol_tx::{Blockhash, Pubkey, SignedTransaction};

use crate::network::Network;

/// Commitment level used for every query and confirmation wait.
const COMMITMENT: &str = "confirmed";

/// Errors from the RPC endpoint or its transport.
#[derive(Debug, Error)]
pub enum RpcError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("malformed response: {0}")]
    Malformed(String),

    /// The cluster executed the transaction and it failed.
    #[error("transaction failed: {0}")]
    TransactionFailed(String),

    #[error("confirmation timed out after {0}s")]
    ConfirmationTimeout(u64),
}

/// Client tunables.
#[derive(Debug, Clone, Copy)]
pub struct RpcConfig {
    pub request_timeout: Duration,
    pub confirmation_timeout: Duration,
    pub confirmation_poll_interval: Duration,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            confirmation_timeout: Duration::from_secs(60),
            confirmation_poll_interval: Duration::from_millis(500),
        }
    }
}

/// One JSON-RPC round trip. Implemented over HTTP in production and by
/// scripted stubs in tests.
#[async_trait]
pub trait RpcTransport: Send + Sync {
    async fn send(&self, method: &str, params: Value) -> Result<Value, RpcError>;

    /// Endpoint this transport talks to (for logs and snapshots).
    fn url(&self) -> &str;
}

#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    result: Option<Value>,
    error: Option<JsonRpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcErrorObject {
    code: i64,
    message: String,
}

/// HTTP transport against a cluster endpoint.
pub struct HttpTransport {
    client: reqwest::Client,
    url: String,
}

impl HttpTransport {
    pub fn new(url: impl Into<String>, request_timeout: Duration) -> Result<Self, RpcError> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| RpcError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl RpcTransport for HttpTransport {
    async fn send(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            id: 1,
            method,
            params,
        };

        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    RpcError::Timeout(e.to_string())
                } else {
                    RpcError::Transport(e.to_string())
                }
            })?;

        let parsed: JsonRpcResponse = response
            .json()
            .await
            .map_err(|e| RpcError::Malformed(e.to_string()))?;

        if let Some(err) = parsed.error {
            return Err(RpcError::Rpc {
                code: err.code,
                message: err.message,
            });
        }
        parsed
            .result
            .ok_or_else(|| RpcError::Malformed("empty response".into()))
    }

    fn url(&self) -> &str {
        &self.url
    }
}

/// A recent blockhash plus the last block height at which a transaction
/// citing it can still land.
#[derive(Debug, Clone, Copy)]
pub struct LatestBlockhash {
    pub blockhash: Blockhash,
    pub last_valid_block_height: u64,
}

// Response envelopes. Most account-scoped RPC results arrive wrapped in a
// `{context, value}` object; only `value` matters here.

#[derive(Debug, Deserialize)]
struct WithContext<T> {
    value: T,
}

#[derive(Debug, Deserialize)]
struct BlockhashValue {
    blockhash: String,
    #[serde(rename = "lastValidBlockHeight")]
    last_valid_block_height: u64,
}

#[derive(Debug, Deserialize)]
struct SignatureStatus {
    err: Option<Value>,
    #[serde(rename = "confirmationStatus")]
    confirmation_status: Option<String>,
}

/// Connection handle to one cluster endpoint.
///
/// Cheap to clone; a network switch produces a fresh client rather than
/// mutating this one.
#[derive(Clone)]
pub struct RpcClient {
    transport: Arc<dyn RpcTransport>,
    config: RpcConfig,
}

impl std::fmt::Debug for RpcClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcClient")
            .field("endpoint", &self.transport.url())
            .field("config", &self.config)
            .finish()
    }
}

impl RpcClient {
    pub fn new(transport: Arc<dyn RpcTransport>, config: RpcConfig) -> Self {
        Self { transport, config }
    }

    pub fn endpoint(&self) -> &str {
        self.transport.url()
    }

    async fn call<R: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> Result<R, RpcError> {
        debug!(method, endpoint = self.transport.url(), "rpc call");
        let value = self.transport.send(method, params).await?;
        serde_json::from_value(value).map_err(|e| RpcError::Malformed(e.to_string()))
    }

    /// Balance of `address` in lamports.
    pub async fn get_balance(&self, address: &Pubkey) -> Result<u64, RpcError> {
        let response: WithContext<u64> = self
            .call(
                "getBalance",
                json!([address.to_string(), { "commitment": COMMITMENT }]),
            )
            .await?;
        Ok(response.value)
    }

    pub async fn get_latest_blockhash(&self) -> Result<LatestBlockhash, RpcError> {
        let response: WithContext<BlockhashValue> = self
            .call("getLatestBlockhash", json!([{ "commitment": COMMITMENT }]))
            .await?;
        let blockhash = response
            .value
            .blockhash
            .parse()
            .map_err(|e: sol_tx::TxError| RpcError::Malformed(e.to_string()))?;
        Ok(LatestBlockhash {
            blockhash,
            last_valid_block_height: response.value.last_valid_block_height,
        })
    }

    pub async fn get_block_height(&self) -> Result<u64, RpcError> {
        self.call("getBlockHeight", json!([{ "commitment": COMMITMENT }]))
            .await
    }

    /// Broadcast a signed transaction; returns its signature.
    pub async fn send_transaction(&self, tx: &SignedTransaction) -> Result<String, RpcError> {
        let encoded = bs58::encode(tx.as_bytes()).into_string();
        self.call(
            "sendTransaction",
            json!([encoded, { "encoding": "base58", "preflightCommitment": COMMITMENT }]),
        )
        .await
    }

    /// Request `lamports` from the cluster faucet; returns the airdrop
    /// transaction's signature.
    pub async fn request_airdrop(
        &self,
        address: &Pubkey,
        lamports: u64,
    ) -> Result<String, RpcError> {
        self.call("requestAirdrop", json!([address.to_string(), lamports]))
            .await
    }

    /// Wait until `signature` reaches "confirmed" commitment.
    ///
    /// Polls `getSignatureStatuses`. While the transaction is not yet
    /// visible, the blockhash validity `window` bounds the wait: once the
    /// chain moves past `last_valid_block_height` the transaction can no
    /// longer land and the wait fails. A wall-clock timeout applies
    /// regardless.
    pub async fn confirm_transaction(
        &self,
        signature: &str,
        window: &LatestBlockhash,
    ) -> Result<(), RpcError> {
        let deadline = Instant::now() + self.config.confirmation_timeout;

        loop {
            let statuses: WithContext<Vec<Option<SignatureStatus>>> = self
                .call(
                    "getSignatureStatuses",
                    json!([[signature], { "searchTransactionHistory": true }]),
                )
                .await?;

            match statuses.value.first() {
                Some(Some(status)) => {
                    if let Some(err) = &status.err {
                        return Err(RpcError::TransactionFailed(err.to_string()));
                    }
                    if matches!(
                        status.confirmation_status.as_deref(),
                        Some("confirmed") | Some("finalized")
                    ) {
                        debug!(signature, "transaction confirmed");
                        return Ok(());
                    }
                }
                _ => {
                    // Not visible yet. Give up once the cited blockhash can
                    // no longer land.
                    let height = self.get_block_height().await?;
                    if height > window.last_valid_block_height {
                        return Err(RpcError::TransactionFailed(format!(
                            "blockhash expired at block height {height}"
                        )));
                    }
                }
            }

            if Instant::now() >= deadline {
                return Err(RpcError::ConfirmationTimeout(
                    self.config.confirmation_timeout.as_secs(),
                ));
            }
            tokio::time::sleep(self.config.confirmation_poll_interval).await;
        }
    }
}

/// Maps a logical network to a connection handle.
pub trait EndpointResolver: Send + Sync {
    fn resolve(&self, network: Network) -> Result<RpcClient, RpcError>;
}

/// Default resolver: HTTP against the cluster's public endpoint.
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpResolver {
    config: RpcConfig,
}

impl HttpResolver {
    pub fn new(config: RpcConfig) -> Self {
        Self { config }
    }
}

impl EndpointResolver for HttpResolver {
    fn resolve(&self, network: Network) -> Result<RpcClient, RpcError> {
        let transport = HttpTransport::new(network.endpoint_url(), self.config.request_timeout)?;
        Ok(RpcClient::new(Arc::new(transport), self.config))
    }
}
