/// Balance queries against a Solana JSON-RPC node
///
/// The fetcher is a pure query: it never touches session state. The session
/// store decides whether a result is still relevant and applies it.
use async_trait::async_trait;
use futures::future::AbortHandle;
use reqwest::{Client, ClientBuilder};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::address::Address;
use crate::config::{Commitment, WalletConfig};
use crate::errors::{WalletError, WalletResult};

pub const LAMPORTS_PER_SOL: u64 = 1_000_000_000;

pub fn lamports_to_sol(lamports: u64) -> f64 {
    lamports as f64 / LAMPORTS_PER_SOL as f64
}

#[async_trait(?Send)]
pub trait BalanceFetcher {
    /// Current balance of `public_key`, in SOL.
    async fn fetch(&self, public_key: &Address) -> WalletResult<f64>;
}

/// JSON-RPC request structure
#[derive(Debug, Serialize)]
struct JsonRpcRequest<T: Serialize> {
    jsonrpc: &'static str,
    id: u64,
    method: &'static str,
    params: T,
}

/// JSON-RPC response structure
#[derive(Debug, Deserialize)]
struct JsonRpcResponse<T> {
    result: Option<T>,
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

/// `getBalance` wraps the lamport count in an RPC context envelope.
#[derive(Debug, Deserialize)]
struct RpcContextValue<T> {
    value: T,
}

/// HTTP `getBalance` client
pub struct RpcBalanceFetcher {
    client: Client,
    endpoint: String,
    commitment: Commitment,
}

impl RpcBalanceFetcher {
    pub fn new(endpoint: impl Into<String>, commitment: Commitment) -> WalletResult<Self> {
        Self::build(endpoint.into(), commitment, None)
    }

    pub fn from_config(config: &WalletConfig) -> WalletResult<Self> {
        Self::build(
            config.endpoint().to_string(),
            config.commitment,
            Some(config.rpc_timeout()),
        )
    }

    fn build(
        endpoint: String,
        commitment: Commitment,
        timeout: Option<Duration>,
    ) -> WalletResult<Self> {
        let client = apply_timeout(Client::builder(), timeout)
            .build()
            .map_err(|e| {
                WalletError::ConfigError(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            commitment,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn request_body(&self, public_key: &Address) -> JsonRpcRequest<serde_json::Value> {
        JsonRpcRequest {
            jsonrpc: "2.0",
            id: 1,
            method: "getBalance",
            params: serde_json::json!([
                public_key.as_str(),
                { "commitment": self.commitment.as_str() }
            ]),
        }
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn apply_timeout(builder: ClientBuilder, timeout: Option<Duration>) -> ClientBuilder {
    match timeout {
        Some(timeout) => builder.timeout(timeout),
        None => builder,
    }
}

// The fetch-backed client on wasm has no client-wide timeout.
#[cfg(target_arch = "wasm32")]
fn apply_timeout(builder: ClientBuilder, _timeout: Option<Duration>) -> ClientBuilder {
    builder
}

/// Extract the lamport count from a raw `getBalance` response body.
pub fn parse_balance_response(body: &[u8]) -> WalletResult<u64> {
    let response: JsonRpcResponse<RpcContextValue<u64>> = serde_json::from_slice(body)?;

    if let Some(error) = response.error {
        return Err(WalletError::FetchError(format!(
            "RPC error {}: {}",
            error.code, error.message
        )));
    }

    response
        .result
        .map(|context| context.value)
        .ok_or_else(|| WalletError::FetchError("No result in RPC response".to_string()))
}

#[async_trait(?Send)]
impl BalanceFetcher for RpcBalanceFetcher {
    async fn fetch(&self, public_key: &Address) -> WalletResult<f64> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&self.request_body(public_key))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(WalletError::FetchError(format!(
                "HTTP error: {}",
                response.status()
            )));
        }

        let body = response.bytes().await?;
        let lamports = parse_balance_response(&body)?;
        Ok(lamports_to_sol(lamports))
    }
}

/// Handle to the periodic refresh loop of one connection.
///
/// Disconnect and revocation can race to stop the same loop; the flag makes
/// sure only the first caller performs the abort.
#[derive(Debug, Clone)]
pub struct RefreshTimer {
    abort: AbortHandle,
    stopped: Arc<AtomicBool>,
}

impl RefreshTimer {
    pub fn new(abort: AbortHandle) -> Self {
        Self {
            abort,
            stopped: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Stop the loop. Returns false when it had already been stopped.
    pub fn stop(&self) -> bool {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return false;
        }
        self.abort.abort();
        true
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}
