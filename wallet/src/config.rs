use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::errors::{WalletError, WalletResult};

const MIN_INTERVAL_MS: u64 = 1_000;

static ENDPOINT_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^https?://[A-Za-z0-9.\-]+(:\d+)?(/\S*)?$").unwrap());

static WALLET_ID_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9][a-z0-9_\-]*$").unwrap());

/// Solana cluster the balance queries go to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Cluster {
    #[default]
    MainnetBeta,
    Devnet,
    Testnet,
    Localnet,
}

impl Cluster {
    pub fn endpoint(&self) -> &'static str {
        match self {
            Cluster::MainnetBeta => "https://api.mainnet-beta.solana.com",
            Cluster::Devnet => "https://api.devnet.solana.com",
            Cluster::Testnet => "https://api.testnet.solana.com",
            Cluster::Localnet => "http://127.0.0.1:8899",
        }
    }
}

/// Commitment level passed to `getBalance`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Commitment {
    Processed,
    #[default]
    Confirmed,
    Finalized,
}

impl Commitment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Commitment::Processed => "processed",
            Commitment::Confirmed => "confirmed",
            Commitment::Finalized => "finalized",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WalletConfig {
    pub cluster: Cluster,
    /// Overrides the cluster's public endpoint when set.
    pub rpc_endpoint: Option<String>,
    pub commitment: Commitment,
    pub refresh_interval_ms: u64,
    pub connect_timeout_ms: u64,
    pub rpc_timeout_ms: u64,
    /// Wallet ids in the order they should be offered.
    pub preferred_wallets: Vec<String>,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            cluster: Cluster::default(),
            rpc_endpoint: None,
            commitment: Commitment::default(),
            refresh_interval_ms: 30_000,
            connect_timeout_ms: 60_000,
            rpc_timeout_ms: 15_000,
            preferred_wallets: vec![
                "phantom".to_string(),
                "solflare".to_string(),
                "backpack".to_string(),
                "coinbase".to_string(),
            ],
        }
    }
}

impl WalletConfig {
    pub fn validate(&self) -> WalletResult<()> {
        if let Some(endpoint) = &self.rpc_endpoint {
            if !ENDPOINT_PATTERN.is_match(endpoint) {
                return Err(WalletError::ConfigError(format!(
                    "RPC endpoint '{}' is not an http(s) URL",
                    endpoint
                )));
            }
        }
        if self.refresh_interval_ms < MIN_INTERVAL_MS {
            return Err(WalletError::ConfigError(format!(
                "Refresh interval must be at least {} ms",
                MIN_INTERVAL_MS
            )));
        }
        if self.connect_timeout_ms < MIN_INTERVAL_MS {
            return Err(WalletError::ConfigError(format!(
                "Connect timeout must be at least {} ms",
                MIN_INTERVAL_MS
            )));
        }
        if self.rpc_timeout_ms == 0 {
            return Err(WalletError::ConfigError(
                "RPC timeout must be positive".to_string(),
            ));
        }
        for id in &self.preferred_wallets {
            if !WALLET_ID_PATTERN.is_match(id) {
                return Err(WalletError::ConfigError(format!(
                    "Invalid wallet id '{}' in preference list",
                    id
                )));
            }
        }
        Ok(())
    }

    /// Endpoint balance queries are sent to.
    pub fn endpoint(&self) -> &str {
        self.rpc_endpoint
            .as_deref()
            .unwrap_or_else(|| self.cluster.endpoint())
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_millis(self.rpc_timeout_ms)
    }
}
