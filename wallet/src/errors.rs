use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WalletError {
    // Negotiation errors
    NotInstalled(String),
    UserRejected,
    Timeout,
    ProviderError(String),

    // Session state errors
    AlreadyConnecting,
    AlreadyConnected(String),
    ConnectionPending,
    NotConnected,
    Cancelled,

    // Network errors
    FetchError(String),

    // Validation errors
    InvalidAddress(String),
    ConfigError(String),
}

impl WalletError {
    /// Stable identifier handed to JavaScript callers.
    pub fn code(&self) -> &'static str {
        match self {
            WalletError::NotInstalled(_) => "NOT_INSTALLED",
            WalletError::UserRejected => "USER_REJECTED",
            WalletError::Timeout => "TIMEOUT",
            WalletError::ProviderError(_) => "PROVIDER_ERROR",
            WalletError::AlreadyConnecting => "ALREADY_CONNECTING",
            WalletError::AlreadyConnected(_) => "ALREADY_CONNECTED",
            WalletError::ConnectionPending => "CONNECTION_PENDING",
            WalletError::NotConnected => "NOT_CONNECTED",
            WalletError::Cancelled => "CANCELLED",
            WalletError::FetchError(_) => "FETCH_ERROR",
            WalletError::InvalidAddress(_) => "INVALID_ADDRESS",
            WalletError::ConfigError(_) => "CONFIG_ERROR",
        }
    }

    /// Errors worth retrying without user involvement.
    pub fn is_transient(&self) -> bool {
        matches!(self, WalletError::FetchError(_) | WalletError::Timeout)
    }
}

impl fmt::Display for WalletError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            WalletError::NotInstalled(id) => write!(f, "Wallet not installed: {}", id),
            WalletError::UserRejected => write!(f, "Connection request rejected by user"),
            WalletError::Timeout => write!(f, "Wallet did not respond in time"),
            WalletError::ProviderError(msg) => write!(f, "Wallet provider error: {}", msg),

            WalletError::AlreadyConnecting => {
                write!(f, "A connection attempt is already in progress")
            }
            WalletError::AlreadyConnected(name) => write!(f, "Already connected to {}", name),
            WalletError::ConnectionPending => {
                write!(f, "Cannot disconnect while a connection attempt is pending")
            }
            WalletError::NotConnected => write!(f, "No wallet connected"),
            WalletError::Cancelled => write!(f, "Connection attempt was cancelled"),

            WalletError::FetchError(msg) => write!(f, "Balance fetch failed: {}", msg),

            WalletError::InvalidAddress(msg) => write!(f, "Invalid address: {}", msg),
            WalletError::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl std::error::Error for WalletError {}

pub type WalletResult<T> = Result<T, WalletError>;

impl From<serde_json::Error> for WalletError {
    fn from(error: serde_json::Error) -> Self {
        WalletError::FetchError(format!("JSON error: {}", error))
    }
}

impl From<reqwest::Error> for WalletError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            WalletError::FetchError("request timed out".to_string())
        } else {
            WalletError::FetchError(error.to_string())
        }
    }
}
