//! Capability interface every injected wallet is adapted to.
//!
//! Browser wallets expose differently shaped objects on `window`. The registry
//! boundary wraps each one into a [`WalletProvider`] so nothing past it ever
//! branches on wallet identity.

use async_trait::async_trait;
use std::fmt;

use crate::address::Address;

/// EIP-1193 style code wallets use for "user rejected the request".
pub const USER_REJECTED_CODE: i64 = 4001;

/// Failure reported by a provider during a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// The user dismissed or declined the approval prompt.
    Rejected,
    /// Provider disappeared or refused to answer (locked extension, etc).
    Unavailable(String),
    /// Anything else, with the provider's own message.
    Other(String),
}

impl ProviderError {
    /// Classify a raw provider error from its code and message.
    pub fn classify(code: Option<i64>, message: &str) -> Self {
        if code == Some(USER_REJECTED_CODE) {
            return ProviderError::Rejected;
        }
        let lowered = message.to_ascii_lowercase();
        if lowered.contains("reject") || lowered.contains("denied") || lowered.contains("cancel") {
            ProviderError::Rejected
        } else {
            ProviderError::Other(message.to_string())
        }
    }
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ProviderError::Rejected => write!(f, "request rejected"),
            ProviderError::Unavailable(msg) => write!(f, "provider unavailable: {}", msg),
            ProviderError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for ProviderError {}

pub type ProviderResult<T> = Result<T, ProviderError>;

/// Out-of-band notifications a provider pushes after a connection exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderEvent {
    /// The wallet switched accounts. `None` means access was revoked.
    AccountChanged(Option<Address>),
    /// The wallet dropped the connection on its own.
    Disconnect,
}

impl ProviderEvent {
    /// True when the event ends the connection.
    pub fn is_revocation(&self) -> bool {
        matches!(
            self,
            ProviderEvent::Disconnect | ProviderEvent::AccountChanged(None)
        )
    }
}

pub type EventListener = Box<dyn Fn(ProviderEvent)>;

/// Token returned by [`WalletProvider::on`], used to detach the listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

/// The operations the session needs from a wallet.
///
/// Implementations only ever read from or make requests to the underlying
/// extension object; they never mutate it.
#[async_trait(?Send)]
pub trait WalletProvider {
    /// Ask the wallet for access. Resolves once the user approves.
    async fn connect(&self) -> ProviderResult<Address>;

    /// Tell the wallet the page is done with the connection.
    async fn disconnect(&self) -> ProviderResult<()>;

    /// Key currently exposed by the wallet, if it has one.
    fn public_key(&self) -> Option<Address>;

    /// Attach a listener for account changes and disconnects.
    fn on(&self, listener: EventListener) -> ListenerId;

    /// Detach a listener. Unknown ids are ignored.
    fn off(&self, id: ListenerId);
}
