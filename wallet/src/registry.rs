//! Known wallet kinds and detection of their injected providers.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::errors::{WalletError, WalletResult};
use crate::provider::WalletProvider;

/// Static description of a wallet extension this crate knows how to find.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletKind {
    pub id: String,
    pub display_name: String,
    pub icon_ref: String,
    /// Dotted path under `window` where the provider object is injected.
    pub injection_path: String,
    /// Boolean property the provider sets to identify itself, if any.
    #[serde(default)]
    pub marker: Option<String>,
    pub download_url: String,
}

impl WalletKind {
    pub fn phantom() -> Self {
        Self {
            id: "phantom".to_string(),
            display_name: "Phantom".to_string(),
            icon_ref: "/wallets/phantom.svg".to_string(),
            injection_path: "phantom.solana".to_string(),
            marker: Some("isPhantom".to_string()),
            download_url: "https://phantom.app/download".to_string(),
        }
    }

    pub fn solflare() -> Self {
        Self {
            id: "solflare".to_string(),
            display_name: "Solflare".to_string(),
            icon_ref: "/wallets/solflare.svg".to_string(),
            injection_path: "solflare".to_string(),
            marker: Some("isSolflare".to_string()),
            download_url: "https://solflare.com/download".to_string(),
        }
    }

    pub fn backpack() -> Self {
        Self {
            id: "backpack".to_string(),
            display_name: "Backpack".to_string(),
            icon_ref: "/wallets/backpack.svg".to_string(),
            injection_path: "backpack".to_string(),
            marker: Some("isBackpack".to_string()),
            download_url: "https://backpack.app/downloads".to_string(),
        }
    }

    pub fn coinbase() -> Self {
        Self {
            id: "coinbase".to_string(),
            display_name: "Coinbase Wallet".to_string(),
            icon_ref: "/wallets/coinbase.svg".to_string(),
            injection_path: "coinbaseSolana".to_string(),
            marker: None,
            download_url: "https://www.coinbase.com/wallet/downloads".to_string(),
        }
    }

    pub fn builtin() -> Vec<Self> {
        vec![
            Self::phantom(),
            Self::solflare(),
            Self::backpack(),
            Self::coinbase(),
        ]
    }
}

/// One entry of a registry scan, as shown by the wallet picker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletDescriptor {
    pub id: String,
    pub display_name: String,
    pub icon_ref: String,
    pub is_installed: bool,
}

/// Where the registry looks for injected providers.
///
/// The browser implementation reads `window`; tests substitute fakes. A source
/// returns `None` both for "not injected" and for objects that do not satisfy
/// the [`WalletProvider`] shape.
pub trait ProviderSource {
    fn lookup(&self, kind: &WalletKind) -> Option<Arc<dyn WalletProvider>>;
}

/// A wallet that is installed right now, together with its live provider.
pub struct ResolvedWallet {
    pub descriptor: WalletDescriptor,
    pub provider: Arc<dyn WalletProvider>,
}

pub struct WalletRegistry {
    kinds: Vec<WalletKind>,
    preference: Vec<String>,
    source: Box<dyn ProviderSource>,
}

impl WalletRegistry {
    pub fn new(source: Box<dyn ProviderSource>, preference: Vec<String>) -> Self {
        Self::with_kinds(WalletKind::builtin(), source, preference)
    }

    pub fn with_kinds(
        kinds: Vec<WalletKind>,
        source: Box<dyn ProviderSource>,
        preference: Vec<String>,
    ) -> Self {
        let mut registry = Self {
            kinds: Vec::with_capacity(kinds.len()),
            preference,
            source,
        };
        for kind in kinds {
            registry.register(kind);
        }
        registry
    }

    /// Add a wallet kind. A kind with an id already present replaces it in place.
    pub fn register(&mut self, kind: WalletKind) {
        match self.kinds.iter_mut().find(|existing| existing.id == kind.id) {
            Some(existing) => *existing = kind,
            None => self.kinds.push(kind),
        }
    }

    /// Every known wallet with its current install state, in preference order.
    pub fn scan(&self) -> Vec<WalletDescriptor> {
        self.ordered_kinds()
            .into_iter()
            .map(|kind| WalletDescriptor {
                id: kind.id.clone(),
                display_name: kind.display_name.clone(),
                icon_ref: kind.icon_ref.clone(),
                is_installed: self.source.lookup(kind).is_some(),
            })
            .collect()
    }

    /// Only the wallets that are installed right now.
    pub fn detected(&self) -> Vec<WalletDescriptor> {
        self.scan()
            .into_iter()
            .filter(|descriptor| descriptor.is_installed)
            .collect()
    }

    /// Look up an installed wallet by id.
    pub fn resolve(&self, wallet_id: &str) -> WalletResult<ResolvedWallet> {
        let kind = self
            .kinds
            .iter()
            .find(|kind| kind.id == wallet_id)
            .ok_or_else(|| WalletError::NotInstalled(wallet_id.to_string()))?;

        let provider = self
            .source
            .lookup(kind)
            .ok_or_else(|| WalletError::NotInstalled(wallet_id.to_string()))?;

        Ok(ResolvedWallet {
            descriptor: WalletDescriptor {
                id: kind.id.clone(),
                display_name: kind.display_name.clone(),
                icon_ref: kind.icon_ref.clone(),
                is_installed: true,
            },
            provider,
        })
    }

    // Stable sort keeps registration order for equal ranks.
    fn ordered_kinds(&self) -> Vec<&WalletKind> {
        let mut ordered: Vec<&WalletKind> = self.kinds.iter().collect();
        ordered.sort_by_key(|kind| {
            self.preference
                .iter()
                .position(|id| *id == kind.id)
                .unwrap_or(usize::MAX)
        });
        ordered
    }
}
