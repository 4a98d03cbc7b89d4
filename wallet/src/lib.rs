// lib.rs - Core library structure for the wallet connection layer

pub mod address;
pub mod balance;
pub mod config;
pub mod errors;
pub mod negotiator;
pub mod provider;
pub mod registry;
pub mod scheduler;
pub mod session;

// Re-export common types
pub use address::Address;
pub use balance::{lamports_to_sol, BalanceFetcher, RefreshTimer, RpcBalanceFetcher};
pub use config::{Cluster, Commitment, WalletConfig};
pub use errors::{WalletError, WalletResult};
pub use negotiator::{Connection, ConnectionNegotiator};
pub use provider::{
    EventListener, ListenerId, ProviderError, ProviderEvent, ProviderResult, WalletProvider,
};
pub use registry::{ProviderSource, ResolvedWallet, WalletDescriptor, WalletKind, WalletRegistry};
pub use scheduler::Scheduler;
#[cfg(feature = "native")]
pub use scheduler::TokioScheduler;
pub use session::{Session, SessionStore};
