//! Connect handshake with a single provider.
//!
//! The negotiator holds no state: the one-attempt-at-a-time rule is enforced
//! by the session store, so several surfaces may share one negotiator.

use futures::future::{self, Either, LocalBoxFuture};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::address::Address;
use crate::errors::{WalletError, WalletResult};
use crate::provider::{EventListener, ListenerId, ProviderError, ProviderResult, WalletProvider};
use crate::registry::ResolvedWallet;
use crate::scheduler::Scheduler;

/// Outcome of a successful handshake, as returned to `connect` callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    pub public_key: Address,
    pub wallet_name: String,
}

/// A negotiated connection plus the listener that must live as long as it.
pub struct Negotiated {
    pub connection: Connection,
    pub wallet_id: String,
    pub provider: Arc<dyn WalletProvider>,
    pub listener: ListenerId,
}

#[derive(Debug, Clone, Copy)]
pub struct ConnectionNegotiator {
    timeout: Duration,
}

impl ConnectionNegotiator {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Run the approval handshake against `wallet`.
    ///
    /// On success the provider already has `listener` attached; the caller is
    /// responsible for detaching it with the returned id. After a timeout the
    /// handshake keeps running on `scheduler`, and a late approval is answered
    /// with `disconnect`.
    pub async fn negotiate(
        &self,
        wallet: ResolvedWallet,
        scheduler: &dyn Scheduler,
        listener: EventListener,
    ) -> WalletResult<Negotiated> {
        let ResolvedWallet {
            descriptor,
            provider,
        } = wallet;

        let contender = provider.clone();
        let handshake: LocalBoxFuture<'static, ProviderResult<Address>> =
            Box::pin(async move { contender.connect().await });
        let deadline = scheduler.sleep(self.timeout);

        let public_key = match future::select(handshake, deadline).await {
            Either::Left((Ok(key), _)) => key,
            Either::Left((Err(err), _)) => return Err(map_provider_error(err)),
            Either::Right(((), handshake)) => {
                log::warn!(
                    "{} did not answer within {:?}",
                    descriptor.display_name,
                    self.timeout
                );
                let name = descriptor.display_name;
                scheduler.spawn(Box::pin(async move {
                    if handshake.await.is_ok() {
                        log::info!("{} approved after the timeout, disconnecting", name);
                        if let Err(err) = provider.disconnect().await {
                            log::warn!("{} refused to disconnect: {}", name, err);
                        }
                    }
                }));
                return Err(WalletError::Timeout);
            }
        };

        let listener = provider.on(listener);

        Ok(Negotiated {
            connection: Connection {
                public_key,
                wallet_name: descriptor.display_name,
            },
            wallet_id: descriptor.id,
            provider,
            listener,
        })
    }
}

fn map_provider_error(err: ProviderError) -> WalletError {
    match err {
        ProviderError::Rejected => WalletError::UserRejected,
        ProviderError::Unavailable(msg) | ProviderError::Other(msg) => {
            WalletError::ProviderError(msg)
        }
    }
}
