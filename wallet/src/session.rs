use chrono::{DateTime, Utc};
use futures::future::{AbortHandle, Abortable};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::watch;

use crate::address::Address;
use crate::balance::{BalanceFetcher, RefreshTimer, RpcBalanceFetcher};
use crate::config::WalletConfig;
use crate::errors::{WalletError, WalletResult};
use crate::negotiator::{Connection, ConnectionNegotiator};
use crate::provider::{EventListener, ListenerId, ProviderEvent, WalletProvider};
use crate::registry::{ProviderSource, WalletDescriptor, WalletRegistry};
use crate::scheduler::Scheduler;

/// Published view of the wallet session. Every consumer reads this.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub connected: bool,
    pub connecting: bool,
    pub public_key: Option<Address>,
    /// Last known balance in SOL; 0 until the first successful fetch.
    pub balance: f64,
    pub wallet_name: Option<String>,
    pub balance_updated_at: Option<DateTime<Utc>>,
    pub detected_wallets: Vec<WalletDescriptor>,
}

impl Session {
    /// `connected`, `public_key` and `wallet_name` agree with each other.
    pub fn is_consistent(&self) -> bool {
        self.connected == self.public_key.is_some()
            && self.connected == self.wallet_name.is_some()
            && !(self.connecting && self.connected)
    }

    fn clear_connection(&mut self) {
        self.connected = false;
        self.public_key = None;
        self.wallet_name = None;
        self.balance = 0.0;
        self.balance_updated_at = None;
    }
}

struct ActiveConnection {
    epoch: u64,
    wallet_id: String,
    provider: Arc<dyn WalletProvider>,
    listener: ListenerId,
    refresh: Option<RefreshTimer>,
}

impl ActiveConnection {
    /// Stop background refresh and detach from the provider.
    fn release(&self) {
        if let Some(timer) = &self.refresh {
            timer.stop();
        }
        self.provider.off(self.listener);
    }
}

#[derive(Default)]
struct StoreState {
    session: Session,
    epoch: u64,
    pending_epoch: Option<u64>,
    active: Option<ActiveConnection>,
}

struct StoreInner {
    state: RwLock<StoreState>,
    publisher: watch::Sender<Session>,
    registry: WalletRegistry,
    negotiator: ConnectionNegotiator,
    fetcher: Box<dyn BalanceFetcher>,
    scheduler: Box<dyn Scheduler>,
    refresh_interval: Duration,
}

impl StoreInner {
    // Called with the write lock held so publications follow transition order.
    fn publish(&self, state: &StoreState) {
        self.publisher.send_replace(state.session.clone());
    }
}

/// Owns the wallet session and every transition applied to it.
///
/// Cloning is cheap; all clones drive the same session. Lock guards are never
/// held across an `.await` or while calling into a provider.
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<StoreInner>,
}

impl SessionStore {
    pub fn new(
        registry: WalletRegistry,
        fetcher: Box<dyn BalanceFetcher>,
        scheduler: Box<dyn Scheduler>,
        config: &WalletConfig,
    ) -> Self {
        let session = Session {
            detected_wallets: registry.detected(),
            ..Session::default()
        };
        let (publisher, _) = watch::channel(session.clone());

        // Providers and fetchers are single-threaded browser objects.
        #[allow(clippy::arc_with_non_send_sync)]
        let inner = Arc::new(StoreInner {
            state: RwLock::new(StoreState {
                session,
                ..StoreState::default()
            }),
            publisher,
            registry,
            negotiator: ConnectionNegotiator::new(config.connect_timeout()),
            fetcher,
            scheduler,
            refresh_interval: config.refresh_interval(),
        });

        Self { inner }
    }

    /// Build a store with the built-in wallet kinds and an RPC balance fetcher.
    pub fn from_config(
        config: &WalletConfig,
        source: Box<dyn ProviderSource>,
        scheduler: Box<dyn Scheduler>,
    ) -> WalletResult<Self> {
        config.validate()?;
        let registry = WalletRegistry::new(source, config.preferred_wallets.clone());
        let fetcher = RpcBalanceFetcher::from_config(config)?;
        Ok(Self::new(registry, Box::new(fetcher), scheduler, config))
    }

    pub fn snapshot(&self) -> Session {
        self.inner.state.read().session.clone()
    }

    /// Receiver that observes every published session.
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.inner.publisher.subscribe()
    }

    /// Id of the connected wallet kind, e.g. `phantom`.
    pub fn wallet_id(&self) -> Option<String> {
        let state = self.inner.state.read();
        state.active.as_ref().map(|active| active.wallet_id.clone())
    }

    /// Every known wallet with its install state, for "get a wallet" lists.
    pub fn known_wallets(&self) -> Vec<WalletDescriptor> {
        self.inner.registry.scan()
    }

    /// Re-detect injected providers and publish the result if it changed.
    pub fn rescan(&self) -> Vec<WalletDescriptor> {
        let detected = self.inner.registry.detected();
        let mut state = self.inner.state.write();
        if state.session.detected_wallets != detected {
            log::debug!("Detected wallets changed: {} installed", detected.len());
            state.session.detected_wallets = detected.clone();
            self.inner.publish(&state);
        }
        detected
    }

    /// Connect to the wallet identified by `wallet_id`.
    pub async fn connect(&self, wallet_id: &str) -> WalletResult<Connection> {
        let inner = &self.inner;

        let (epoch, wallet) = {
            let mut state = inner.state.write();
            if state.pending_epoch.is_some() {
                return Err(WalletError::AlreadyConnecting);
            }
            if let Some(name) = &state.session.wallet_name {
                return Err(WalletError::AlreadyConnected(name.clone()));
            }

            let wallet = inner.registry.resolve(wallet_id)?;

            state.epoch += 1;
            let epoch = state.epoch;
            state.pending_epoch = Some(epoch);
            state.session.connecting = true;
            inner.publish(&state);
            (epoch, wallet)
        };

        log::info!("Connecting to {}", wallet.descriptor.display_name);
        let listener = self.event_listener(epoch);
        let result = inner
            .negotiator
            .negotiate(wallet, inner.scheduler.as_ref(), listener)
            .await;

        let connection = {
            let mut state = inner.state.write();
            if state.pending_epoch != Some(epoch) {
                drop(state);
                log::info!("Connection attempt to {} superseded by reset", wallet_id);
                if let Ok(negotiated) = result {
                    negotiated.provider.off(negotiated.listener);
                    let provider = negotiated.provider;
                    inner.scheduler.spawn(Box::pin(async move {
                        let _ = provider.disconnect().await;
                    }));
                }
                return Err(WalletError::Cancelled);
            }

            state.pending_epoch = None;
            state.session.connecting = false;

            let negotiated = match result {
                Ok(negotiated) => negotiated,
                Err(err) => {
                    inner.publish(&state);
                    log::warn!("Connection to {} failed: {}", wallet_id, err);
                    return Err(err);
                }
            };

            let connection = negotiated.connection;
            state.session.connected = true;
            state.session.public_key = Some(connection.public_key.clone());
            state.session.wallet_name = Some(connection.wallet_name.clone());
            state.session.balance = 0.0;
            state.session.balance_updated_at = None;
            state.active = Some(ActiveConnection {
                epoch,
                wallet_id: negotiated.wallet_id,
                provider: negotiated.provider,
                listener: negotiated.listener,
                refresh: None,
            });
            inner.publish(&state);
            connection
        };

        log::info!(
            "Connected to {} as {}",
            connection.wallet_name,
            connection.public_key.short()
        );

        // Failures are logged inside; the session keeps its zero balance.
        let _ = self.refresh_for(epoch).await;
        self.start_refresh(epoch);

        Ok(connection)
    }

    /// Drop the current connection.
    ///
    /// A no-op when nothing is connected; refused while a connect is pending.
    pub async fn disconnect(&self) -> WalletResult<()> {
        let released = {
            let mut state = self.inner.state.write();
            if state.pending_epoch.is_some() {
                return Err(WalletError::ConnectionPending);
            }
            self.detach(&mut state, None)
        };

        let Some(connection) = released else {
            return Ok(());
        };

        log::info!("Disconnected from {}", connection.wallet_id);
        connection.release();
        if let Err(err) = connection.provider.disconnect().await {
            log::warn!("{} refused disconnect: {}", connection.wallet_id, err);
        }
        Ok(())
    }

    /// Fetch the balance now. Network failures keep the previous balance.
    pub async fn refresh_balance(&self) -> WalletResult<f64> {
        let epoch = {
            let state = self.inner.state.read();
            state
                .active
                .as_ref()
                .map(|active| active.epoch)
                .ok_or(WalletError::NotConnected)?
        };

        match self.refresh_for(epoch).await {
            Err(err) if err.is_transient() => Ok(self.snapshot().balance),
            other => other,
        }
    }

    /// Return to the initial state, abandoning any connection or attempt.
    pub fn reset(&self) {
        let released = {
            let mut state = self.inner.state.write();
            let released = state.active.take();
            state.pending_epoch = None;
            state.session = Session {
                detected_wallets: self.inner.registry.detected(),
                ..Session::default()
            };
            self.inner.publish(&state);
            released
        };

        if let Some(connection) = released {
            connection.release();
            let provider = connection.provider;
            self.inner.scheduler.spawn(Box::pin(async move {
                let _ = provider.disconnect().await;
            }));
        }
    }

    /// Take the active connection out of `state` and clear the session fields.
    ///
    /// With `epoch` set, only a connection from that attempt is detached.
    fn detach(&self, state: &mut StoreState, epoch: Option<u64>) -> Option<ActiveConnection> {
        let matches = match (&state.active, epoch) {
            (Some(active), Some(epoch)) => active.epoch == epoch,
            (Some(_), None) => true,
            (None, _) => false,
        };
        if !matches {
            return None;
        }

        let released = state.active.take();
        state.session.clear_connection();
        self.inner.publish(state);
        released
    }

    fn event_listener(&self, epoch: u64) -> EventListener {
        let weak: Weak<StoreInner> = Arc::downgrade(&self.inner);
        Box::new(move |event| {
            if let Some(inner) = weak.upgrade() {
                SessionStore { inner }.handle_event(epoch, event);
            }
        })
    }

    fn handle_event(&self, epoch: u64, event: ProviderEvent) {
        if !event.is_revocation() {
            if let ProviderEvent::AccountChanged(Some(key)) = event {
                self.switch_account(epoch, key);
            }
            return;
        }

        let released = {
            let mut state = self.inner.state.write();
            self.detach(&mut state, Some(epoch))
        };
        if let Some(connection) = released {
            log::info!("{} revoked access", connection.wallet_id);
            connection.release();
        }
    }

    fn switch_account(&self, epoch: u64, key: Address) {
        {
            let mut state = self.inner.state.write();
            let current = matches!(&state.active, Some(active) if active.epoch == epoch);
            if !current || state.session.public_key.as_ref() == Some(&key) {
                return;
            }
            log::info!("Account switched to {}", key.short());
            state.session.public_key = Some(key);
            state.session.balance = 0.0;
            state.session.balance_updated_at = None;
            self.inner.publish(&state);
        }

        let store = self.clone();
        self.inner.scheduler.spawn(Box::pin(async move {
            let _ = store.refresh_for(epoch).await;
        }));
    }

    /// Fetch and apply the balance for the connection opened at `epoch`.
    ///
    /// Results that arrive after a disconnect or account switch are dropped.
    async fn refresh_for(&self, epoch: u64) -> WalletResult<f64> {
        let key = {
            let state = self.inner.state.read();
            match (&state.active, &state.session.public_key) {
                (Some(active), Some(key)) if active.epoch == epoch => key.clone(),
                _ => return Err(WalletError::NotConnected),
            }
        };

        let balance = match self.inner.fetcher.fetch(&key).await {
            Ok(balance) => balance,
            Err(err) => {
                log::warn!("Balance refresh for {} failed: {}", key.short(), err);
                return Err(err);
            }
        };

        let mut state = self.inner.state.write();
        if !matches!(&state.active, Some(active) if active.epoch == epoch) {
            return Err(WalletError::NotConnected);
        }
        if state.session.public_key.as_ref() != Some(&key) {
            log::debug!("Dropping balance for previous account {}", key.short());
            return Ok(state.session.balance);
        }

        state.session.balance = balance;
        state.session.balance_updated_at = Some(Utc::now());
        self.inner.publish(&state);
        Ok(balance)
    }

    /// Spawn the periodic refresh loop for the connection opened at `epoch`.
    fn start_refresh(&self, epoch: u64) {
        let weak = Arc::downgrade(&self.inner);
        let interval = self.inner.refresh_interval;
        let (abort, registration) = AbortHandle::new_pair();
        let timer = RefreshTimer::new(abort);
        let ticker = timer.clone();

        let task = Abortable::new(
            async move {
                loop {
                    let tick = match weak.upgrade() {
                        Some(inner) => inner.scheduler.sleep(interval),
                        None => break,
                    };
                    tick.await;

                    if ticker.is_stopped() {
                        break;
                    }
                    let Some(inner) = weak.upgrade() else {
                        break;
                    };
                    // Network failures retry on the next tick. A stale epoch or a
                    // permanent error ends the loop.
                    match (SessionStore { inner }).refresh_for(epoch).await {
                        Ok(_) => {}
                        Err(err) if err.is_transient() => {}
                        Err(err) => {
                            log::debug!("Balance polling stopped: {}", err);
                            break;
                        }
                    }
                }
            },
            registration,
        );

        {
            let mut state = self.inner.state.write();
            match state.active.as_mut() {
                Some(active) if active.epoch == epoch => active.refresh = Some(timer),
                _ => {
                    timer.stop();
                    return;
                }
            }
        }

        self.inner.scheduler.spawn(Box::pin(async move {
            let _ = task.await;
        }));
    }
}
