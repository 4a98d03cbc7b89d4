#![allow(dead_code, clippy::arc_with_non_send_sync)]

use async_trait::async_trait;
use stake_wallet_lib::{
    Address, BalanceFetcher, EventListener, ListenerId, ProviderError, ProviderEvent,
    ProviderResult, ProviderSource, SessionStore, TokioScheduler, WalletConfig, WalletError,
    WalletKind, WalletProvider, WalletRegistry, WalletResult,
};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::future::Future;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;

pub fn key(seed: u8) -> Address {
    Address::from_bytes(&[seed; 32]).unwrap()
}

pub enum Approval {
    Approve(Address),
    Reject,
    Fail(&'static str),
    Never,
    /// Resolved later through the sender returned by [`MockProvider::gated`].
    Gated(oneshot::Receiver<ProviderResult<Address>>),
}

/// In-memory wallet that records every call made against it.
pub struct MockProvider {
    approval: RefCell<Option<Approval>>,
    listeners: RefCell<Vec<(ListenerId, Rc<dyn Fn(ProviderEvent)>)>>,
    next_listener: Cell<u64>,
    pub connect_calls: Cell<u32>,
    pub disconnect_calls: Cell<u32>,
    public_key: RefCell<Option<Address>>,
}

impl MockProvider {
    pub fn new(approval: Approval) -> Arc<Self> {
        Arc::new(Self {
            approval: RefCell::new(Some(approval)),
            listeners: RefCell::new(Vec::new()),
            next_listener: Cell::new(0),
            connect_calls: Cell::new(0),
            disconnect_calls: Cell::new(0),
            public_key: RefCell::new(None),
        })
    }

    pub fn approving(key: Address) -> Arc<Self> {
        Self::new(Approval::Approve(key))
    }

    pub fn gated() -> (Arc<Self>, oneshot::Sender<ProviderResult<Address>>) {
        let (tx, rx) = oneshot::channel();
        (Self::new(Approval::Gated(rx)), tx)
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.borrow().len()
    }

    /// Deliver an event to every attached listener, like the extension would.
    pub fn emit(&self, event: ProviderEvent) {
        // Listeners may detach themselves while being called.
        let listeners: Vec<_> = self
            .listeners
            .borrow()
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();
        for listener in listeners {
            listener(event.clone());
        }
    }
}

#[async_trait(?Send)]
impl WalletProvider for MockProvider {
    async fn connect(&self) -> ProviderResult<Address> {
        self.connect_calls.set(self.connect_calls.get() + 1);
        let approval = self.approval.borrow_mut().take();
        let result = match approval {
            Some(Approval::Approve(key)) => {
                // Keep approving on later connects.
                *self.approval.borrow_mut() = Some(Approval::Approve(key.clone()));
                Ok(key)
            }
            Some(Approval::Reject) => Err(ProviderError::Rejected),
            Some(Approval::Fail(msg)) => Err(ProviderError::Other(msg.to_string())),
            Some(Approval::Gated(rx)) => rx
                .await
                .unwrap_or_else(|_| Err(ProviderError::Unavailable("gate dropped".into()))),
            Some(Approval::Never) | None => futures::future::pending().await,
        };
        if let Ok(key) = &result {
            *self.public_key.borrow_mut() = Some(key.clone());
        }
        result
    }

    async fn disconnect(&self) -> ProviderResult<()> {
        self.disconnect_calls.set(self.disconnect_calls.get() + 1);
        *self.public_key.borrow_mut() = None;
        Ok(())
    }

    fn public_key(&self) -> Option<Address> {
        self.public_key.borrow().clone()
    }

    fn on(&self, listener: EventListener) -> ListenerId {
        let id = ListenerId(self.next_listener.get() + 1);
        self.next_listener.set(id.0);
        self.listeners.borrow_mut().push((id, Rc::from(listener)));
        id
    }

    fn off(&self, id: ListenerId) {
        self.listeners.borrow_mut().retain(|(existing, _)| *existing != id);
    }
}

/// Stand-in for `window`: a mutable set of injected providers.
#[derive(Clone, Default)]
pub struct MockSource {
    injected: Rc<RefCell<HashMap<String, Arc<MockProvider>>>>,
    pub lookups: Rc<Cell<u32>>,
}

impl MockSource {
    pub fn with(wallets: &[(&str, Arc<MockProvider>)]) -> Self {
        let source = Self::default();
        for (id, provider) in wallets {
            source.inject(id, provider.clone());
        }
        source
    }

    pub fn inject(&self, id: &str, provider: Arc<MockProvider>) {
        self.injected.borrow_mut().insert(id.to_string(), provider);
    }

    pub fn remove(&self, id: &str) {
        self.injected.borrow_mut().remove(id);
    }
}

impl ProviderSource for MockSource {
    fn lookup(&self, kind: &WalletKind) -> Option<Arc<dyn WalletProvider>> {
        self.lookups.set(self.lookups.get() + 1);
        let provider = self.injected.borrow().get(&kind.id).cloned()?;
        Some(provider as Arc<dyn WalletProvider>)
    }
}

#[derive(Default)]
struct FetcherState {
    balances: HashMap<String, f64>,
    failure: Option<WalletError>,
    delay: Option<Duration>,
    calls: Vec<Address>,
}

/// Balance source with scripted answers per public key.
#[derive(Clone, Default)]
pub struct MockFetcher {
    state: Rc<RefCell<FetcherState>>,
}

impl MockFetcher {
    pub fn set_balance(&self, key: &Address, sol: f64) {
        self.state
            .borrow_mut()
            .balances
            .insert(key.to_string(), sol);
    }

    pub fn set_failing(&self, failing: bool) {
        let failure = failing.then(|| WalletError::FetchError("HTTP error: 503".to_string()));
        self.state.borrow_mut().failure = failure;
    }

    /// Fail every fetch with `err` from now on.
    pub fn fail_with(&self, err: WalletError) {
        self.state.borrow_mut().failure = Some(err);
    }

    pub fn set_delay(&self, delay: Duration) {
        self.state.borrow_mut().delay = Some(delay);
    }

    pub fn calls(&self) -> usize {
        self.state.borrow().calls.len()
    }

    pub fn calls_for(&self, key: &Address) -> usize {
        self.state
            .borrow()
            .calls
            .iter()
            .filter(|called| *called == key)
            .count()
    }
}

#[async_trait(?Send)]
impl BalanceFetcher for MockFetcher {
    async fn fetch(&self, public_key: &Address) -> WalletResult<f64> {
        let delay = {
            let mut state = self.state.borrow_mut();
            state.calls.push(public_key.clone());
            state.delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let state = self.state.borrow();
        if let Some(err) = &state.failure {
            return Err(err.clone());
        }
        Ok(state
            .balances
            .get(public_key.as_str())
            .copied()
            .unwrap_or(0.0))
    }
}

pub fn test_config() -> WalletConfig {
    WalletConfig {
        refresh_interval_ms: 30_000,
        connect_timeout_ms: 60_000,
        ..WalletConfig::default()
    }
}

pub fn store(source: &MockSource, fetcher: &MockFetcher) -> SessionStore {
    let config = test_config();
    let registry = WalletRegistry::new(Box::new(source.clone()), config.preferred_wallets.clone());
    SessionStore::new(
        registry,
        Box::new(fetcher.clone()),
        Box::new(TokioScheduler),
        &config,
    )
}

/// Run `test` on a LocalSet so the store can spawn its refresh loop.
pub async fn local<F: Future>(test: F) -> F::Output {
    tokio::task::LocalSet::new().run_until(test).await
}

/// Let spawned tasks run without advancing the clock.
pub async fn settle() {
    for _ in 0..8 {
        tokio::task::yield_now().await;
    }
}
