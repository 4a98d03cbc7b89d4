//! JavaScript surface of the wallet session.

use futures::future::{abortable, AbortHandle};
use js_sys::{Function, Promise, Reflect};
use serde::Serialize;
use serde_wasm_bindgen::Serializer;
use stake_wallet_lib::{SessionStore, WalletConfig, WalletError};
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::future_to_promise;
use web_sys::{Document, Event};

use crate::injected::WindowProviderSource;
use crate::scheduler::BrowserScheduler;

/// Convert a [`WalletError`] into a JS `Error` carrying a stable `code`.
pub(crate) fn to_js_error(err: &WalletError) -> JsValue {
    let error = js_sys::Error::new(&err.to_string());
    let _ = Reflect::set(&error, &"code".into(), &err.code().into());
    error.into()
}

// Plain objects with `null` for missing fields, as consumers compare them.
fn to_js<T: Serialize>(value: &T) -> Result<JsValue, JsValue> {
    value
        .serialize(&Serializer::json_compatible())
        .map_err(|e| to_js_error(&WalletError::ConfigError(e.to_string())))
}

struct VisibilityHook {
    document: Document,
    callback: Closure<dyn FnMut(Event)>,
}

impl Drop for VisibilityHook {
    fn drop(&mut self) {
        let _ = self.document.remove_event_listener_with_callback(
            "visibilitychange",
            self.callback.as_ref().unchecked_ref(),
        );
    }
}

/// Rescan whenever the tab becomes visible; extensions may have been
/// installed or enabled meanwhile.
fn watch_visibility(store: SessionStore) -> Option<VisibilityHook> {
    let document = web_sys::window()?.document()?;
    let target = document.clone();
    let callback = Closure::<dyn FnMut(Event)>::new(move |_: Event| {
        if !target.hidden() {
            store.rescan();
        }
    });

    document
        .add_event_listener_with_callback("visibilitychange", callback.as_ref().unchecked_ref())
        .ok()?;
    Some(VisibilityHook { document, callback })
}

/// Wallet session for one page.
#[wasm_bindgen]
pub struct WalletSession {
    store: SessionStore,
    _visibility: Option<VisibilityHook>,
}

#[wasm_bindgen]
impl WalletSession {
    /// Create a session. `config` is optional; missing fields use defaults.
    #[wasm_bindgen(constructor)]
    pub fn new(config: JsValue) -> Result<WalletSession, JsValue> {
        let config: WalletConfig = if config.is_undefined() || config.is_null() {
            WalletConfig::default()
        } else {
            serde_wasm_bindgen::from_value(config)
                .map_err(|e| to_js_error(&WalletError::ConfigError(e.to_string())))?
        };

        let store = SessionStore::from_config(
            &config,
            Box::new(WindowProviderSource),
            Box::new(BrowserScheduler),
        )
        .map_err(|e| to_js_error(&e))?;

        log::info!(
            "Wallet session ready on {}, {} wallet(s) detected",
            config.endpoint(),
            store.snapshot().detected_wallets.len()
        );

        Ok(WalletSession {
            _visibility: watch_visibility(store.clone()),
            store,
        })
    }

    /// Resolves to `{ publicKey, walletName }`.
    pub fn connect(&self, wallet_id: String) -> Promise {
        let store = self.store.clone();
        future_to_promise(async move {
            let connection = store
                .connect(&wallet_id)
                .await
                .map_err(|e| to_js_error(&e))?;
            to_js(&connection)
        })
    }

    pub fn disconnect(&self) -> Promise {
        let store = self.store.clone();
        future_to_promise(async move {
            store.disconnect().await.map_err(|e| to_js_error(&e))?;
            Ok(JsValue::UNDEFINED)
        })
    }

    /// Fetch the balance now; resolves to SOL.
    pub fn refresh(&self) -> Promise {
        let store = self.store.clone();
        future_to_promise(async move {
            let balance = store.refresh_balance().await.map_err(|e| to_js_error(&e))?;
            Ok(JsValue::from_f64(balance))
        })
    }

    pub fn rescan(&self) -> Result<JsValue, JsValue> {
        to_js(&self.store.rescan())
    }

    #[wasm_bindgen(js_name = knownWallets)]
    pub fn known_wallets(&self) -> Result<JsValue, JsValue> {
        to_js(&self.store.known_wallets())
    }

    pub fn snapshot(&self) -> Result<JsValue, JsValue> {
        to_js(&self.store.snapshot())
    }

    /// Call `callback` with the current session and again after every change.
    pub fn subscribe(&self, callback: Function) -> Result<Subscription, JsValue> {
        let mut receiver = self.store.subscribe();
        let current = receiver.borrow_and_update().clone();
        callback.call1(&JsValue::NULL, &to_js(&current)?)?;

        let (task, abort) = abortable(async move {
            while receiver.changed().await.is_ok() {
                let session = receiver.borrow_and_update().clone();
                match to_js(&session) {
                    Ok(value) => {
                        if let Err(err) = callback.call1(&JsValue::NULL, &value) {
                            log::warn!("Session subscriber threw: {:?}", err);
                        }
                    }
                    Err(err) => log::error!("Failed to convert session: {:?}", err),
                }
            }
        });
        wasm_bindgen_futures::spawn_local(async move {
            let _ = task.await;
        });

        Ok(Subscription { abort })
    }

    /// Drop any connection or pending attempt and start over.
    pub fn reset(&self) {
        self.store.reset();
    }
}

/// Handle returned by `WalletSession.subscribe`.
#[wasm_bindgen]
pub struct Subscription {
    abort: AbortHandle,
}

#[wasm_bindgen]
impl Subscription {
    pub fn unsubscribe(&self) {
        self.abort.abort();
    }
}
