//! Adapters for provider objects injected on `window` by wallet extensions.

use async_trait::async_trait;
use js_sys::{Function, Object, Promise, Reflect};
use stake_wallet_lib::{
    Address, EventListener, ListenerId, ProviderError, ProviderEvent, ProviderResult,
    ProviderSource, WalletKind, WalletProvider,
};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::JsFuture;

const REQUIRED_METHODS: [&str; 3] = ["connect", "disconnect", "on"];

/// JS callbacks registered for one store listener.
struct Registered {
    account_changed: Closure<dyn FnMut(JsValue)>,
    disconnect: Closure<dyn FnMut(JsValue)>,
}

/// A wallet provider object, seen through the [`WalletProvider`] interface.
pub struct InjectedProvider {
    name: String,
    object: Object,
    listeners: RefCell<HashMap<u64, Registered>>,
    next_listener: Cell<u64>,
}

impl InjectedProvider {
    /// Wrap `value` if it has the methods every supported wallet exposes.
    pub fn from_object(name: &str, value: JsValue) -> Option<Self> {
        let object = value.dyn_into::<Object>().ok()?;
        let conforms = REQUIRED_METHODS
            .iter()
            .all(|method| lookup_function(&object, method).is_some());
        if !conforms {
            log::debug!("{} provider does not expose the expected methods", name);
            return None;
        }

        Some(Self {
            name: name.to_string(),
            object,
            listeners: RefCell::new(HashMap::new()),
            next_listener: Cell::new(0),
        })
    }

    /// Call `method` with no arguments, awaiting the result if it is a promise.
    async fn request(&self, method: &str) -> ProviderResult<JsValue> {
        let function = lookup_function(&self.object, method).ok_or_else(|| {
            ProviderError::Unavailable(format!("{} has no {} method", self.name, method))
        })?;

        let result = function.call0(&self.object).map_err(provider_error)?;
        if result.has_type::<Promise>() {
            JsFuture::from(result.unchecked_into::<Promise>())
                .await
                .map_err(provider_error)
        } else {
            Ok(result)
        }
    }

    fn subscribe(&self, event: &str, callback: &JsValue) {
        if let Some(on) = lookup_function(&self.object, "on") {
            if let Err(err) = on.call2(&self.object, &event.into(), callback) {
                log::warn!("{} refused {} listener: {:?}", self.name, event, err);
            }
        }
    }

    fn unsubscribe(&self, event: &str, callback: &JsValue) {
        let remove = lookup_function(&self.object, "removeListener")
            .or_else(|| lookup_function(&self.object, "off"));
        if let Some(remove) = remove {
            let _ = remove.call2(&self.object, &event.into(), callback);
        }
    }
}

#[async_trait(?Send)]
impl WalletProvider for InjectedProvider {
    async fn connect(&self) -> ProviderResult<Address> {
        let response = self.request("connect").await?;

        // Phantom answers with `{ publicKey }`; others only set the property.
        let from_response = Reflect::get(&response, &"publicKey".into())
            .ok()
            .and_then(|value| key_from_value(&value));
        from_response
            .or_else(|| self.public_key())
            .ok_or_else(|| ProviderError::Other(format!("{} returned no public key", self.name)))
    }

    async fn disconnect(&self) -> ProviderResult<()> {
        self.request("disconnect").await.map(|_| ())
    }

    fn public_key(&self) -> Option<Address> {
        let value = Reflect::get(&self.object, &"publicKey".into()).ok()?;
        key_from_value(&value)
    }

    fn on(&self, listener: EventListener) -> ListenerId {
        let listener: Rc<dyn Fn(ProviderEvent)> = Rc::from(listener);

        let account_changed = {
            let listener = listener.clone();
            Closure::<dyn FnMut(JsValue)>::new(move |value: JsValue| {
                listener(ProviderEvent::AccountChanged(key_from_value(&value)));
            })
        };
        let disconnect = Closure::<dyn FnMut(JsValue)>::new(move |_: JsValue| {
            listener(ProviderEvent::Disconnect);
        });

        self.subscribe("accountChanged", account_changed.as_ref());
        self.subscribe("disconnect", disconnect.as_ref());

        let id = self.next_listener.get() + 1;
        self.next_listener.set(id);
        self.listeners.borrow_mut().insert(
            id,
            Registered {
                account_changed,
                disconnect,
            },
        );
        ListenerId(id)
    }

    fn off(&self, id: ListenerId) {
        let Some(registered) = self.listeners.borrow_mut().remove(&id.0) else {
            return;
        };
        self.unsubscribe("accountChanged", registered.account_changed.as_ref());
        self.unsubscribe("disconnect", registered.disconnect.as_ref());

        // `off` may run inside one of these callbacks; free them afterwards.
        wasm_bindgen_futures::spawn_local(async move {
            drop(registered);
        });
    }
}

/// Finds providers by walking each kind's injection path from `window`.
#[derive(Debug, Clone, Copy, Default)]
pub struct WindowProviderSource;

impl ProviderSource for WindowProviderSource {
    fn lookup(&self, kind: &WalletKind) -> Option<Arc<dyn WalletProvider>> {
        let window = web_sys::window()?;
        let object = resolve_path(window.into(), &kind.injection_path)?;

        if let Some(marker) = &kind.marker {
            let marked = Reflect::get(&object, &marker.as_str().into())
                .ok()
                .and_then(|value| value.as_bool())
                .unwrap_or(false);
            if !marked {
                return None;
            }
        }

        let provider = InjectedProvider::from_object(&kind.display_name, object)?;
        #[allow(clippy::arc_with_non_send_sync)]
        let provider: Arc<dyn WalletProvider> = Arc::new(provider);
        Some(provider)
    }
}

/// Follow a dotted property path such as `phantom.solana`.
pub(crate) fn resolve_path(root: JsValue, path: &str) -> Option<JsValue> {
    path.split('.')
        .filter(|segment| !segment.is_empty())
        .try_fold(root, |current, segment| {
            if !current.is_object() {
                return None;
            }
            let next = Reflect::get(&current, &segment.into()).ok()?;
            if next.is_undefined() || next.is_null() {
                None
            } else {
                Some(next)
            }
        })
}

fn lookup_function(object: &Object, name: &str) -> Option<Function> {
    Reflect::get(object, &name.into())
        .ok()?
        .dyn_into::<Function>()
        .ok()
}

/// Read a public key from a string or a `PublicKey`-like object.
///
/// Returns `None` for null, undefined and anything that is not a valid key.
pub(crate) fn key_from_value(value: &JsValue) -> Option<Address> {
    if value.is_null() || value.is_undefined() {
        return None;
    }

    let text = match value.as_string() {
        Some(text) => text,
        None => {
            let object = value.dyn_ref::<Object>()?;
            let method = lookup_function(object, "toBase58")
                .or_else(|| lookup_function(object, "toString"))?;
            method.call0(value).ok()?.as_string()?
        }
    };

    match Address::parse(&text) {
        Ok(address) => Some(address),
        Err(err) => {
            log::warn!("Ignoring malformed public key from wallet: {}", err);
            None
        }
    }
}

/// Map a thrown value or rejected promise to a [`ProviderError`].
pub(crate) fn provider_error(value: JsValue) -> ProviderError {
    let field = |name: &str| {
        if value.is_object() {
            Reflect::get(&value, &name.into()).ok()
        } else {
            None
        }
    };

    let code = field("code")
        .and_then(|code| code.as_f64())
        .map(|code| code as i64);
    let message = field("message")
        .and_then(|message| message.as_string())
        .or_else(|| value.as_string())
        .unwrap_or_else(|| "wallet request failed".to_string());

    ProviderError::classify(code, &message)
}
