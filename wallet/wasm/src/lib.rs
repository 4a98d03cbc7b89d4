//! Stake Wallet WebAssembly Library
//!
//! Browser bindings for the wallet session: injected provider adapters, a
//! `setTimeout` scheduler and the `WalletSession` class exported to JS.

use wasm_bindgen::prelude::*;

mod bindings;
mod injected;
mod logger;
mod scheduler;

pub use bindings::{Subscription, WalletSession};
pub use injected::{InjectedProvider, WindowProviderSource};
pub use scheduler::BrowserScheduler;

#[wasm_bindgen]
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

// Module initialization
#[wasm_bindgen(start)]
pub fn main() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
    logger::init(log::LevelFilter::Info);
    log::info!("Stake Wallet WASM module loaded");
}
