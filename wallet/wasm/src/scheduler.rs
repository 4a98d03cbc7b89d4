use futures::future::LocalBoxFuture;
use js_sys::Promise;
use stake_wallet_lib::Scheduler;
use std::time::Duration;
use wasm_bindgen_futures::JsFuture;

/// Scheduler for the browser event loop: `spawn_local` plus `setTimeout`.
#[derive(Debug, Clone, Copy, Default)]
pub struct BrowserScheduler;

impl Scheduler for BrowserScheduler {
    fn spawn(&self, task: LocalBoxFuture<'static, ()>) {
        wasm_bindgen_futures::spawn_local(task);
    }

    fn sleep(&self, duration: Duration) -> LocalBoxFuture<'static, ()> {
        let millis = duration.as_millis().min(i32::MAX as u128) as i32;
        Box::pin(async move {
            // Without a window the timer never fires.
            let promise = Promise::new(&mut |resolve, _reject| {
                if let Some(window) = web_sys::window() {
                    let _ = window
                        .set_timeout_with_callback_and_timeout_and_arguments_0(&resolve, millis);
                }
            });
            let _ = JsFuture::from(promise).await;
        })
    }
}
