//! Platform hooks for background work.
//!
//! The session never talks to a runtime directly: it spawns the balance
//! refresh loop and waits out timeouts through a [`Scheduler`]. Native hosts
//! use [`TokioScheduler`]; the browser crate provides its own implementation
//! over `spawn_local` and `setTimeout`.

use futures::future::LocalBoxFuture;
use std::time::Duration;

pub trait Scheduler {
    /// Run a future to completion in the background on the current thread.
    fn spawn(&self, task: LocalBoxFuture<'static, ()>);

    /// Resolve after `duration` has elapsed.
    fn sleep(&self, duration: Duration) -> LocalBoxFuture<'static, ()>;
}

/// Scheduler backed by the tokio current-thread runtime.
///
/// Spawning requires a [`tokio::task::LocalSet`] to be driving the caller.
#[cfg(feature = "native")]
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioScheduler;

#[cfg(feature = "native")]
impl Scheduler for TokioScheduler {
    fn spawn(&self, task: LocalBoxFuture<'static, ()>) {
        tokio::task::spawn_local(task);
    }

    fn sleep(&self, duration: Duration) -> LocalBoxFuture<'static, ()> {
        Box::pin(tokio::time::sleep(duration))
    }
}
