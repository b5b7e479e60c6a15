//! Background execution context.
//!
//! A multi-thread tokio runtime whose blocking pool runs data source calls.
//! Dispatches are independent and unordered.

use std::time::Duration;

use tokio::runtime::{Handle, Runtime};
use tokio_util::sync::CancellationToken;

use crate::deferred::Deferred;

/// Prefix for background worker thread names.
pub const BACKGROUND_THREAD_NAME: &str = "background";

/// Cloneable handle for dispatching blocking work.
#[derive(Clone, Debug)]
pub struct Background {
    handle: Handle,
}

impl Background {
    pub fn from_handle(handle: Handle) -> Self {
        Self { handle }
    }

    /// Handle onto the runtime the caller is currently running in.
    pub fn try_current() -> Result<Self, tokio::runtime::TryCurrentError> {
        Handle::try_current().map(Self::from_handle)
    }

    /// Run `op` on the blocking pool and return a handle to its result.
    ///
    /// `op` receives `cancel` so it can stop early. Dropping the returned
    /// `Deferred` before it resolves cancels that token. If the token is
    /// already cancelled when a worker picks the job up, `op` is skipped.
    pub fn dispatch<T, F>(&self, cancel: CancellationToken, op: F) -> Deferred<T>
    where
        T: Send + 'static,
        F: FnOnce(CancellationToken) -> anyhow::Result<T> + Send + 'static,
    {
        let token = cancel.clone();
        let join = self.handle.spawn_blocking(move || {
            if token.is_cancelled() {
                anyhow::bail!("dispatch cancelled before it started");
            }
            op(token)
        });
        Deferred::new(join, cancel)
    }
}

/// Owner of the background runtime.
pub struct BackgroundPool {
    runtime: Runtime,
}

impl BackgroundPool {
    /// Build a pool with `workers` async workers and a blocking pool sized
    /// for long-running loads.
    pub fn new(workers: usize) -> std::io::Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(workers.max(1))
            .max_blocking_threads(workers.max(1) * 16)
            .thread_name(BACKGROUND_THREAD_NAME)
            .enable_all()
            .build()?;
        Ok(Self { runtime })
    }

    pub fn handle(&self) -> Background {
        Background::from_handle(self.runtime.handle().clone())
    }

    /// Drive `future` to completion on the pool's runtime.
    pub fn block_on<F: std::future::Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }

    /// Shut down, giving outstanding blocking calls up to `timeout` to return.
    pub fn shutdown(self, timeout: Duration) {
        self.runtime.shutdown_timeout(timeout);
    }
}
