//! Deferred computation handle and the safe-wait adapter.
//!
//! `Deferred::await_safe` is the fail-soft boundary of the crate: whatever
//! goes wrong in the background call (an error, a panic, a timeout) comes out
//! as `None` plus a warning in the log, never as an error in the caller.

use std::any::Any;
use std::time::Duration;

use thiserror::Error;
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::{CancellationToken, DropGuard};

/// Why a background computation produced no value.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Background operation failed: {0:#}")]
    Failed(anyhow::Error),

    #[error("Background operation panicked: {0}")]
    Panicked(String),

    #[error("Background operation was aborted")]
    Aborted,

    #[error("Background operation timed out after {0:?}")]
    TimedOut(Duration),
}

impl From<JoinError> for DispatchError {
    fn from(err: JoinError) -> Self {
        if err.is_panic() {
            DispatchError::Panicked(panic_message(err.into_panic()))
        } else {
            DispatchError::Aborted
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Handle to an in-flight background computation.
///
/// Consumed by exactly one wait. Dropping it while the computation is still
/// running cancels the token the computation was given.
#[must_use = "a deferred computation does nothing useful unless awaited"]
pub struct Deferred<T> {
    join: JoinHandle<anyhow::Result<T>>,
    _guard: DropGuard,
}

impl<T> Deferred<T> {
    pub(crate) fn new(join: JoinHandle<anyhow::Result<T>>, cancel: CancellationToken) -> Self {
        Self {
            join,
            _guard: cancel.drop_guard(),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Wait for the computation and surface its failure.
    pub async fn join(mut self) -> Result<T, DispatchError> {
        match (&mut self.join).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => Err(DispatchError::Failed(err)),
            Err(err) => Err(err.into()),
        }
    }

    /// Wait for the computation, turning any failure into `None`.
    pub async fn await_safe(self) -> Option<T> {
        absorb(self.join().await)
    }

    /// Like [`Deferred::await_safe`], but gives up after `limit` if one is set.
    ///
    /// Giving up drops the handle, which cancels the background call.
    pub async fn await_safe_within(self, limit: Option<Duration>) -> Option<T> {
        let Some(limit) = limit else {
            return self.await_safe().await;
        };
        let outcome = match tokio::time::timeout(limit, self.join()).await {
            Ok(result) => result,
            Err(_) => Err(DispatchError::TimedOut(limit)),
        };
        absorb(outcome)
    }
}

fn absorb<T>(outcome: Result<T, DispatchError>) -> Option<T> {
    match outcome {
        Ok(value) => Some(value),
        Err(err) => {
            tracing::warn!(error = %err, "Background operation produced no data");
            None
        }
    }
}
