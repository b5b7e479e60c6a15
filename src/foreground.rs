//! Foreground execution context.
//!
//! A single dedicated thread drives a current-thread tokio runtime and a
//! `LocalSet`. Jobs arrive over an unbounded channel and are started in the
//! order they were submitted; once started they interleave cooperatively at
//! their `.await` points. Every view notification runs here.

use std::future::Future;
use std::thread::{JoinHandle, ThreadId};

use futures::future::{FutureExt, LocalBoxFuture};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Name of the foreground thread.
pub const FOREGROUND_THREAD_NAME: &str = "foreground";

type Job = Box<dyn FnOnce() -> LocalBoxFuture<'static, ()> + Send>;

#[derive(Debug, Error, PartialEq)]
pub enum ForegroundError {
    #[error("Foreground loop has shut down")]
    Closed,
}

/// Cloneable handle for submitting work to the foreground thread.
#[derive(Clone)]
pub struct Foreground {
    jobs: mpsc::UnboundedSender<Job>,
    thread: ThreadId,
}

impl Foreground {
    /// Queue `job` on the foreground thread.
    ///
    /// The closure is sent across threads; the future it builds never leaves
    /// the foreground thread and so need not be `Send`.
    pub fn spawn<F, Fut>(&self, job: F) -> Result<(), ForegroundError>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + 'static,
    {
        let job: Job = Box::new(move || job().boxed_local());
        self.jobs.send(job).map_err(|_| ForegroundError::Closed)
    }

    /// Whether the caller is running on the foreground thread.
    pub fn is_current(&self) -> bool {
        std::thread::current().id() == self.thread
    }

    pub fn is_closed(&self) -> bool {
        self.jobs.is_closed()
    }
}

/// Owner of the foreground thread.
///
/// Shutting down drops every job still in flight, which cancels it at its
/// current `.await`.
pub struct ForegroundLoop {
    handle: Foreground,
    shutdown: CancellationToken,
    thread: Option<JoinHandle<()>>,
}

impl ForegroundLoop {
    /// Start the foreground thread.
    pub fn spawn() -> std::io::Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        let (tx, mut rx) = mpsc::unbounded_channel::<Job>();
        let shutdown = CancellationToken::new();
        let stop = shutdown.clone();

        // The foreground thread logs through whatever subscriber the spawner sees.
        let dispatch = tracing::dispatcher::get_default(|d| d.clone());

        let thread = std::thread::Builder::new()
            .name(FOREGROUND_THREAD_NAME.to_string())
            .spawn(move || {
                tracing::dispatcher::with_default(&dispatch, || {
                    let local = tokio::task::LocalSet::new();
                    local.block_on(&runtime, async move {
                        loop {
                            tokio::select! {
                                biased;
                                _ = stop.cancelled() => break,
                                job = rx.recv() => match job {
                                    Some(job) => {
                                        tokio::task::spawn_local(job());
                                    }
                                    None => break,
                                },
                            }
                        }
                    });
                    tracing::debug!("Foreground loop exited");
                });
            })?;

        let handle = Foreground {
            jobs: tx,
            thread: thread.thread().id(),
        };

        Ok(Self {
            handle,
            shutdown,
            thread: Some(thread),
        })
    }

    pub fn handle(&self) -> Foreground {
        self.handle.clone()
    }

    /// Stop the loop and wait for the thread to exit.
    pub fn shutdown(mut self) {
        self.stop_and_join();
    }

    fn stop_and_join(&mut self) {
        self.shutdown.cancel();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::warn!("Foreground thread panicked");
            }
        }
    }
}

impl Drop for ForegroundLoop {
    fn drop(&mut self) {
        self.stop_and_join();
    }
}
