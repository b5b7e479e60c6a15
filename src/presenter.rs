//! Task orchestrator.
//!
//! `Presenter::start` submits one run to the foreground:
//!
//! ```text
//! foreground: view.show_loading()
//! background: source.load_cancellable(param)   -> Deferred<String>
//! foreground: deferred.await_safe_within(..)    -> Option<String>
//! foreground: view.show_data(result)
//! ```
//!
//! `Presenter::stop` cancels the run. Cancellation wins over completion: the
//! sequence races the run's token, and every notification is gated on the run
//! still being live, so nothing reaches the view once `stop` has returned.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use thiserror::Error;

use crate::background::Background;
use crate::config::Config;
use crate::foreground::{Foreground, ForegroundError};
use crate::source::DataSource;
use crate::task::{TaskHandle, TaskState};
use crate::view::View;

/// Parameter handed to the data source when none is configured.
pub const DEFAULT_TASK_PARAM: &str = "Task";

#[derive(Debug, Error, PartialEq)]
pub enum PresenterError {
    #[error("Cannot start presenting: {0}")]
    ForegroundClosed(#[from] ForegroundError),
}

/// Externally visible presenter state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenterState {
    Idle,
    Running,
    Completed,
    Cancelled,
}

impl From<TaskState> for PresenterState {
    fn from(state: TaskState) -> Self {
        match state {
            TaskState::Pending => PresenterState::Idle,
            TaskState::Running => PresenterState::Running,
            TaskState::Completed => PresenterState::Completed,
            TaskState::Cancelled => PresenterState::Cancelled,
        }
    }
}

/// Everything one run needs, moved into the foreground job.
#[derive(Clone)]
struct RunContext {
    view: Arc<dyn View>,
    source: Arc<dyn DataSource>,
    background: Background,
    param: String,
    await_timeout: Option<Duration>,
}

pub struct Presenter {
    ctx: RunContext,
    foreground: Foreground,
    current: Mutex<Option<TaskHandle>>,
}

impl Presenter {
    pub fn new(
        view: Arc<dyn View>,
        source: Arc<dyn DataSource>,
        foreground: Foreground,
        background: Background,
    ) -> Self {
        Self {
            ctx: RunContext {
                view,
                source,
                background,
                param: DEFAULT_TASK_PARAM.to_string(),
                await_timeout: None,
            },
            foreground,
            current: Mutex::new(None),
        }
    }

    /// Apply the task parameter and safe-wait timeout from `config`.
    pub fn with_config(self, config: &Config) -> Self {
        self.with_param(config.task_param.clone())
            .with_await_timeout(config.await_timeout)
    }

    pub fn with_param(mut self, param: impl Into<String>) -> Self {
        self.ctx.param = param.into();
        self
    }

    /// Bound the safe-wait. A run that exceeds it shows no data.
    pub fn with_await_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.ctx.await_timeout = timeout;
        self
    }

    /// Start a run, cancelling the previous one if it is still live.
    pub fn start(&self) -> Result<TaskHandle, PresenterError> {
        let handle = TaskHandle::new();
        handle.mark_running();

        let previous = self.lock_current().replace(handle.clone());
        if let Some(previous) = previous {
            if previous.cancel() {
                tracing::info!(
                    task_id = %previous.id(),
                    "Cancelled previous run before restarting"
                );
            }
        }

        tracing::debug!(task_id = %handle.id(), param = %self.ctx.param, "Presenter starting run");

        let ctx = self.ctx.clone();
        let run = handle.clone();
        if let Err(err) = self.foreground.spawn(move || run_sequence(ctx, run)) {
            handle.cancel();
            tracing::warn!(task_id = %handle.id(), error = %err, "Foreground unavailable");
            return Err(err.into());
        }

        Ok(handle)
    }

    /// Cancel the current run. A no-op when idle or already finished.
    pub fn stop(&self) {
        let current = self.lock_current().clone();
        if let Some(handle) = current {
            if handle.cancel() {
                tracing::info!(task_id = %handle.id(), "Presenter stopped");
            }
        }
    }

    pub fn state(&self) -> PresenterState {
        self.lock_current()
            .as_ref()
            .map(|h| h.state().into())
            .unwrap_or(PresenterState::Idle)
    }

    fn lock_current(&self) -> std::sync::MutexGuard<'_, Option<TaskHandle>> {
        self.current.lock().unwrap_or_else(|e| e.into_inner())
    }
}

async fn run_sequence(ctx: RunContext, handle: TaskHandle) {
    let task_id = handle.id();

    let sequence = async {
        handle.notify(|| ctx.view.show_loading());

        let source = Arc::clone(&ctx.source);
        let param = ctx.param.clone();
        let deferred = ctx.background.dispatch(handle.child_token(), move |cancel| {
            Ok(source.load_cancellable(&param, &cancel)?)
        });

        let result = deferred.await_safe_within(ctx.await_timeout).await;

        handle.notify(|| ctx.view.show_data(result.as_deref()));
    };

    tokio::select! {
        biased;
        _ = handle.cancelled() => {
            tracing::debug!(task_id = %task_id, "Run cancelled");
        }
        _ = sequence => {
            if handle.complete() {
                tracing::debug!(task_id = %task_id, "Run completed");
            }
        }
    }
}
