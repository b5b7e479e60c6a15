//! Task handle for one orchestrated run.
//!
//! # State Machine
//! ```text
//! Pending -> Running -> Completed
//!        \          \-> Cancelled
//!         \-> Cancelled
//! ```
//!
//! # Invariants
//! - Once terminal, the state never changes again.
//! - Only the owning presenter drives transitions; holders of a handle can
//!   observe the run but not complete it.
//! - Notifications pass through [`TaskHandle::notify`]. A `cancel()` that
//!   returns has either waited out an in-progress notification on another
//!   thread or prevented it. A view may cancel its own run from inside a
//!   notification.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::ThreadId;

use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Status of a run in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// Created but not yet started
    Pending,
    /// Sequence submitted to the foreground
    Running,
    /// Sequence finished normally
    Completed,
    /// Cancelled before finishing
    Cancelled,
}

impl TaskState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskState::Completed | TaskState::Cancelled)
    }
}

struct Gate {
    state: TaskState,
    /// Thread currently inside a notification, if any
    notifying: Option<ThreadId>,
}

struct Inner {
    id: Uuid,
    cancel: CancellationToken,
    gate: Mutex<Gate>,
    idle: Condvar,
    finished: Notify,
}

/// Cancellable handle for one run. Clones share the same run.
#[derive(Clone)]
pub struct TaskHandle {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for TaskHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskHandle")
            .field("id", &self.inner.id)
            .field("state", &self.state())
            .finish()
    }
}

impl TaskHandle {
    pub(crate) fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                id: Uuid::new_v4(),
                cancel: CancellationToken::new(),
                gate: Mutex::new(Gate {
                    state: TaskState::Pending,
                    notifying: None,
                }),
                idle: Condvar::new(),
                finished: Notify::new(),
            }),
        }
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub fn state(&self) -> TaskState {
        self.lock().state
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancel.is_cancelled()
    }

    /// Token for nested work. Cancelled whenever this run is.
    pub(crate) fn child_token(&self) -> CancellationToken {
        self.inner.cancel.child_token()
    }

    /// Resolves once the run is cancelled.
    pub async fn cancelled(&self) {
        self.inner.cancel.cancelled().await
    }

    /// `Pending -> Running`. Returns `false` from any other state.
    pub(crate) fn mark_running(&self) -> bool {
        let mut gate = self.lock();
        if gate.state != TaskState::Pending {
            return false;
        }
        gate.state = TaskState::Running;
        true
    }

    /// `Running -> Completed`. Returns `false` from any other state.
    pub(crate) fn complete(&self) -> bool {
        let mut gate = self.lock();
        if gate.state != TaskState::Running {
            return false;
        }
        gate.state = TaskState::Completed;
        drop(gate);
        self.inner.finished.notify_waiters();
        true
    }

    /// Cancel the run unless it already finished. Returns whether this call
    /// did the cancelling.
    ///
    /// Blocks while another thread is inside a notification of this run.
    pub(crate) fn cancel(&self) -> bool {
        let mut gate = self.lock();
        if gate.state.is_terminal() {
            return false;
        }
        gate.state = TaskState::Cancelled;
        self.inner.cancel.cancel();

        let me = std::thread::current().id();
        while matches!(gate.notifying, Some(t) if t != me) {
            gate = self
                .inner
                .idle
                .wait(gate)
                .unwrap_or_else(|e| e.into_inner());
        }
        drop(gate);
        self.inner.finished.notify_waiters();
        true
    }

    /// Run `f` only while the run is live.
    ///
    /// The state lock is not held while `f` runs. A panic in `f` is logged
    /// and reported as `None`; the run carries on.
    pub(crate) fn notify<R>(&self, f: impl FnOnce() -> R) -> Option<R> {
        {
            let mut gate = self.lock();
            if gate.state != TaskState::Running {
                return None;
            }
            gate.notifying = Some(std::thread::current().id());
        }

        let out = catch_unwind(AssertUnwindSafe(f));

        self.lock().notifying = None;
        self.inner.idle.notify_all();

        match out {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::error!(task_id = %self.inner.id, "View panicked during notification");
                None
            }
        }
    }

    /// Wait until the run reaches a terminal state.
    pub async fn wait(&self) -> TaskState {
        loop {
            let finished = self.inner.finished.notified();
            let state = self.state();
            if state.is_terminal() {
                return state;
            }
            finished.await;
        }
    }

    fn lock(&self) -> MutexGuard<'_, Gate> {
        self.inner.gate.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn new_handle_is_pending() {
        let handle = TaskHandle::new();
        assert_eq!(handle.state(), TaskState::Pending);
        assert!(!handle.is_cancelled());
    }

    #[test]
    fn running_then_completed() {
        let handle = TaskHandle::new();
        assert!(handle.mark_running());
        assert!(!handle.mark_running());
        assert!(handle.complete());
        assert_eq!(handle.state(), TaskState::Completed);
    }

    #[test]
    fn cancel_after_completion_is_a_no_op() {
        let handle = TaskHandle::new();
        handle.mark_running();
        handle.complete();

        assert!(!handle.cancel());
        assert_eq!(handle.state(), TaskState::Completed);
        assert!(!handle.is_cancelled());
    }

    #[test]
    fn cancel_is_idempotent() {
        let handle = TaskHandle::new();
        handle.mark_running();
        assert!(handle.cancel());
        assert!(!handle.cancel());
        assert_eq!(handle.state(), TaskState::Cancelled);
    }

    #[test]
    fn pending_handle_can_be_cancelled() {
        let handle = TaskHandle::new();
        assert!(handle.cancel());
        assert!(!handle.mark_running());
        assert_eq!(handle.state(), TaskState::Cancelled);
    }

    #[test]
    fn cancel_propagates_to_child_tokens() {
        let handle = TaskHandle::new();
        let child = handle.child_token();
        handle.mark_running();
        handle.cancel();
        assert!(child.is_cancelled());
    }

    #[test]
    fn notify_only_runs_while_running() {
        let handle = TaskHandle::new();
        assert_eq!(handle.notify(|| 1), None);

        handle.mark_running();
        assert_eq!(handle.notify(|| 2), Some(2));

        handle.cancel();
        assert_eq!(handle.notify(|| 3), None);
    }

    #[test]
    fn complete_after_cancel_keeps_cancelled() {
        let handle = TaskHandle::new();
        handle.mark_running();
        handle.cancel();
        assert!(!handle.complete());
        assert_eq!(handle.state(), TaskState::Cancelled);
    }

    #[test]
    fn cancel_waits_for_an_in_flight_notification() {
        let handle = TaskHandle::new();
        handle.mark_running();

        let (entered_tx, entered_rx) = std::sync::mpsc::channel();
        let notifier = handle.clone();
        let worker = std::thread::spawn(move || {
            notifier.notify(|| {
                entered_tx.send(()).unwrap();
                std::thread::sleep(Duration::from_millis(100));
                std::time::Instant::now()
            })
        });

        entered_rx.recv().unwrap();
        handle.cancel();
        let cancelled_at = std::time::Instant::now();
        let notified_at = worker.join().unwrap().expect("notification ran");
        assert!(notified_at <= cancelled_at);
    }

    #[tokio::test]
    async fn wait_returns_terminal_state() {
        let handle = TaskHandle::new();
        handle.mark_running();

        let waiter = handle.clone();
        let join = tokio::spawn(async move { waiter.wait().await });
        tokio::time::sleep(Duration::from_millis(20)).await;
        handle.complete();

        assert_eq!(join.await.unwrap(), TaskState::Completed);
        assert_eq!(handle.wait().await, TaskState::Completed);
    }

    #[test]
    fn cancel_from_inside_a_notification_does_not_deadlock() {
        let handle = TaskHandle::new();
        handle.mark_running();

        let inner = handle.clone();
        let (tx, rx) = std::sync::mpsc::channel();
        std::thread::spawn(move || {
            let cancelled = inner.notify(|| inner.cancel());
            let _ = tx.send(cancelled);
        });

        let cancelled = rx
            .recv_timeout(Duration::from_secs(2))
            .expect("re-entrant cancel should not block");
        assert_eq!(cancelled, Some(true));
        assert_eq!(handle.state(), TaskState::Cancelled);
        assert!(handle.is_cancelled());
    }

    #[test]
    fn panicking_notification_leaves_the_run_usable() {
        let handle = TaskHandle::new();
        handle.mark_running();

        let out: Option<()> = handle.notify(|| panic!("view blew up"));
        assert_eq!(out, None);
        assert_eq!(handle.state(), TaskState::Running);

        assert_eq!(handle.notify(|| 5), Some(5));
        assert!(handle.complete());
        assert!(!handle.cancel());
    }
}
