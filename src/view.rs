//! Observer/view contract.
//!
//! The presenter only ever calls a view from the foreground thread, so views
//! need no synchronisation against the presenter. They still have to be
//! `Send + Sync` because the handle crosses into the foreground loop.

use crate::util::thread_label;

/// Sink for the two presenter notifications.
///
/// A notification may call back into the presenter, e.g. to stop it. A panic
/// inside a notification is logged and does not stall the run.
pub trait View: Send + Sync {
    /// Work has started. Called once per run, before dispatch.
    fn show_loading(&self);

    /// Work has finished. `None` means no data, including when the background
    /// operation failed.
    fn show_data(&self, data: Option<&str>);
}

/// View that only logs what it is told.
#[derive(Debug, Default, Clone)]
pub struct LoggingView;

impl View for LoggingView {
    fn show_loading(&self) {
        tracing::info!("showLoading {}", thread_label());
    }

    fn show_data(&self, data: Option<&str>) {
        tracing::info!(
            data = data.unwrap_or("<none>"),
            "showData {}",
            thread_label()
        );
    }
}
