//! Host lifecycle owner.
//!
//! Stands in for whatever owns the presenter (a window, a session, a request
//! scope): it starts presenting when created and stops when destroyed.

use std::sync::Arc;

use crate::presenter::{Presenter, PresenterError};
use crate::task::TaskHandle;

pub struct Host {
    presenter: Arc<Presenter>,
    alive: bool,
}

impl Host {
    pub fn new(presenter: Arc<Presenter>) -> Self {
        Self {
            presenter,
            alive: false,
        }
    }

    pub fn presenter(&self) -> &Arc<Presenter> {
        &self.presenter
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }

    /// Start presenting.
    pub fn on_create(&mut self) -> Result<TaskHandle, PresenterError> {
        let handle = self.presenter.start()?;
        self.alive = true;
        tracing::info!(task_id = %handle.id(), "Host created");
        Ok(handle)
    }

    /// Stop presenting. Safe to call more than once.
    pub fn on_destroy(&mut self) {
        if !self.alive {
            return;
        }
        self.alive = false;
        self.presenter.stop();
        tracing::info!("Host destroyed");
    }
}

impl Drop for Host {
    fn drop(&mut self) {
        self.on_destroy();
    }
}
