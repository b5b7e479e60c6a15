//! # task-presenter
//!
//! Presenter-driven orchestration of one long-running, fallible background
//! operation, with fail-soft waiting and lifecycle-bound cancellation.
//!
//! ## Architecture
//!
//! ```text
//!   Host ──start/stop──▶ Presenter
//!                           │
//!          ┌────────────────┴─────────────────┐
//!          ▼                                  ▼
//!   ┌──────────────┐   dispatch        ┌──────────────┐
//!   │  Foreground  │ ────────────────▶ │  Background  │
//!   │ (1 thread)   │ ◀──── Deferred ── │ (pool)       │
//!   └──────┬───────┘                   └──────┬───────┘
//!          │ show_loading / show_data         │ DataSource::load
//!          ▼                                  ▼
//!        View                             DataSource
//! ```
//!
//! ## Run Flow
//! 1. `show_loading()` on the foreground
//! 2. Dispatch `DataSource::load` to the background pool
//! 3. `await_safe`: value or `None`, failures logged and absorbed
//! 4. `show_data(result)` on the foreground, unless stopped first
//!
//! ## Modules
//! - `presenter`: the orchestrator and its state machine
//! - `deferred`: background result handle and the safe-wait adapter
//! - `foreground` / `background`: the two execution contexts
//! - `task`: per-run cancellation and notification gate
//! - `source` / `view`: collaborator contracts and stock implementations
//! - `host`: lifecycle owner

pub mod background;
pub mod config;
pub mod deferred;
pub mod foreground;
pub mod host;
pub mod presenter;
pub mod source;
pub mod task;
pub mod util;
pub mod view;

pub use background::{Background, BackgroundPool};
pub use config::Config;
pub use deferred::{Deferred, DispatchError};
pub use foreground::{Foreground, ForegroundLoop};
pub use host::Host;
pub use presenter::{Presenter, PresenterError, PresenterState};
pub use source::{DataProvider, DataSource, LoadError};
pub use task::{TaskHandle, TaskState};
pub use view::{LoggingView, View};
