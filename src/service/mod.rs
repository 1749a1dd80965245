// src/service/mod.rs

//! The orchestrator.
//!
//! `ServiceWatcher` owns the job registry and reacts to:
//! - configuration rewrites (full reload)
//! - `*.job` files appearing, changing or disappearing
//! - requests from running jobs (child expansion, removal)
//! - status and shutdown requests (signals or a [`ServiceHandle`])
//!
//! Job expansion rules live in [`plan`]; the reload watches in
//! [`config_watch`]; the async loop in [`runtime`].

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::{mpsc, watch};

use crate::exec::DEFAULT_COMMAND_SLOTS;
use crate::registry::{JobRegistry, JobSummary};

pub mod config_watch;
pub mod plan;
pub mod runtime;
pub mod signals;

pub use plan::plan_watches;
pub use runtime::ServiceWatcher;
pub use signals::spawn_signal_listener;

/// Lifecycle of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    Loading,
    Active,
    ReloadPending,
    Stopping,
    Stopped,
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ServiceState::Loading => "loading",
            ServiceState::Active => "active",
            ServiceState::ReloadPending => "reload-pending",
            ServiceState::Stopping => "stopping",
            ServiceState::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

/// Events flowing into the service loop from reload watches, signals and
/// handles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceEvent {
    /// The configuration file was rewritten.
    ReloadConfig,
    /// The configuration watch ended; the current jobs stay.
    ConfigWatchClosed,
    /// A `*.job` file was written.
    JobFileWritten(PathBuf),
    /// A `*.job` file was deleted.
    JobFileRemoved(PathBuf),
    /// The jobs directory watch ended.
    JobsDirClosed,
    /// Log a snapshot of the registry.
    DumpStatus,
    /// Stop gracefully.
    Shutdown,
}

/// Service construction options.
#[derive(Debug, Clone)]
pub struct ServiceOptions {
    pub config_path: PathBuf,
    /// Directory of `*.job` files; `None` disables job files.
    pub jobs_dir: Option<PathBuf>,
    /// Commands allowed in flight at once.
    pub command_slots: usize,
}

impl ServiceOptions {
    pub fn new(config_path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: config_path.into(),
            jobs_dir: None,
            command_slots: DEFAULT_COMMAND_SLOTS,
        }
    }

    pub fn with_jobs_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.jobs_dir = Some(dir.into());
        self
    }
}

/// Cloneable control surface of a running service.
#[derive(Debug, Clone)]
pub struct ServiceHandle {
    events: mpsc::UnboundedSender<ServiceEvent>,
    registry: Arc<JobRegistry>,
    state: watch::Receiver<ServiceState>,
}

impl ServiceHandle {
    fn send(&self, event: ServiceEvent) {
        if self.events.send(event).is_err() {
            tracing::debug!("service already stopped");
        }
    }

    pub fn shutdown(&self) {
        self.send(ServiceEvent::Shutdown);
    }

    pub fn reload(&self) {
        self.send(ServiceEvent::ReloadConfig);
    }

    pub fn dump_status(&self) {
        self.send(ServiceEvent::DumpStatus);
    }

    pub fn snapshot(&self) -> Vec<JobSummary> {
        self.registry.snapshot()
    }

    pub fn state(&self) -> ServiceState {
        *self.state.borrow()
    }

    /// Wait until the service reaches `target`. Returns immediately if it
    /// already has, and also returns once the service loop is gone.
    pub async fn wait_for_state(&self, target: ServiceState) {
        let mut rx = self.state.clone();
        let _ = rx.wait_for(|state| *state == target).await;
    }
}
