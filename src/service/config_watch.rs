// src/service/config_watch.rs

//! Watches driving hot reload: the configuration file and the jobs directory.

use std::ffi::{OsStr, OsString};
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::is_job_file_name;
use crate::errors::{Result, WatcherError};
use crate::service::ServiceEvent;
use crate::watch::{EventHandler, EventKind, EventMask, WatchHandle};

/// Mask for both reload watches.
pub const RELOAD_WATCH_MASK: EventMask = EventMask::of(EventKind::CloseWrite)
    .with(EventKind::Delete)
    .with(EventKind::DeleteSelf);

/// Directory holding `config_path`.
///
/// A bare file name (parent `""`) resolves to the current working directory.
pub fn config_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}

/// Watch the directory of `config_path` for rewrites of the file.
pub fn watch_config_file(
    config_path: &Path,
    events: mpsc::UnboundedSender<ServiceEvent>,
) -> Result<WatchHandle> {
    let file_name = config_path
        .file_name()
        .ok_or_else(|| {
            WatcherError::Config(format!("config path {config_path:?} has no file name"))
        })?
        .to_os_string();

    let handler = ConfigFileHandler { file_name, events };
    WatchHandle::open(config_dir(config_path), RELOAD_WATCH_MASK, handler)
}

/// Watch `dir` for `*.job` files being written or deleted.
pub fn watch_jobs_dir(
    dir: &Path,
    events: mpsc::UnboundedSender<ServiceEvent>,
) -> Result<WatchHandle> {
    let handler = JobsDirHandler {
        dir: dir.to_path_buf(),
        events,
    };
    WatchHandle::open(dir.to_path_buf(), RELOAD_WATCH_MASK, handler)
}

fn post(events: &mpsc::UnboundedSender<ServiceEvent>, event: ServiceEvent) {
    if events.send(event).is_err() {
        debug!("service loop gone; reload event dropped");
    }
}

struct ConfigFileHandler {
    file_name: OsString,
    events: mpsc::UnboundedSender<ServiceEvent>,
}

impl EventHandler for ConfigFileHandler {
    fn on_event(&mut self, kind: EventKind, name: &OsStr) -> ControlFlow<()> {
        match kind {
            EventKind::CloseWrite if name == self.file_name.as_os_str() => {
                info!(file = ?self.file_name, "configuration rewritten");
                post(&self.events, ServiceEvent::ReloadConfig);
                ControlFlow::Continue(())
            }
            EventKind::Delete if name == self.file_name.as_os_str() => {
                warn!(file = ?self.file_name, "configuration file deleted; keeping current jobs");
                post(&self.events, ServiceEvent::ConfigWatchClosed);
                ControlFlow::Break(())
            }
            EventKind::DeleteSelf => {
                warn!("configuration directory deleted; keeping current jobs");
                post(&self.events, ServiceEvent::ConfigWatchClosed);
                ControlFlow::Break(())
            }
            _ => ControlFlow::Continue(()),
        }
    }

    fn on_error(&mut self, path: &Path, error: &WatcherError) {
        warn!(path = ?path, error = %error, "configuration watch failed");
        post(&self.events, ServiceEvent::ConfigWatchClosed);
    }
}

struct JobsDirHandler {
    dir: PathBuf,
    events: mpsc::UnboundedSender<ServiceEvent>,
}

impl EventHandler for JobsDirHandler {
    fn on_event(&mut self, kind: EventKind, name: &OsStr) -> ControlFlow<()> {
        match kind {
            EventKind::CloseWrite if is_job_file_name(name) => {
                post(&self.events, ServiceEvent::JobFileWritten(self.dir.join(name)));
                ControlFlow::Continue(())
            }
            EventKind::Delete if is_job_file_name(name) => {
                post(&self.events, ServiceEvent::JobFileRemoved(self.dir.join(name)));
                ControlFlow::Continue(())
            }
            EventKind::DeleteSelf => {
                warn!(path = ?self.dir, "jobs directory deleted");
                post(&self.events, ServiceEvent::JobsDirClosed);
                ControlFlow::Break(())
            }
            _ => ControlFlow::Continue(()),
        }
    }

    fn on_error(&mut self, path: &Path, error: &WatcherError) {
        warn!(path = ?path, error = %error, "jobs directory watch failed");
        post(&self.events, ServiceEvent::JobsDirClosed);
    }
}
