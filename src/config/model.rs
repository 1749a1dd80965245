// src/config/model.rs

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::watch::{EventKind, EventMask};

/// Top-level configuration document as read from JSON.
///
/// ```json
/// {
///   "debug": false,
///   "jobs": [
///     { "path": "/srv/incoming", "command": "/usr/local/bin/ingest" },
///     { "path": "/var/www", "recursive": true, "inotify": ["Create", "CloseWrite"],
///       "command": "/usr/local/bin/publish", "owner": "www-data", "escaped": true }
///   ]
/// }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct RawServiceConfig {
    /// Raises log verbosity to `debug` while this document is active.
    #[serde(default)]
    pub debug: bool,

    /// Job records, kept untyped here so that one malformed entry is skipped
    /// on its own instead of rejecting the whole document.
    pub jobs: Vec<serde_json::Value>,
}

/// A single job object, as found in `jobs` or in a `*.job` file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawJobSpec {
    /// File or directory to watch.
    pub path: String,

    /// Event names; overrides the default `CloseWrite` + `DeleteSelf`.
    #[serde(default)]
    pub inotify: Option<Vec<String>>,

    /// Program executed on a matching event.
    #[serde(default)]
    pub command: Option<String>,

    /// User the command runs as (only honoured when running as root).
    #[serde(default)]
    pub owner: Option<String>,

    /// Expand a directory watch into its subdirectories, including ones
    /// created later.
    #[serde(default)]
    pub recursive: bool,

    /// Shell-quote the path argument handed to the command.
    #[serde(default)]
    pub escaped: bool,

    /// Filename filter. Normally set internally when a single file is
    /// watched through its parent directory.
    #[serde(default)]
    pub name: Option<String>,
}

/// Validated configuration document.
#[derive(Debug, Clone, Default)]
pub struct ServiceConfig {
    pub debug: bool,
    pub jobs: Vec<JobSpec>,
    /// Number of job records that were dropped as malformed.
    pub skipped: usize,
}

/// Declarative description of one job. Immutable once attached to a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSpec {
    /// Absolute path the job watches.
    pub path: PathBuf,
    /// Events that run the command.
    pub events: EventMask,
    pub command: Option<String>,
    pub owner: Option<String>,
    /// Only events whose name equals this filter are considered.
    pub name: Option<String>,
    pub recursive: bool,
    pub escaped: bool,
}

impl JobSpec {
    /// A job on `path` with the default mask and nothing else set.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            events: EventMask::DEFAULT,
            command: None,
            owner: None,
            name: None,
            recursive: false,
            escaped: false,
        }
    }

    pub fn uses_default_mask(&self) -> bool {
        self.events == EventMask::DEFAULT
    }

    /// Mask registered with the kernel.
    ///
    /// `DeleteSelf` is always included so the job notices its target
    /// disappearing; recursive jobs also need `Create` to discover new
    /// subdirectories, whether or not those run the command.
    pub fn watch_mask(&self) -> EventMask {
        let mask = self.events.with(EventKind::DeleteSelf);
        if self.recursive {
            mask.with(EventKind::Create)
        } else {
            mask
        }
    }

    /// Same job, different target.
    pub fn with_path(&self, path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..self.clone()
        }
    }

    /// Same job watching `dir` and filtered to `name`.
    pub fn with_name_filter(&self, dir: &Path, name: impl Into<String>) -> Self {
        Self {
            path: dir.to_path_buf(),
            name: Some(name.into()),
            ..self.clone()
        }
    }
}
