// src/job/mod.rs

//! Jobs: one watch bound to one trigger specification.

mod handler;
pub mod routing;

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::mpsc;

use crate::config::JobSpec;
use crate::errors::Result;
use crate::exec::CommandDispatcher;
use crate::fs::FileSystem;
use crate::watch::WatchHandle;

pub use routing::{JobAction, command_for, path_argument, route_event};

use handler::JobEventHandler;

/// Process-unique job identifier. Never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(u64);

impl JobId {
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        JobId(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "job-{}", self.0)
    }
}

/// Where a job's specification came from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum JobOrigin {
    /// The `jobs` array of the configuration document.
    Config,
    /// A `*.job` file in the jobs directory, by file name.
    JobFile(String),
}

impl fmt::Display for JobOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobOrigin::Config => f.write_str("config"),
            JobOrigin::JobFile(name) => write!(f, "file:{name}"),
        }
    }
}

/// Why a job asks to be removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveReason {
    DeleteSelf,
    WatchFailed,
}

/// Registry mutations requested by running jobs, consumed by the
/// orchestrator. Jobs never touch the registry directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobRequest {
    SpawnChild { parent: JobId, path: PathBuf },
    Remove { id: JobId, reason: RemoveReason },
}

/// Everything a job's event handler needs from the service.
#[derive(Clone)]
pub struct JobContext {
    pub requests: mpsc::UnboundedSender<JobRequest>,
    pub dispatcher: CommandDispatcher,
    pub fs: Arc<dyn FileSystem>,
}

/// A live job.
///
/// `template` is the specification as configured and is shared by every job
/// expanded from it; `spec` is this job's concrete target. Dropping the job
/// cancels its watch.
#[derive(Debug)]
pub struct Job {
    id: JobId,
    origin: JobOrigin,
    template: Arc<JobSpec>,
    spec: Arc<JobSpec>,
    watch: WatchHandle,
}

impl Job {
    /// Open the watch for `spec` and start routing its events.
    ///
    /// Must be called within a Tokio runtime.
    pub fn start(
        origin: JobOrigin,
        template: Arc<JobSpec>,
        spec: JobSpec,
        ctx: &JobContext,
    ) -> Result<Self> {
        let id = JobId::next();
        let spec = Arc::new(spec);
        let handler = JobEventHandler::new(id, Arc::clone(&spec), ctx.clone());
        let watch = WatchHandle::open(spec.path.clone(), spec.watch_mask(), handler)?;

        tracing::info!(
            job = %id,
            origin = %origin,
            path = ?spec.path,
            name = ?spec.name,
            events = %spec.events,
            "job started"
        );

        Ok(Self {
            id,
            origin,
            template,
            spec,
            watch,
        })
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn origin(&self) -> &JobOrigin {
        &self.origin
    }

    pub fn template(&self) -> &Arc<JobSpec> {
        &self.template
    }

    pub fn spec(&self) -> &JobSpec {
        &self.spec
    }

    pub fn path(&self) -> &Path {
        &self.spec.path
    }

    pub fn is_closed(&self) -> bool {
        self.watch.is_closed()
    }

    /// Stop the watch without waiting for removal from the registry.
    pub fn cancel(&self) {
        self.watch.cancel();
    }
}
