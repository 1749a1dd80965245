// src/registry.rs

//! The set of live jobs, keyed by [`JobId`].
//!
//! Every operation takes the single lock for the duration of the map
//! operation only. Removed jobs are dropped after the lock is released, so
//! watch teardown never happens under it.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::config::JobSpec;
use crate::job::{Job, JobId, JobOrigin};
use crate::watch::EventMask;

#[derive(Debug, Default)]
pub struct JobRegistry {
    jobs: Mutex<HashMap<JobId, Job>>,
}

/// Read-only view of one job, for status reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSummary {
    pub id: JobId,
    pub origin: JobOrigin,
    pub path: PathBuf,
    pub name: Option<String>,
    pub events: EventMask,
    pub command: Option<String>,
    pub closed: bool,
}

impl fmt::Display for JobSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}] {}", self.id, self.origin, self.path.display())?;
        if let Some(name) = &self.name {
            write!(f, " name={name}")?;
        }
        write!(f, " events={}", self.events)?;
        match &self.command {
            Some(command) => write!(f, " command={command}"),
            None => f.write_str(" command=(none)"),
        }
    }
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<JobId, Job>> {
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn insert(&self, job: Job) -> JobId {
        let id = job.id();
        // A replaced entry cannot exist: ids are never reused.
        let replaced = self.lock().insert(id, job);
        drop(replaced);
        id
    }

    /// Remove and drop the job. Returns false if it was not present.
    pub fn remove(&self, id: JobId) -> bool {
        let removed = self.lock().remove(&id);
        removed.is_some()
    }

    /// Remove every job from `origin`, returning how many went.
    pub fn remove_origin(&self, origin: &JobOrigin) -> usize {
        let removed: Vec<Job> = {
            let mut jobs = self.lock();
            let ids: Vec<JobId> = jobs
                .values()
                .filter(|job| job.origin() == origin)
                .map(Job::id)
                .collect();
            ids.iter().filter_map(|id| jobs.remove(id)).collect()
        };
        removed.len()
    }

    /// Remove every job, returning how many went.
    pub fn clear(&self) -> usize {
        let removed: Vec<Job> = self.lock().drain().map(|(_, job)| job).collect();
        removed.len()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn contains(&self, id: JobId) -> bool {
        self.lock().contains_key(&id)
    }

    /// Origin and template of a live job, used to expand children.
    pub fn template_of(&self, id: JobId) -> Option<(JobOrigin, Arc<JobSpec>)> {
        self.lock()
            .get(&id)
            .map(|job| (job.origin().clone(), Arc::clone(job.template())))
    }

    /// True if a job expanded from `template` already watches `path`.
    pub fn has_expansion(&self, template: &Arc<JobSpec>, path: &Path) -> bool {
        self.lock()
            .values()
            .any(|job| Arc::ptr_eq(job.template(), template) && job.path() == path)
    }

    /// Summaries of all jobs, ordered by id.
    pub fn snapshot(&self) -> Vec<JobSummary> {
        let mut summaries: Vec<JobSummary> = self
            .lock()
            .values()
            .map(|job| {
                let spec = job.spec();
                JobSummary {
                    id: job.id(),
                    origin: job.origin().clone(),
                    path: spec.path.clone(),
                    name: spec.name.clone(),
                    events: spec.events,
                    command: spec.command.clone(),
                    closed: job.is_closed(),
                }
            })
            .collect();
        summaries.sort_by_key(|s| s.id);
        summaries
    }
}
