// src/config/validate.rs

use std::path::PathBuf;

use tracing::warn;

use crate::config::model::{JobSpec, RawJobSpec, RawServiceConfig, ServiceConfig};
use crate::errors::{Result, WatcherError};
use crate::watch::EventMask;

impl TryFrom<RawServiceConfig> for ServiceConfig {
    type Error = WatcherError;

    /// Convert the document, dropping (and logging) each job record that
    /// does not validate. Never fails on a single bad job.
    fn try_from(raw: RawServiceConfig) -> std::result::Result<Self, Self::Error> {
        let mut jobs = Vec::with_capacity(raw.jobs.len());
        let mut skipped = 0;

        for (index, value) in raw.jobs.into_iter().enumerate() {
            match parse_job_value(value) {
                Ok(spec) => jobs.push(spec),
                Err(err) => {
                    warn!(index, error = %err, "job skipped");
                    skipped += 1;
                }
            }
        }

        Ok(ServiceConfig {
            debug: raw.debug,
            jobs,
            skipped,
        })
    }
}

impl TryFrom<RawJobSpec> for JobSpec {
    type Error = WatcherError;

    fn try_from(raw: RawJobSpec) -> std::result::Result<Self, Self::Error> {
        let path = validate_path(&raw.path)?;

        let events = match raw.inotify {
            None => EventMask::DEFAULT,
            Some(names) => {
                let (mask, unknown) = EventMask::from_names(&names);
                if !unknown.is_empty() {
                    warn!(path = ?path, ?unknown, "ignoring unknown inotify event names");
                }
                if mask.is_empty() {
                    warn!(
                        path = ?path,
                        "job lists no known events; it will only notice its own deletion"
                    );
                }
                mask
            }
        };

        Ok(JobSpec {
            path,
            events,
            command: non_empty(raw.command),
            owner: non_empty(raw.owner),
            name: non_empty(raw.name),
            recursive: raw.recursive,
            escaped: raw.escaped,
        })
    }
}

/// Deserialize and validate one job record.
pub fn parse_job_value(value: serde_json::Value) -> Result<JobSpec> {
    if !value.is_object() {
        return Err(WatcherError::Config("job is not an object".to_string()));
    }
    let raw: RawJobSpec = serde_json::from_value(value)?;
    JobSpec::try_from(raw)
}

fn validate_path(raw: &str) -> Result<PathBuf> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(WatcherError::Config("job `path` is empty".to_string()));
    }
    // Relative targets are anchored at the working directory once, so the
    // path handed to commands is always absolute.
    Ok(std::path::absolute(trimmed)?)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}
