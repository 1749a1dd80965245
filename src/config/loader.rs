// src/config/loader.rs

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use crate::config::model::{JobSpec, RawServiceConfig, ServiceConfig};
use crate::config::validate::parse_job_value;
use crate::errors::{Result, WatcherError};
use crate::fs::FileSystem;

/// Default location of the service configuration document.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/inotify_watcher/config.json";

/// Default directory holding `*.job` files.
pub const DEFAULT_JOBS_DIR: &str = "/etc/inotify_watcher/jobs.d";

/// File extension of job files in the jobs directory.
pub const JOB_FILE_EXTENSION: &str = "job";

/// Read and validate the service configuration document.
///
/// Fails when the file cannot be read or is structurally invalid (not an
/// object, `jobs` missing or not an array). Individual malformed jobs are
/// skipped and counted in [`ServiceConfig::skipped`].
pub fn load_service_config(fs: &dyn FileSystem, path: &Path) -> Result<ServiceConfig> {
    let contents = fs.read_to_string(path)?;
    parse_service_config(&contents)
        .map_err(|err| WatcherError::Config(format!("{}: {err}", path.display())))
}

/// Parse a configuration document from text.
pub fn parse_service_config(contents: &str) -> Result<ServiceConfig> {
    let raw: RawServiceConfig = serde_json::from_str(contents)?;
    ServiceConfig::try_from(raw)
}

/// Read a `*.job` file holding exactly one job object.
pub fn load_job_file(fs: &dyn FileSystem, path: &Path) -> Result<JobSpec> {
    let contents = fs.read_to_string(path)?;
    let value: serde_json::Value = serde_json::from_str(&contents)?;
    parse_job_value(value)
        .map_err(|err| WatcherError::Config(format!("{}: {err}", path.display())))
}

/// True for file names ending in `.job`.
pub fn is_job_file_name(name: &OsStr) -> bool {
    Path::new(name)
        .extension()
        .is_some_and(|ext| ext == JOB_FILE_EXTENSION)
}

/// Regular `*.job` files directly inside `dir`, sorted by name.
///
/// A missing directory yields an empty list.
pub fn list_job_files(fs: &dyn FileSystem, dir: &Path) -> Vec<PathBuf> {
    if !fs.is_dir(dir) {
        return Vec::new();
    }

    let mut files: Vec<PathBuf> = match fs.read_dir(dir) {
        Ok(entries) => entries,
        Err(err) => {
            tracing::warn!(path = ?dir, error = %err, "cannot list jobs directory");
            return Vec::new();
        }
    }
    .into_iter()
    .filter(|p| fs.is_file(p) && p.file_name().is_some_and(is_job_file_name))
    .collect();

    files.sort();
    files
}
