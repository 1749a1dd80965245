// src/service/plan.rs

//! Expansion of one job specification into the concrete watches it needs.

use tracing::{debug, warn};

use crate::config::JobSpec;
use crate::fs::{FileSystem, scan_dirs};

/// Concrete job specs for `spec`, one per watch to open.
///
/// - A regular file with the default mask is watched through its parent
///   directory, filtered to the file's own name.
/// - A regular file with any other mask is watched directly.
/// - A recursive directory yields one spec per directory found by a scan,
///   the directory itself first.
/// - Any other directory yields the spec unchanged.
/// - Anything else is skipped with a warning.
pub fn plan_watches(fs: &dyn FileSystem, spec: &JobSpec) -> Vec<JobSpec> {
    let path = &spec.path;

    if fs.is_file(path) {
        // `recursive` only means something for directories.
        let file_spec = JobSpec {
            recursive: false,
            ..spec.clone()
        };
        if !spec.uses_default_mask() {
            return vec![file_spec];
        }
        let (Some(parent), Some(name)) = (path.parent(), path.file_name()) else {
            warn!(path = ?path, "cannot watch file without a parent directory; job skipped");
            return Vec::new();
        };
        debug!(path = ?path, "watching file through its parent directory");
        return vec![file_spec.with_name_filter(parent, name.to_string_lossy())];
    }

    if fs.is_dir(path) {
        if !spec.recursive {
            return vec![spec.clone()];
        }
        return scan_dirs(fs, path)
            .into_iter()
            .map(|dir| spec.with_path(dir))
            .collect();
    }

    if fs.exists(path) {
        warn!(path = ?path, "job target is neither a file nor a directory; job skipped");
    } else {
        warn!(path = ?path, "job target does not exist; job skipped");
    }
    Vec::new()
}
