// src/job/routing.rs

//! Pure per-event decision logic for jobs.
//!
//! Given a job's spec and one decoded event, decide what should happen. No
//! IO beyond the directory check for recursive expansion, which goes through
//! [`FileSystem`] so it can be driven from a mock tree.

use std::ffi::{OsStr, OsString};
use std::os::unix::ffi::{OsStrExt, OsStringExt};
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::config::JobSpec;
use crate::exec::CommandInvocation;
use crate::fs::FileSystem;
use crate::watch::EventKind;

/// Outcome of routing one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobAction {
    /// Dispatch this command.
    Run(CommandInvocation),
    /// Start a child job on this new subdirectory.
    SpawnChild(PathBuf),
    /// The watched path is gone; the job ends.
    Terminate,
}

/// Decide what `kind` on `name` means for a job running `spec`.
///
/// Rules, in order:
/// - `DeleteSelf` terminates the job and runs nothing: the path is gone.
/// - With a filename filter, events for other names are ignored.
/// - Kinds outside the requested mask run nothing.
/// - `Create` of a directory under a recursive job spawns a child.
pub fn route_event(
    spec: &JobSpec,
    kind: EventKind,
    name: &OsStr,
    fs: &dyn FileSystem,
) -> Vec<JobAction> {
    let mut actions = Vec::new();

    if kind == EventKind::DeleteSelf {
        actions.push(JobAction::Terminate);
        return actions;
    }

    if let Some(filter) = &spec.name {
        if name != OsStr::new(filter) {
            return actions;
        }
    }

    let target = if name.is_empty() {
        spec.path.clone()
    } else {
        spec.path.join(name)
    };

    if spec.events.contains(kind) {
        actions.extend(command_for(spec, kind, &target).map(JobAction::Run));
    }

    if kind == EventKind::Create
        && spec.recursive
        && fs.is_dir(&target)
        && !fs.is_symlink(&target)
    {
        actions.push(JobAction::SpawnChild(target));
    }

    actions
}

/// The command invocation for `kind` on `target`, if the job has a command.
pub fn command_for(spec: &JobSpec, kind: EventKind, target: &Path) -> Option<CommandInvocation> {
    let program = spec.command.as_ref()?;
    Some(CommandInvocation::for_event(
        program.clone(),
        kind,
        path_argument(target, spec.escaped),
        spec.owner.clone(),
    ))
}

/// Render `path` as a command argument, shell-quoted when `escaped`.
///
/// The raw bytes are kept, so names that are not UTF-8 reach the command
/// unchanged.
pub fn path_argument(path: &Path, escaped: bool) -> OsString {
    let raw = path.as_os_str();
    if !escaped {
        return raw.to_os_string();
    }
    match shlex::bytes::try_quote(raw.as_bytes()) {
        Ok(quoted) => OsString::from_vec(quoted.into_owned()),
        Err(err) => {
            warn!(path = ?path, error = %err, "cannot quote path; passing it unquoted");
            raw.to_os_string()
        }
    }
}
