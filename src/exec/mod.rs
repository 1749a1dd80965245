// src/exec/mod.rs

//! Command execution layer.
//!
//! - [`runner`] defines the `CommandRunner` trait and the production
//!   `ProcessRunner` built on `tokio::process::Command`.
//! - [`privilege`] resolves job owners to uid/gid for the privilege drop.
//! - [`dispatcher`] posts invocations onto the runtime with a bounded number
//!   of commands in flight, and lets shutdown wait for them.

pub mod dispatcher;
pub mod privilege;
pub mod runner;

use std::ffi::OsString;
use std::fmt;
use std::path::Path;

pub use dispatcher::{CommandDispatcher, DEFAULT_COMMAND_SLOTS};
pub use privilege::UserInfo;
pub use runner::{CommandRunner, ProcessRunner};

use crate::watch::EventKind;

/// One command execution: the program, its arguments and the optional user
/// to run it as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandInvocation {
    pub program: String,
    pub args: Vec<OsString>,
    pub owner: Option<String>,
}

impl CommandInvocation {
    /// Invocation for a triggered event: `<program> <EventName> <path>`.
    pub fn for_event(
        program: impl Into<String>,
        kind: EventKind,
        path_arg: impl Into<OsString>,
        owner: Option<String>,
    ) -> Self {
        Self {
            program: program.into(),
            args: vec![OsString::from(kind.name()), path_arg.into()],
            owner,
        }
    }

    pub fn program_path(&self) -> &Path {
        Path::new(&self.program)
    }
}

impl fmt::Display for CommandInvocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg.to_string_lossy())?;
        }
        Ok(())
    }
}
