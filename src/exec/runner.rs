// src/exec/runner.rs

//! Pluggable command runner.
//!
//! Job routing never spawns processes itself; it hands a
//! [`CommandInvocation`] to a `CommandRunner` through the dispatcher. The
//! production runner forks a real child, tests swap in a recording fake.

use std::future::Future;
use std::pin::Pin;
use std::process::Stdio;

use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::errors::Result;
use crate::exec::CommandInvocation;
use crate::exec::privilege::{UserInfo, resolve_owner};

/// Working directory of every child.
pub const COMMAND_WORKDIR: &str = "/tmp";

/// Executes one command invocation to completion.
pub trait CommandRunner: Send + Sync {
    /// Run `invocation` and resolve once the child has exited.
    ///
    /// A non-zero exit status is not an error; failing to resolve the owner,
    /// spawn, or wait is.
    fn run(
        &self,
        invocation: CommandInvocation,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}

/// Production runner backed by `tokio::process::Command`.
///
/// Children get `/dev/null` for all standard streams and `/tmp` as working
/// directory. When the service runs as root and the invocation names an
/// owner, the child switches to that user's uid/gid before `exec` and gets
/// `USER`, `LOGNAME` and `HOME` set accordingly.
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner;

impl ProcessRunner {
    pub fn new() -> Self {
        Self
    }
}

impl CommandRunner for ProcessRunner {
    fn run(
        &self,
        invocation: CommandInvocation,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            let user = resolve_owner(invocation.owner.as_deref())?;
            let mut cmd = build_command(&invocation, user.as_ref());

            debug!(command = %invocation, user = ?user.as_ref().map(|u| &u.name), "spawning command");
            let mut child = cmd.spawn()?;
            let status = child.wait().await?;

            if status.success() {
                info!(command = %invocation, "command finished");
            } else {
                warn!(
                    command = %invocation,
                    exit_code = status.code().unwrap_or(-1),
                    "command exited unsuccessfully"
                );
            }
            Ok(())
        })
    }
}

fn build_command(invocation: &CommandInvocation, user: Option<&UserInfo>) -> Command {
    let mut cmd = Command::new(invocation.program_path());
    cmd.args(&invocation.args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .current_dir(COMMAND_WORKDIR);

    if let Some(user) = user {
        // gid first: once the uid is dropped the child can no longer change it.
        cmd.gid(user.gid)
            .uid(user.uid)
            .env("USER", &user.name)
            .env("LOGNAME", &user.name)
            .env("HOME", &user.home);
    }
    cmd
}
