// src/lib.rs

pub mod cli;
pub mod config;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod job;
pub mod logging;
pub mod registry;
pub mod service;
pub mod watch;

use std::fmt::Write as _;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::debug;

use crate::cli::CliArgs;
use crate::config::{ServiceConfig, list_job_files, load_job_file, load_service_config};
use crate::exec::ProcessRunner;
use crate::fs::{FileSystem, RealFileSystem};
use crate::logging::LogHandle;
use crate::service::{ServiceOptions, ServiceWatcher, plan_watches, spawn_signal_listener};

/// High-level entry point used by `main.rs`.
///
/// Wires the real filesystem, the process runner and signal handling into
/// a [`ServiceWatcher`] and runs it until a termination signal.
pub async fn run(args: CliArgs, log: LogHandle) -> Result<()> {
    let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);

    if args.dry_run {
        let config = load_service_config(fs.as_ref(), &args.config)
            .with_context(|| format!("loading {}", args.config.display()))?;
        print!("{}", describe_plan(fs.as_ref(), &config, Some(&args.jobs_dir)));
        debug!("dry-run complete (nothing watched)");
        return Ok(());
    }

    let options = ServiceOptions::new(&args.config).with_jobs_dir(&args.jobs_dir);
    let service = ServiceWatcher::new(options, Arc::new(ProcessRunner::new()), fs, log);

    let _signals = spawn_signal_listener(service.handle()).context("installing signal handlers")?;
    service.run().await?;
    Ok(())
}

/// Human-readable list of the watches `config` and the jobs directory would
/// open.
pub fn describe_plan(fs: &dyn FileSystem, config: &ServiceConfig, jobs_dir: Option<&Path>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "inotify-watcher dry-run");
    let _ = writeln!(out, "  debug = {}", config.debug);
    if config.skipped > 0 {
        let _ = writeln!(out, "  skipped malformed jobs = {}", config.skipped);
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "config jobs ({}):", config.jobs.len());
    for spec in &config.jobs {
        describe_spec(&mut out, fs, spec);
    }

    if let Some(dir) = jobs_dir {
        let files = list_job_files(fs, dir);
        let _ = writeln!(out);
        let _ = writeln!(out, "job files in {} ({}):", dir.display(), files.len());
        for file in files {
            match load_job_file(fs, &file) {
                Ok(spec) => {
                    let _ = writeln!(out, "  {}", file.display());
                    describe_spec(&mut out, fs, &spec);
                }
                Err(err) => {
                    let _ = writeln!(out, "  {} (skipped: {err})", file.display());
                }
            }
        }
    }
    out
}

fn describe_spec(out: &mut String, fs: &dyn FileSystem, spec: &config::JobSpec) {
    let _ = writeln!(out, "  - {}", spec.path.display());
    let _ = writeln!(out, "      events: {}", spec.events);
    if let Some(command) = &spec.command {
        let _ = writeln!(out, "      command: {command}");
    }
    if let Some(owner) = &spec.owner {
        let _ = writeln!(out, "      owner: {owner}");
    }
    if spec.escaped {
        let _ = writeln!(out, "      escaped: true");
    }

    let planned = plan_watches(fs, spec);
    if planned.is_empty() {
        let _ = writeln!(out, "      watch: (target missing, skipped)");
    }
    for watch in planned {
        match &watch.name {
            Some(name) => {
                let _ = writeln!(out, "      watch: {} (name = {name})", watch.path.display());
            }
            None => {
                let _ = writeln!(out, "      watch: {}", watch.path.display());
            }
        }
    }
}
