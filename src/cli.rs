// src/cli.rs

//! CLI argument parsing using `clap`.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use clap::{Parser, ValueEnum};

use crate::config::{DEFAULT_CONFIG_PATH, DEFAULT_JOBS_DIR};

/// Command-line arguments for `inotify-watcher`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "inotify-watcher",
    version,
    about = "Watch directories with inotify and run commands on file events.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the JSON configuration file.
    #[arg(
        long,
        value_name = "PATH",
        env = "INOTIFY_SERVICE_CONF",
        default_value = DEFAULT_CONFIG_PATH
    )]
    pub config: PathBuf,

    /// Directory of `*.job` files, each holding one job object.
    ///
    /// A missing directory is not an error.
    #[arg(
        long,
        value_name = "DIR",
        env = "INOTIFY_SERVICE_JOBS",
        default_value = DEFAULT_JOBS_DIR
    )]
    pub jobs_dir: PathBuf,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `INOTIFY_WATCHER_LOG` or `info` is used. The config
    /// `debug` flag raises it to `debug` while set.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Load the configuration, print the planned watches, and exit.
    #[arg(long)]
    pub dry_run: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}

/// Check that `path` is a regular file this process can open for reading.
pub fn ensure_config_readable(path: &Path) -> io::Result<()> {
    let file = File::open(path)?;
    if !file.metadata()?.is_file() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "not a regular file",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        CliArgs::command().debug_assert();
    }

    #[test]
    fn explicit_paths_override_defaults() {
        let args = CliArgs::try_parse_from([
            "inotify-watcher",
            "--config",
            "/srv/watch.json",
            "--jobs-dir",
            "/srv/jobs.d",
            "--log-level",
            "debug",
        ])
        .unwrap();
        assert_eq!(args.config, PathBuf::from("/srv/watch.json"));
        assert_eq!(args.jobs_dir, PathBuf::from("/srv/jobs.d"));
        assert!(matches!(args.log_level, Some(LogLevel::Debug)));
        assert!(!args.dry_run);
    }

    #[test]
    fn config_must_be_a_readable_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("config.json");
        std::fs::write(&file, "{}").unwrap();

        assert!(ensure_config_readable(&file).is_ok());
        assert!(ensure_config_readable(&dir.path().join("missing.json")).is_err());
        assert!(ensure_config_readable(dir.path()).is_err());
    }
}
