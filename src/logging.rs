// src/logging.rs

//! Logging setup using `tracing` + `tracing-subscriber`.
//!
//! Priority for determining the base log level:
//! 1. `--log-level` CLI flag (if provided)
//! 2. `INOTIFY_WATCHER_LOG` environment variable (e.g. "info", "debug")
//! 3. default to `info`
//!
//! The level sits behind a reload layer. [`init_logging`] hands back a
//! [`LogHandle`] that the service uses to follow the config `debug` flag.

use anyhow::{Context, Result};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{Registry, fmt, reload};

use crate::cli::LogLevel;

/// Environment variable consulted when `--log-level` is absent.
pub const LOG_ENV: &str = "INOTIFY_WATCHER_LOG";

/// Handle to the process-wide log level.
#[derive(Clone)]
pub struct LogHandle {
    reload: Option<reload::Handle<LevelFilter, Registry>>,
    base: LevelFilter,
}

impl LogHandle {
    /// A handle not connected to any subscriber; level changes are no-ops.
    pub fn disabled() -> Self {
        Self {
            reload: None,
            base: LevelFilter::INFO,
        }
    }

    pub fn base_level(&self) -> LevelFilter {
        self.base
    }

    /// Raise the level to at least `debug`, or go back to the base level.
    pub fn set_debug(&self, debug: bool) {
        let Some(handle) = &self.reload else {
            return;
        };
        let level = if debug {
            self.base.max(LevelFilter::DEBUG)
        } else {
            self.base
        };
        if let Err(err) = handle.reload(level) {
            tracing::warn!(error = %err, "failed to change log level");
        } else {
            tracing::debug!(%level, "log level set");
        }
    }
}

impl std::fmt::Debug for LogHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogHandle")
            .field("base", &self.base)
            .field("connected", &self.reload.is_some())
            .finish()
    }
}

/// Initialise the global logging subscriber. Call once at startup.
pub fn init_logging(cli_level: Option<LogLevel>) -> Result<LogHandle> {
    let base = match cli_level {
        Some(lvl) => level_from_log_level(lvl),
        None => std::env::var(LOG_ENV)
            .ok()
            .and_then(|s| parse_level_str(&s))
            .unwrap_or(LevelFilter::INFO),
    };

    let (filter, handle) = reload::Layer::new(base);

    // Logs go to stderr; commands get /dev/null anyway.
    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(true)
                .with_thread_ids(false)
                .with_thread_names(false)
                .with_writer(std::io::stderr),
        )
        .try_init()
        .context("installing tracing subscriber")?;

    Ok(LogHandle {
        reload: Some(handle),
        base,
    })
}

fn level_from_log_level(lvl: LogLevel) -> LevelFilter {
    match lvl {
        LogLevel::Error => LevelFilter::ERROR,
        LogLevel::Warn => LevelFilter::WARN,
        LogLevel::Info => LevelFilter::INFO,
        LogLevel::Debug => LevelFilter::DEBUG,
        LogLevel::Trace => LevelFilter::TRACE,
    }
}

fn parse_level_str(s: &str) -> Option<LevelFilter> {
    match s.trim().to_lowercase().as_str() {
        "error" => Some(LevelFilter::ERROR),
        "warn" | "warning" => Some(LevelFilter::WARN),
        "info" => Some(LevelFilter::INFO),
        "debug" => Some(LevelFilter::DEBUG),
        "trace" => Some(LevelFilter::TRACE),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_level_names() {
        assert_eq!(parse_level_str(" Debug "), Some(LevelFilter::DEBUG));
        assert_eq!(parse_level_str("warning"), Some(LevelFilter::WARN));
        assert_eq!(parse_level_str("verbose"), None);
    }

    #[test]
    fn disabled_handle_ignores_level_changes() {
        let handle = LogHandle::disabled();
        handle.set_debug(true);
        assert_eq!(handle.base_level(), LevelFilter::INFO);
    }
}
