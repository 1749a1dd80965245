// src/errors.rs

//! Crate-wide error type and result alias.

use std::path::PathBuf;

use thiserror::Error;

use crate::watch::codec::FramingError;

#[derive(Error, Debug)]
pub enum WatcherError {
    #[error("path not found: {0:?}")]
    PathNotFound(PathBuf),

    #[error("failed to initialise watch on {path:?}: {source}")]
    WatchInit {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("inotify stream framing error: {0}")]
    Framing(#[from] FramingError),

    #[error("unknown user: {0}")]
    UnknownUser(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, WatcherError>;
