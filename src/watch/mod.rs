// src/watch/mod.rs

//! Kernel watches and the event vocabulary.
//!
//! This module is responsible for:
//! - Decoding the inotify record stream into [`EventKind`]s ([`codec`]).
//! - Owning one kernel watch per [`WatchHandle`] and running its
//!   receive/dispatch loop ([`handle`]).
//!
//! It does **not** know about jobs, commands or configuration; it only
//! turns filesystem changes into ordered callbacks on an [`EventHandler`].

pub mod codec;
pub mod handle;
mod inotify;

pub use codec::{EventKind, EventMask, FramingError, RawRecord, decode_records};
pub use handle::{EventHandler, WatchHandle};
