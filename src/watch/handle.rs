// src/watch/handle.rs

use std::ffi::OsStr;
use std::fmt;
use std::io;
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Notify;
use tracing::{debug, error, info, warn};

use crate::errors::{Result, WatcherError};
use crate::watch::codec::{EventKind, EventMask, READ_BUFFER_LEN, decode_records};
use crate::watch::inotify::InotifyWatch;

/// Consumer of the events decoded for one [`WatchHandle`].
///
/// Exactly one handler is attached to a handle when it is opened. The
/// receive loop calls it inline, one record bit at a time, so callbacks for
/// the same handle never overlap and arrive in kernel order. Handlers must
/// not block: anything slow (running commands, touching the job registry)
/// is posted elsewhere.
pub trait EventHandler: Send + 'static {
    /// Called once per decoded event. `name` is empty when the event
    /// concerns the watched path itself.
    ///
    /// Returning `ControlFlow::Break` closes the watch; no further callbacks
    /// are made.
    fn on_event(&mut self, kind: EventKind, name: &OsStr) -> ControlFlow<()>;

    /// Called once when the watch dies on a read or framing error.
    fn on_error(&mut self, path: &Path, error: &WatcherError) {
        error!(path = ?path, error = %error, "watch closed after error");
    }
}

impl<F> EventHandler for F
where
    F: FnMut(EventKind, &OsStr) -> ControlFlow<()> + Send + 'static,
{
    fn on_event(&mut self, kind: EventKind, name: &OsStr) -> ControlFlow<()> {
        self(kind, name)
    }
}

#[derive(Debug, Default)]
struct WatchControl {
    cancelled: AtomicBool,
    closed: AtomicBool,
    wake: Notify,
}

impl WatchControl {
    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// One kernel watch on one path, with its receive loop running on the
/// Tokio runtime.
///
/// Dropping the handle cancels the loop; the loop then releases the kernel
/// watch and closes the descriptor.
pub struct WatchHandle {
    path: PathBuf,
    mask: EventMask,
    wd: i32,
    control: Arc<WatchControl>,
}

impl fmt::Debug for WatchHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchHandle")
            .field("path", &self.path)
            .field("mask", &self.mask)
            .field("wd", &self.wd)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl WatchHandle {
    /// Register a watch on `path` for `mask` and start delivering events to
    /// `handler`.
    ///
    /// Fails with [`WatcherError::PathNotFound`] when `path` does not exist
    /// and with [`WatcherError::WatchInit`] when the kernel refuses the
    /// instance or the watch. Must be called from within a Tokio runtime.
    pub fn open<H: EventHandler>(
        path: impl Into<PathBuf>,
        mask: EventMask,
        handler: H,
    ) -> Result<Self> {
        let path = path.into();
        if !path.exists() {
            return Err(WatcherError::PathNotFound(path));
        }

        let watch = InotifyWatch::add(&path, mask.to_kernel()).map_err(|source| {
            WatcherError::WatchInit {
                path: path.clone(),
                source,
            }
        })?;
        let wd = watch.watch_descriptor().unwrap_or(-1);

        let control = Arc::new(WatchControl::default());
        info!(path = ?path, %mask, wd, "watch opened");

        tokio::spawn(receive_loop(
            watch,
            path.clone(),
            handler,
            Arc::clone(&control),
        ));

        Ok(Self {
            path,
            mask,
            wd,
            control,
        })
    }

    /// Stop the receive loop. Idempotent; safe from inside a callback.
    pub fn cancel(&self) {
        if !self.control.cancelled.swap(true, Ordering::AcqRel) {
            debug!(path = ?self.path, wd = self.wd, "watch cancelled");
            self.control.wake.notify_one();
        }
    }

    /// The receive loop has ended and the kernel watch is released.
    pub fn is_closed(&self) -> bool {
        self.control.closed.load(Ordering::Acquire)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn mask(&self) -> EventMask {
        self.mask
    }

    pub fn watch_descriptor(&self) -> i32 {
        self.wd
    }
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Receive → decode → dispatch, then issue the next receive. Only one read
/// is ever outstanding.
async fn receive_loop<H: EventHandler>(
    mut watch: InotifyWatch,
    path: PathBuf,
    mut handler: H,
    control: Arc<WatchControl>,
) {
    let mut buf = vec![0u8; READ_BUFFER_LEN];

    'receive: loop {
        if control.is_cancelled() {
            break;
        }

        let read = tokio::select! {
            _ = control.wake.notified() => break 'receive,
            read = watch.read(&mut buf) => read,
        };

        let len = match read_len(read) {
            Ok(n) => n,
            Err(err) => {
                handler.on_error(&path, &err);
                break;
            }
        };

        for record in decode_records(&buf[..len]) {
            let record = match record {
                Ok(record) => record,
                Err(err) => {
                    handler.on_error(&path, &WatcherError::Framing(err));
                    break 'receive;
                }
            };

            if record.is_watch_removed() {
                debug!(path = ?path, wd = record.wd, "kernel removed watch");
                continue;
            }
            if record.is_queue_overflow() {
                warn!(path = ?path, "inotify queue overflowed; events were lost");
                continue;
            }

            let name = record.name();
            for kind in record.kinds() {
                if control.is_cancelled() {
                    break 'receive;
                }
                if handler.on_event(kind, name).is_break() {
                    control.cancelled.store(true, Ordering::Release);
                    break 'receive;
                }
            }
        }
    }

    watch.release();
    control.closed.store(true, Ordering::Release);
    debug!(path = ?path, "watch loop finished");
}

/// Bytes read, or the error that ends the watch. An inotify descriptor
/// never reports end of file, so a zero-length read is treated as one.
fn read_len(read: io::Result<usize>) -> Result<usize> {
    match read {
        Ok(0) => Err(WatcherError::Io(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "inotify descriptor returned no data",
        ))),
        Ok(n) => Ok(n),
        Err(err) => Err(WatcherError::Io(err)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_read_ends_the_watch_with_an_error() {
        match read_len(Ok(0)) {
            Err(WatcherError::Io(err)) => assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn read_errors_and_lengths_pass_through() {
        assert_eq!(read_len(Ok(32)).unwrap(), 32);
        let err = io::Error::from(io::ErrorKind::PermissionDenied);
        assert!(matches!(read_len(Err(err)), Err(WatcherError::Io(_))));
    }
}
