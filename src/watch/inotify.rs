// src/watch/inotify.rs

//! Thin owner of one inotify instance carrying exactly one watch.

use std::ffi::CString;
use std::io;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};
use std::os::unix::ffi::OsStrExt;
use std::path::Path;

use tokio::io::unix::AsyncFd;
use tracing::debug;

/// One inotify descriptor plus the single watch registered on it.
///
/// The watch is removed at most once (`release`), and the descriptor is
/// closed when this value is dropped.
#[derive(Debug)]
pub(crate) struct InotifyWatch {
    fd: AsyncFd<OwnedFd>,
    wd: Option<i32>,
}

impl InotifyWatch {
    /// Create a non-blocking inotify instance and register `path` with the
    /// given kernel mask.
    ///
    /// Must be called from within a Tokio runtime.
    pub(crate) fn add(path: &Path, kernel_mask: u32) -> io::Result<Self> {
        // SAFETY: plain syscall with constant flags; no memory is passed.
        let raw = unsafe { libc::inotify_init1(libc::IN_NONBLOCK | libc::IN_CLOEXEC) };
        if raw < 0 {
            return Err(io::Error::last_os_error());
        }
        // SAFETY: `raw` is a freshly created descriptor owned by nobody else.
        let owned = unsafe { OwnedFd::from_raw_fd(raw) };

        let c_path = CString::new(path.as_os_str().as_bytes())
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        // SAFETY: the descriptor is open and `c_path` is a NUL-terminated
        // string that outlives the call.
        let wd = unsafe { libc::inotify_add_watch(owned.as_raw_fd(), c_path.as_ptr(), kernel_mask) };
        if wd < 0 {
            return Err(io::Error::last_os_error());
        }

        Ok(Self {
            fd: AsyncFd::new(owned)?,
            wd: Some(wd),
        })
    }

    pub(crate) fn watch_descriptor(&self) -> Option<i32> {
        self.wd
    }

    /// Read one batch of raw records. Waits until the descriptor is readable.
    pub(crate) async fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            let mut guard = self.fd.readable().await?;
            match guard.try_io(|inner| {
                // SAFETY: `buf` is a live, exclusively borrowed slice and the
                // length passed is exactly its size.
                let n = unsafe {
                    libc::read(inner.as_raw_fd(), buf.as_mut_ptr().cast(), buf.len())
                };
                if n < 0 {
                    Err(io::Error::last_os_error())
                } else {
                    Ok(n as usize)
                }
            }) {
                Ok(result) => return result,
                Err(_would_block) => continue,
            }
        }
    }

    /// Remove the kernel watch. Idempotent.
    ///
    /// After `DeleteSelf` the kernel has already dropped the watch, so
    /// `EINVAL` here is expected and only logged at debug.
    pub(crate) fn release(&mut self) {
        if let Some(wd) = self.wd.take() {
            // SAFETY: the descriptor stays open until `self` drops, and `wd`
            // came from `inotify_add_watch` on it.
            let rc = unsafe { libc::inotify_rm_watch(self.fd.as_raw_fd(), wd) };
            if rc < 0 {
                debug!(
                    wd,
                    error = %io::Error::last_os_error(),
                    "inotify_rm_watch failed (watch already gone)"
                );
            }
        }
    }
}

impl Drop for InotifyWatch {
    fn drop(&mut self) {
        self.release();
    }
}
