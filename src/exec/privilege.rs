// src/exec/privilege.rs

//! Owner resolution for commands that run as another user.

use std::ffi::{CStr, CString, OsStr};
use std::io;
use std::os::unix::ffi::OsStrExt;
use std::path::PathBuf;

use crate::errors::{Result, WatcherError};

/// Largest buffer handed to `getpwnam_r` before giving up on `ERANGE`.
const MAX_PASSWD_BUFFER: usize = 1 << 20;

/// The account a command is switched to before `exec`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserInfo {
    pub name: String,
    pub uid: u32,
    pub gid: u32,
    pub home: PathBuf,
}

/// Effective uid of this process.
pub fn effective_uid() -> u32 {
    // SAFETY: geteuid has no preconditions and cannot fail.
    unsafe { libc::geteuid() }
}

/// Decide which user, if any, a command with `owner` must run as.
///
/// Returns `Ok(None)` when no switch is needed: no owner, owner `root`, the
/// process is not running as root, or the owner resolves to uid 0. An owner
/// that does not name an existing account is an error and the command must
/// not run.
pub fn resolve_owner(owner: Option<&str>) -> Result<Option<UserInfo>> {
    let Some(owner) = owner.filter(|o| !o.is_empty() && *o != "root") else {
        return Ok(None);
    };

    if effective_uid() != 0 {
        tracing::debug!(owner, "not running as root; owner ignored");
        return Ok(None);
    }

    match lookup_user(owner)? {
        None => Err(WatcherError::UnknownUser(owner.to_string())),
        Some(user) if user.uid == 0 => Ok(None),
        Some(user) => Ok(Some(user)),
    }
}

/// Look `name` up in the user database.
pub fn lookup_user(name: &str) -> Result<Option<UserInfo>> {
    let c_name = CString::new(name).map_err(|_| WatcherError::UnknownUser(name.to_string()))?;

    // SAFETY: sysconf has no preconditions.
    let hint = unsafe { libc::sysconf(libc::_SC_GETPW_R_SIZE_MAX) };
    let mut buf_len = if hint > 0 { hint as usize } else { 1024 };

    loop {
        let mut buf = vec![0 as libc::c_char; buf_len];
        // SAFETY: passwd is a plain C struct; all-zero is a valid value.
        let mut pwd: libc::passwd = unsafe { std::mem::zeroed() };
        let mut result: *mut libc::passwd = std::ptr::null_mut();

        // SAFETY: every pointer refers to live, correctly sized storage owned
        // by this frame; the strings written into `pwd` point into `buf`.
        let rc = unsafe {
            libc::getpwnam_r(
                c_name.as_ptr(),
                &mut pwd,
                buf.as_mut_ptr(),
                buf.len(),
                &mut result,
            )
        };

        if rc == libc::ERANGE && buf_len < MAX_PASSWD_BUFFER {
            buf_len *= 2;
            continue;
        }
        if rc != 0 {
            return Err(io::Error::from_raw_os_error(rc).into());
        }
        if result.is_null() {
            return Ok(None);
        }

        let home = if pwd.pw_dir.is_null() {
            PathBuf::from("/")
        } else {
            // SAFETY: non-null pw_dir is a NUL-terminated string inside `buf`,
            // which is still alive here.
            let dir = unsafe { CStr::from_ptr(pwd.pw_dir) };
            PathBuf::from(OsStr::from_bytes(dir.to_bytes()))
        };

        return Ok(Some(UserInfo {
            name: name.to_string(),
            uid: pwd.pw_uid,
            gid: pwd.pw_gid,
            home,
        }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_and_empty_owner_need_no_switch() {
        assert_eq!(resolve_owner(None).unwrap(), None);
        assert_eq!(resolve_owner(Some("")).unwrap(), None);
        assert_eq!(resolve_owner(Some("root")).unwrap(), None);
    }

    #[test]
    fn root_account_resolves_to_uid_zero() {
        let root = lookup_user("root").unwrap().expect("root exists");
        assert_eq!(root.uid, 0);
    }

    #[test]
    fn unknown_account_is_none() {
        assert_eq!(lookup_user("no-such-user-for-watcher-tests").unwrap(), None);
    }
}
