// src/watch/codec.rs

//! Translation between the kernel's inotify record stream and typed events.
//!
//! The kernel hands out a packed sequence of variable-length records:
//!
//! ```text
//! | wd: i32 | mask: u32 | cookie: u32 | len: u32 | name: [u8; len] |
//! ```
//!
//! `name` is NUL-padded and empty when the event concerns the watched path
//! itself. Decoding never reads past the buffer: a record whose declared
//! length overruns the valid range yields a [`FramingError`] and ends the
//! stream.

use std::ffi::OsStr;
use std::fmt;
use std::ops::{BitOr, BitOrAssign};
use std::os::unix::ffi::OsStrExt;
use std::str::FromStr;

use thiserror::Error;

/// Size of the fixed `inotify_event` header.
pub const RECORD_HEADER_LEN: usize = 16;

/// Longest name the kernel will attach to a record (`NAME_MAX` + NUL).
pub const MAX_NAME_LEN: usize = 256;

/// Read buffer size used by watch handles. Always holds at least one record.
pub const READ_BUFFER_LEN: usize = 4096;

const _: () = assert!(READ_BUFFER_LEN >= RECORD_HEADER_LEN + MAX_NAME_LEN);

/// Closed set of change notifications a job can react to.
///
/// Variants are declared in dispatch precedence order: when one kernel
/// record carries several bits, callbacks fire in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventKind {
    Create,
    Open,
    Access,
    Modify,
    Attrib,
    CloseWrite,
    CloseNoWrite,
    Move,
    MoveSelf,
    Delete,
    DeleteSelf,
}

impl EventKind {
    /// Every kind, in dispatch precedence order.
    pub const ALL: [EventKind; 11] = [
        EventKind::Create,
        EventKind::Open,
        EventKind::Access,
        EventKind::Modify,
        EventKind::Attrib,
        EventKind::CloseWrite,
        EventKind::CloseNoWrite,
        EventKind::Move,
        EventKind::MoveSelf,
        EventKind::Delete,
        EventKind::DeleteSelf,
    ];

    /// Canonical name, used in logs and as the first command argument.
    pub const fn name(self) -> &'static str {
        match self {
            EventKind::Create => "Create",
            EventKind::Open => "Open",
            EventKind::Access => "Access",
            EventKind::Modify => "Modify",
            EventKind::Attrib => "Attrib",
            EventKind::CloseWrite => "CloseWrite",
            EventKind::CloseNoWrite => "CloseNoWrite",
            EventKind::Move => "Move",
            EventKind::MoveSelf => "MoveSelf",
            EventKind::Delete => "Delete",
            EventKind::DeleteSelf => "DeleteSelf",
        }
    }

    /// Resolve a configuration event name.
    ///
    /// Accepts the canonical name as well as the kernel constant spelling
    /// (`IN_CLOSE_WRITE`). Unknown names map to `None`.
    pub fn from_name(name: &str) -> Option<EventKind> {
        let kind = match name {
            "Create" | "IN_CREATE" => EventKind::Create,
            "Open" | "IN_OPEN" => EventKind::Open,
            "Access" | "IN_ACCESS" => EventKind::Access,
            "Modify" | "IN_MODIFY" => EventKind::Modify,
            "Attrib" | "IN_ATTRIB" => EventKind::Attrib,
            "CloseWrite" | "IN_CLOSE_WRITE" => EventKind::CloseWrite,
            "CloseNoWrite" | "IN_CLOSE_NOWRITE" => EventKind::CloseNoWrite,
            "Move" | "IN_MOVE" | "IN_MOVED_FROM" | "IN_MOVED_TO" => EventKind::Move,
            "MoveSelf" | "IN_MOVE_SELF" => EventKind::MoveSelf,
            "Delete" | "IN_DELETE" => EventKind::Delete,
            "DeleteSelf" | "IN_DELETE_SELF" => EventKind::DeleteSelf,
            _ => return None,
        };
        Some(kind)
    }

    /// Kernel mask bits that correspond to this kind.
    pub const fn kernel_bits(self) -> u32 {
        match self {
            EventKind::Create => libc::IN_CREATE,
            EventKind::Open => libc::IN_OPEN,
            EventKind::Access => libc::IN_ACCESS,
            EventKind::Modify => libc::IN_MODIFY,
            EventKind::Attrib => libc::IN_ATTRIB,
            EventKind::CloseWrite => libc::IN_CLOSE_WRITE,
            EventKind::CloseNoWrite => libc::IN_CLOSE_NOWRITE,
            EventKind::Move => libc::IN_MOVED_FROM | libc::IN_MOVED_TO,
            EventKind::MoveSelf => libc::IN_MOVE_SELF,
            EventKind::Delete => libc::IN_DELETE,
            EventKind::DeleteSelf => libc::IN_DELETE_SELF,
        }
    }

    /// True for kinds that describe the watched path itself.
    pub const fn is_self_event(self) -> bool {
        matches!(self, EventKind::DeleteSelf | EventKind::MoveSelf)
    }

    const fn bit(self) -> u16 {
        1 << (self as u16)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for EventKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventKind::from_name(s.trim()).ok_or_else(|| format!("unknown inotify event name: {s}"))
    }
}

/// Set of [`EventKind`]s.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct EventMask(u16);

impl EventMask {
    pub const EMPTY: EventMask = EventMask(0);

    /// Mask used when a job does not list its events: `CloseWrite | DeleteSelf`.
    pub const DEFAULT: EventMask =
        EventMask(EventKind::CloseWrite.bit() | EventKind::DeleteSelf.bit());

    pub const fn of(kind: EventKind) -> Self {
        EventMask(kind.bit())
    }

    pub const fn with(self, kind: EventKind) -> Self {
        EventMask(self.0 | kind.bit())
    }

    pub const fn union(self, other: EventMask) -> Self {
        EventMask(self.0 | other.0)
    }

    pub const fn contains(self, kind: EventKind) -> bool {
        self.0 & kind.bit() != 0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Kinds in this mask, in dispatch precedence order.
    pub fn kinds(self) -> impl Iterator<Item = EventKind> {
        EventKind::ALL.into_iter().filter(move |k| self.contains(*k))
    }

    /// Build a mask from configuration names.
    ///
    /// Returns the mask together with the names that did not resolve; those
    /// contribute no bit.
    pub fn from_names<I, S>(names: I) -> (EventMask, Vec<String>)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut mask = EventMask::EMPTY;
        let mut unknown = Vec::new();
        for name in names {
            let name = name.as_ref();
            match EventKind::from_name(name) {
                Some(kind) => mask |= kind,
                None => unknown.push(name.to_string()),
            }
        }
        (mask, unknown)
    }

    /// Kernel mask for `inotify_add_watch`.
    pub fn to_kernel(self) -> u32 {
        self.kinds().fold(0, |bits, kind| bits | kind.kernel_bits())
    }

    /// Classify the bits of a kernel record. Bits with no [`EventKind`]
    /// (`IN_ISDIR`, `IN_IGNORED`, ...) are dropped.
    pub fn from_kernel(bits: u32) -> Self {
        EventKind::ALL
            .into_iter()
            .filter(|k| bits & k.kernel_bits() != 0)
            .collect()
    }
}

impl BitOr for EventMask {
    type Output = EventMask;

    fn bitor(self, rhs: EventMask) -> EventMask {
        self.union(rhs)
    }
}

impl BitOr<EventKind> for EventMask {
    type Output = EventMask;

    fn bitor(self, rhs: EventKind) -> EventMask {
        self.with(rhs)
    }
}

impl BitOrAssign<EventKind> for EventMask {
    fn bitor_assign(&mut self, rhs: EventKind) {
        *self = self.with(rhs);
    }
}

impl FromIterator<EventKind> for EventMask {
    fn from_iter<T: IntoIterator<Item = EventKind>>(iter: T) -> Self {
        iter.into_iter().fold(EventMask::EMPTY, EventMask::with)
    }
}

impl fmt::Display for EventMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("(none)");
        }
        let mut first = true;
        for kind in self.kinds() {
            if !first {
                f.write_str("|")?;
            }
            f.write_str(kind.name())?;
            first = false;
        }
        Ok(())
    }
}

impl fmt::Debug for EventMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EventMask({self})")
    }
}

/// The kernel stream could not be split into records.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FramingError {
    #[error("truncated record header at offset {offset}: {available} of 16 bytes")]
    TruncatedHeader { offset: usize, available: usize },

    #[error("record at offset {offset} declares a {len}-byte name but only {available} bytes remain")]
    NameOverrun {
        offset: usize,
        len: usize,
        available: usize,
    },
}

/// One decoded kernel record, borrowing its name from the read buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawRecord<'a> {
    pub wd: i32,
    pub mask: u32,
    pub cookie: u32,
    name: &'a [u8],
}

impl<'a> RawRecord<'a> {
    /// Name of the affected child with the NUL padding stripped; empty when
    /// the record concerns the watched path itself.
    pub fn name(&self) -> &'a OsStr {
        let end = self
            .name
            .iter()
            .position(|b| *b == 0)
            .unwrap_or(self.name.len());
        OsStr::from_bytes(&self.name[..end])
    }

    /// The kernel dropped the watch (`IN_IGNORED`). Not an application event.
    pub fn is_watch_removed(&self) -> bool {
        self.mask & libc::IN_IGNORED != 0
    }

    /// The kernel event queue overflowed (`IN_Q_OVERFLOW`).
    pub fn is_queue_overflow(&self) -> bool {
        self.mask & libc::IN_Q_OVERFLOW != 0
    }

    /// The subject of the record is a directory (`IN_ISDIR`).
    pub fn is_dir(&self) -> bool {
        self.mask & libc::IN_ISDIR != 0
    }

    /// Event kinds carried by this record, in dispatch precedence order.
    pub fn kinds(&self) -> impl Iterator<Item = EventKind> {
        EventMask::from_kernel(self.mask).kinds()
    }
}

/// Sequential decoder over one read batch.
///
/// Yields records until the buffer is exhausted. After the first
/// [`FramingError`] it yields nothing more.
#[derive(Debug, Clone)]
pub struct RecordDecoder<'a> {
    buf: &'a [u8],
    offset: usize,
    failed: bool,
}

/// Decode the valid range `buf` of one read.
pub fn decode_records(buf: &[u8]) -> RecordDecoder<'_> {
    RecordDecoder {
        buf,
        offset: 0,
        failed: false,
    }
}

impl<'a> Iterator for RecordDecoder<'a> {
    type Item = Result<RawRecord<'a>, FramingError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.offset >= self.buf.len() {
            return None;
        }

        let offset = self.offset;
        let rest = &self.buf[offset..];
        if rest.len() < RECORD_HEADER_LEN {
            self.failed = true;
            return Some(Err(FramingError::TruncatedHeader {
                offset,
                available: rest.len(),
            }));
        }

        let wd = read_u32(rest, 0) as i32;
        let mask = read_u32(rest, 4);
        let cookie = read_u32(rest, 8);
        let len = read_u32(rest, 12) as usize;

        let available = rest.len() - RECORD_HEADER_LEN;
        if len > available {
            self.failed = true;
            return Some(Err(FramingError::NameOverrun {
                offset,
                len,
                available,
            }));
        }

        let name = &rest[RECORD_HEADER_LEN..RECORD_HEADER_LEN + len];
        self.offset = offset + RECORD_HEADER_LEN + len;

        Some(Ok(RawRecord {
            wd,
            mask,
            cookie,
            name,
        }))
    }
}

// Callers guarantee `at + 4 <= bytes.len()`.
fn read_u32(bytes: &[u8], at: usize) -> u32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&bytes[at..at + 4]);
    u32::from_ne_bytes(raw)
}

/// Encode one record the way the kernel lays it out (name NUL-padded to a
/// multiple of four bytes). Used by fakes and tests.
pub fn encode_record(wd: i32, mask: u32, cookie: u32, name: &[u8]) -> Vec<u8> {
    let padded = if name.is_empty() {
        0
    } else {
        (name.len() + 1).div_ceil(4) * 4
    };

    let mut out = Vec::with_capacity(RECORD_HEADER_LEN + padded);
    out.extend_from_slice(&wd.to_ne_bytes());
    out.extend_from_slice(&mask.to_ne_bytes());
    out.extend_from_slice(&cookie.to_ne_bytes());
    out.extend_from_slice(&(padded as u32).to_ne_bytes());
    out.extend_from_slice(name);
    out.resize(RECORD_HEADER_LEN + padded, 0);
    out
}
