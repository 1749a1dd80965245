// src/fs/mod.rs

use std::fmt::Debug;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

pub mod mock;

/// Abstract filesystem interface used for job planning and config loading.
pub trait FileSystem: Send + Sync + Debug {
    fn read_to_string(&self, path: &Path) -> Result<String>;
    fn exists(&self, path: &Path) -> bool;
    fn is_file(&self, path: &Path) -> bool;
    fn is_dir(&self, path: &Path) -> bool;

    /// True if `path` itself is a symbolic link (not followed).
    fn is_symlink(&self, path: &Path) -> bool;

    /// Return a list of entries in a directory.
    /// Returns full paths.
    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>>;
}

/// Implementation that uses `std::fs`.
#[derive(Debug, Clone, Default)]
pub struct RealFileSystem;

impl FileSystem for RealFileSystem {
    fn read_to_string(&self, path: &Path) -> Result<String> {
        fs::read_to_string(path).with_context(|| format!("reading file {:?}", path))
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn is_symlink(&self, path: &Path) -> bool {
        path.is_symlink()
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let mut entries = Vec::new();
        for entry in fs::read_dir(path).with_context(|| format!("reading dir {:?}", path))? {
            let entry = entry?;
            entries.push(entry.path());
        }
        Ok(entries)
    }
}

/// All directories below `root` (inclusive), `root` first, found by a
/// point-in-time recursive scan.
///
/// Symlinked directories are not descended into. Unreadable directories are
/// kept but their children are skipped.
pub fn scan_dirs(fs: &dyn FileSystem, root: &Path) -> Vec<PathBuf> {
    let mut found = Vec::new();
    if !fs.is_dir(root) {
        return found;
    }

    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        let children = match fs.read_dir(&dir) {
            Ok(children) => children,
            Err(err) => {
                tracing::warn!(path = ?dir, error = %err, "cannot scan directory");
                Vec::new()
            }
        };

        let mut subdirs: Vec<PathBuf> = children
            .into_iter()
            .filter(|p| fs.is_dir(p) && !fs.is_symlink(p))
            .collect();
        subdirs.sort();

        found.push(dir);
        // Reverse so the stack pops children in sorted order.
        pending.extend(subdirs.into_iter().rev());
    }

    found
}
