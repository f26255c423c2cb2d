//! Filesystem primitives used by the mirror engine
//!
//! Thin wrappers over `std::fs` that attach paths to errors and classify the
//! outcomes the engine cares about.

use crate::error::{io_err, Result};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Outcome of trying to remove a replica directory
///
/// A directory that still has entries is an expected condition during the
/// deletion phase, not a failure, so it gets its own variant.
#[derive(Debug)]
pub enum DirRemoval {
    /// The directory was removed
    Removed,
    /// The directory still contains entries and was left in place
    NotEmpty,
    /// Removal failed for another reason
    Failed(io::Error),
}

impl DirRemoval {
    #[must_use]
    pub const fn is_removed(&self) -> bool {
        matches!(self, Self::Removed)
    }
}

/// Remove an empty directory, classifying "not empty" separately from errors
#[must_use]
pub fn remove_dir(path: &Path) -> DirRemoval {
    match fs::remove_dir(path) {
        Ok(()) => DirRemoval::Removed,
        Err(e) if is_not_empty(&e) => {
            debug!("directory not empty, left in place: {}", path.display());
            DirRemoval::NotEmpty
        }
        Err(e) => DirRemoval::Failed(e),
    }
}

fn is_not_empty(err: &io::Error) -> bool {
    // Some platforms report a non-empty rmdir target as EEXIST
    err.kind() == io::ErrorKind::DirectoryNotEmpty
        || matches!(err.raw_os_error(), Some(libc::ENOTEMPTY | libc::EEXIST))
}

/// Remove a single replica file
///
/// # Errors
///
/// Returns an error if the file cannot be removed.
pub fn remove_file(path: &Path) -> Result<()> {
    fs::remove_file(path).map_err(|e| io_err(path, e))
}

/// Remove a replica directory and everything below it
///
/// # Errors
///
/// Returns an error if any part of the tree cannot be removed.
pub fn remove_tree(path: &Path) -> Result<()> {
    fs::remove_dir_all(path).map_err(|e| io_err(path, e))
}

/// Create a directory and any missing ancestors
///
/// # Errors
///
/// Returns an error if the directory cannot be created.
pub fn create_dir_all(path: &Path) -> Result<()> {
    fs::create_dir_all(path).map_err(|e| io_err(path, e))
}

/// Kind of entry found at a path, without following a final symlink
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Missing,
    Directory,
    File,
    /// Symlinks, sockets, fifos, devices
    Other,
}

/// Classify the entry at `path`
///
/// # Errors
///
/// Returns an error if the metadata lookup fails for a reason other than the
/// entry not existing.
pub fn entry_kind(path: &Path) -> Result<EntryKind> {
    match fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => Ok(EntryKind::Directory),
        Ok(meta) if meta.is_file() => Ok(EntryKind::File),
        Ok(_) => Ok(EntryKind::Other),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(EntryKind::Missing),
        Err(e) => Err(io_err(path, e)),
    }
}

/// Whether anything exists at `path` (a dangling symlink counts)
///
/// A missing entry or a missing parent directory means "absent". Any other
/// lookup failure is returned, since the entry may well exist.
///
/// # Errors
///
/// Returns an error if the entry cannot be looked up, for example because
/// a parent directory is not searchable.
pub fn exists_no_follow(path: &Path) -> Result<bool> {
    match fs::symlink_metadata(path) {
        Ok(_) => Ok(true),
        Err(e) if is_absent(&e) => Ok(false),
        Err(e) => Err(io_err(path, e)),
    }
}

fn is_absent(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::NotFound || err.raw_os_error() == Some(libc::ENOTDIR)
}

/// Path of `path` relative to `root`
///
/// Returns `None` if `path` is not below `root`.
#[must_use]
pub fn relative_to(root: &Path, path: &Path) -> Option<PathBuf> {
    path.strip_prefix(root).ok().map(Path::to_path_buf)
}
