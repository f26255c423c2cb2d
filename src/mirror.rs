//! The mirror engine
//!
//! One call to [`MirrorEngine::run_pass`] makes the replica tree match the
//! source tree. The pass runs in three strictly ordered phases, each walking
//! a whole tree before the next begins:
//!
//! 1. **Directories**: walk the source top-down and create every directory
//!    missing from the replica, including empty ones. Parents are always
//!    visited before their children.
//! 2. **Files**: walk the source again. Files missing from the replica are
//!    copied; files present on both sides are compared by content (see
//!    [`crate::digest`]) and rewritten when they differ.
//! 3. **Deletion**: walk the replica children-first. Files with no source
//!    counterpart are deleted, then directories with no source counterpart
//!    are removed. Because children are visited before their parent, a
//!    stale nested tree disappears in a single pass.
//!
//! Failures on individual items never abort a pass. They are logged, recorded
//! in [`SyncReport::failures`] and the walk moves on. Only an inaccessible
//! root fails the whole pass.
//!
//! The engine is synchronous and keeps no state between passes; the two
//! trees are the only source of truth.

use crate::copy::{copy_file_atomic, is_temp_artifact};
use crate::digest::{files_equal_with, ContentDigest, Sha256Digest};
use crate::error::{Result, SyncError};
use crate::fs_ops::{self, entry_kind, relative_to, DirRemoval, EntryKind};
use crate::progress::ProgressTracker;
use crate::report::{ItemFailure, Operation, SyncReport};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

/// Run one mirror pass from `source` onto `replica` with default settings
///
/// # Errors
///
/// Returns an error if either root is missing, unreadable or not a directory.
/// Per-item errors are reported in the returned [`SyncReport`] instead.
pub fn run_sync_pass(source: &Path, replica: &Path) -> Result<SyncReport> {
    MirrorEngine::new(source, replica).run_pass()
}

/// Mirrors a source tree onto a replica tree
#[derive(Debug, Clone)]
pub struct MirrorEngine<D = Sha256Digest> {
    source: PathBuf,
    replica: PathBuf,
    digester: D,
    show_progress: bool,
}

impl MirrorEngine {
    /// Engine comparing file contents with SHA-256
    pub fn new(source: impl Into<PathBuf>, replica: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            replica: replica.into(),
            digester: Sha256Digest,
            show_progress: false,
        }
    }
}

impl<D: ContentDigest> MirrorEngine<D> {
    /// Replace the content digester
    pub fn with_digester<E: ContentDigest>(self, digester: E) -> MirrorEngine<E> {
        MirrorEngine {
            source: self.source,
            replica: self.replica,
            digester,
            show_progress: self.show_progress,
        }
    }

    /// Show a spinner on stderr while a pass runs
    #[must_use]
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    #[must_use]
    pub fn source(&self) -> &Path {
        &self.source
    }

    #[must_use]
    pub fn replica(&self) -> &Path {
        &self.replica
    }

    /// Run one full three-phase pass
    ///
    /// # Errors
    ///
    /// Returns an error if either root is missing, unreadable or not a
    /// directory at the start of the pass.
    pub fn run_pass(&self) -> Result<SyncReport> {
        let start_time = Instant::now();
        check_root(&self.source)?;
        check_root(&self.replica)?;

        info!(
            "Starting mirror pass from {} to {}",
            self.source.display(),
            self.replica.display()
        );

        let progress = if self.show_progress {
            ProgressTracker::new()
        } else {
            ProgressTracker::hidden()
        };

        let mut pass = Pass {
            source: &self.source,
            replica: &self.replica,
            digester: &self.digester,
            progress: &progress,
            report: SyncReport::new(),
        };

        pass.reconcile_directories();
        pass.reconcile_files();
        pass.delete_stale();

        progress.finish();
        let mut report = pass.report;
        report.duration = start_time.elapsed();

        info!(
            "Mirror pass completed in {:?}: {} changes, {} errors",
            report.duration,
            report.change_count(),
            report.failures.len()
        );
        Ok(report)
    }
}

fn check_root(root: &Path) -> Result<()> {
    let metadata = std::fs::metadata(root).map_err(|source| SyncError::RootUnavailable {
        path: root.to_path_buf(),
        source,
    })?;
    if !metadata.is_dir() {
        return Err(SyncError::NotADirectory(root.to_path_buf()));
    }
    // Listing the root proves it is readable, not just present
    std::fs::read_dir(root).map_err(|source| SyncError::RootUnavailable {
        path: root.to_path_buf(),
        source,
    })?;
    Ok(())
}

/// State of a single pass
struct Pass<'a, D> {
    source: &'a Path,
    replica: &'a Path,
    digester: &'a D,
    progress: &'a ProgressTracker,
    report: SyncReport,
}

impl<D: ContentDigest> Pass<'_, D> {
    /// Phase 1: create every source directory that is missing from the replica
    fn reconcile_directories(&mut self) {
        self.progress.set_phase("directories");

        for entry in WalkDir::new(self.source).min_depth(1) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    self.walk_error(e);
                    continue;
                }
            };
            if !entry.file_type().is_dir() {
                continue;
            }

            let Some(rel) = relative_to(self.source, entry.path()) else {
                continue;
            };
            self.progress.tick(&rel);
            self.report.dirs_scanned += 1;

            let target = self.replica.join(&rel);
            match entry_kind(&target) {
                Ok(EntryKind::Directory) => continue,
                Ok(EntryKind::Missing) => {}
                Ok(EntryKind::File | EntryKind::Other) => {
                    // A file where the source has a directory has to go first
                    if let Err(e) = fs_ops::remove_file(&target) {
                        self.fail(Operation::RemoveFile, None, &target, &e);
                        continue;
                    }
                    debug!("removed file blocking directory {}", target.display());
                    self.report.files_removed.push(rel.clone());
                }
                Err(e) => {
                    self.fail(Operation::Scan, None, &target, &e);
                    continue;
                }
            }

            match fs_ops::create_dir_all(&target) {
                Ok(()) => {
                    debug!("created directory {}", target.display());
                    self.report.dirs_created.push(rel);
                }
                Err(e) => self.fail(Operation::CreateDirectory, Some(entry.path()), &target, &e),
            }
        }
    }

    /// Phase 2: copy new files and rewrite files whose content differs
    fn reconcile_files(&mut self) {
        self.progress.set_phase("files");

        for entry in WalkDir::new(self.source).min_depth(1) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    self.walk_error(e);
                    continue;
                }
            };
            // Symlinks count as files when they resolve to one
            let is_file = entry.file_type().is_file()
                || (entry.path_is_symlink() && entry.path().is_file());
            if !is_file {
                continue;
            }

            let Some(rel) = relative_to(self.source, entry.path()) else {
                continue;
            };
            self.progress.tick(&rel);
            self.report.files_scanned += 1;

            let src = entry.path();
            let dst = self.replica.join(&rel);

            let operation = match entry_kind(&dst) {
                Ok(EntryKind::Missing) => Operation::Copy,
                Ok(EntryKind::Directory) => {
                    // A directory where the source has a file
                    if let Err(e) = fs_ops::remove_tree(&dst) {
                        self.fail(Operation::RemoveDirectory, None, &dst, &e);
                        continue;
                    }
                    debug!("removed directory blocking file {}", dst.display());
                    self.report.dirs_removed.push(rel.clone());
                    Operation::Copy
                }
                Ok(EntryKind::Other) => Operation::Replace,
                Ok(EntryKind::File) => match files_equal_with(self.digester, src, &dst) {
                    Ok(true) => continue,
                    Ok(false) => Operation::Replace,
                    Err(e) => {
                        if self.vanished(src) {
                            continue;
                        }
                        self.fail(Operation::Compare, Some(src), &dst, &e);
                        continue;
                    }
                },
                Err(e) => {
                    self.fail(Operation::Scan, None, &dst, &e);
                    continue;
                }
            };

            match copy_file_atomic(src, &dst) {
                Ok(bytes) => {
                    self.report.bytes_copied += bytes;
                    if operation == Operation::Copy {
                        self.report.files_copied.push(rel);
                    } else {
                        self.report.files_replaced.push(rel);
                    }
                }
                Err(e) => {
                    if self.vanished(src) {
                        continue;
                    }
                    self.fail(operation, Some(src), &dst, &e);
                }
            }
        }
    }

    /// Phase 3: delete replica entries that no longer exist in the source
    fn delete_stale(&mut self) {
        self.progress.set_phase("cleanup");

        let walker = WalkDir::new(self.replica).min_depth(1).contents_first(true);
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    self.walk_error(e);
                    continue;
                }
            };
            let Some(rel) = relative_to(self.replica, entry.path()) else {
                continue;
            };
            self.progress.tick(&rel);

            let path = entry.path();
            let counterpart = self.source.join(&rel);
            match fs_ops::exists_no_follow(&counterpart) {
                Ok(true) => continue,
                Ok(false) => {}
                Err(e) => {
                    // Unknown source state: keep the replica entry
                    self.fail(Operation::Scan, Some(&counterpart), path, &e);
                    continue;
                }
            }

            if entry.file_type().is_dir() {
                match fs_ops::remove_dir(path) {
                    DirRemoval::Removed => {
                        debug!("removed directory {}", path.display());
                        self.report.dirs_removed.push(rel);
                    }
                    DirRemoval::NotEmpty => {}
                    DirRemoval::Failed(e) if e.kind() == io::ErrorKind::NotFound => {}
                    DirRemoval::Failed(e) => {
                        self.fail(Operation::RemoveDirectory, None, path, &e);
                    }
                }
            } else {
                match fs_ops::remove_file(path) {
                    Ok(()) if is_temp_artifact(path) => {
                        debug!("removed leftover temporary file {}", path.display());
                    }
                    Ok(()) => {
                        debug!("removed file {}", path.display());
                        self.report.files_removed.push(rel);
                    }
                    Err(e) => self.fail(Operation::RemoveFile, None, path, &e),
                }
            }
        }
    }

    /// A source entry deleted mid-pass is skipped; the next pass catches up
    ///
    /// If the source cannot even be looked up it has not vanished, and the
    /// caller records the original failure.
    fn vanished(&self, src: &Path) -> bool {
        match fs_ops::exists_no_follow(src) {
            Ok(false) => {
                debug!("source vanished during pass, skipping {}", src.display());
                true
            }
            Ok(true) => false,
            Err(e) => {
                debug!("source lookup failed: {e}");
                false
            }
        }
    }

    fn walk_error(&mut self, err: walkdir::Error) {
        // Entries removed while the walk is in flight are expected
        if err.io_error().map(io::Error::kind) == Some(io::ErrorKind::NotFound) {
            debug!("entry vanished during walk: {err}");
            return;
        }
        warn!("directory walk error: {err}");
        let destination = err.path().map(Path::to_path_buf).unwrap_or_default();
        let message = SyncError::from(err).to_string();
        self.report.failures.push(ItemFailure {
            operation: Operation::Scan,
            source: None,
            destination,
            message,
        });
    }

    fn fail(
        &mut self,
        operation: Operation,
        source: Option<&Path>,
        destination: &Path,
        err: &dyn std::fmt::Display,
    ) {
        let failure = ItemFailure {
            operation,
            source: source.map(Path::to_path_buf),
            destination: destination.to_path_buf(),
            message: err.to_string(),
        };
        error!("{failure}");
        self.report.failures.push(failure);
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn trees() -> (TempDir, PathBuf, PathBuf) {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("source");
        let replica = temp_dir.path().join("replica");
        fs::create_dir(&source).unwrap();
        fs::create_dir(&replica).unwrap();
        (temp_dir, source, replica)
    }

    #[test]
    fn test_missing_root_fails_pass() {
        let (temp_dir, source, _replica) = trees();
        let err = run_sync_pass(&source, &temp_dir.path().join("nope")).unwrap_err();
        assert!(matches!(err, SyncError::RootUnavailable { .. }));
    }

    #[test]
    fn test_root_that_is_a_file_fails_pass() {
        let (temp_dir, _source, replica) = trees();
        let file = temp_dir.path().join("file");
        fs::write(&file, "x").unwrap();
        let err = run_sync_pass(&file, &replica).unwrap_err();
        assert!(matches!(err, SyncError::NotADirectory(_)));
    }

    #[test]
    fn test_file_in_place_of_directory_is_replaced() {
        let (_temp_dir, source, replica) = trees();
        fs::create_dir_all(source.join("conf/nested")).unwrap();
        fs::write(replica.join("conf"), "i am a file").unwrap();

        let report = run_sync_pass(&source, &replica).unwrap();

        assert!(replica.join("conf/nested").is_dir());
        assert_eq!(report.files_removed, vec![PathBuf::from("conf")]);
        assert_eq!(
            report.dirs_created,
            vec![PathBuf::from("conf"), PathBuf::from("conf/nested")]
        );
        assert!(report.failures.is_empty());
    }

    #[test]
    fn test_directory_in_place_of_file_is_replaced() {
        let (_temp_dir, source, replica) = trees();
        fs::write(source.join("data"), "payload").unwrap();
        fs::create_dir_all(replica.join("data/inner")).unwrap();
        fs::write(replica.join("data/inner/x"), "x").unwrap();

        let report = run_sync_pass(&source, &replica).unwrap();

        assert_eq!(fs::read_to_string(replica.join("data")).unwrap(), "payload");
        assert_eq!(report.dirs_removed, vec![PathBuf::from("data")]);
        assert_eq!(report.files_copied, vec![PathBuf::from("data")]);
    }

    #[test]
    fn test_leftover_temp_file_is_cleaned_silently() {
        let (_temp_dir, source, replica) = trees();
        fs::write(replica.join(".dirmirror-abc12345.tmp"), "partial").unwrap();

        let report = run_sync_pass(&source, &replica).unwrap();

        assert!(!replica.join(".dirmirror-abc12345.tmp").exists());
        assert!(report.files_removed.is_empty());
    }

    #[test]
    fn test_stale_file_with_temp_prefix_is_reported() {
        let (_temp_dir, source, replica) = trees();
        fs::write(replica.join(".dirmirror-settings"), "user data").unwrap();

        let report = run_sync_pass(&source, &replica).unwrap();

        assert!(!replica.join(".dirmirror-settings").exists());
        assert_eq!(report.files_removed, vec![PathBuf::from(".dirmirror-settings")]);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_file_is_copied_as_content() {
        let (temp_dir, source, replica) = trees();
        let outside = temp_dir.path().join("outside.txt");
        fs::write(&outside, "linked").unwrap();
        std::os::unix::fs::symlink(&outside, source.join("link.txt")).unwrap();

        let report = run_sync_pass(&source, &replica).unwrap();

        let copied = replica.join("link.txt");
        assert!(!fs::symlink_metadata(&copied).unwrap().file_type().is_symlink());
        assert_eq!(fs::read_to_string(copied).unwrap(), "linked");
        assert_eq!(report.files_copied, vec![PathBuf::from("link.txt")]);
    }

    #[test]
    fn test_scan_counts_on_noop_pass() {
        let (_temp_dir, source, replica) = trees();
        fs::create_dir_all(source.join("a/b")).unwrap();
        fs::write(source.join("a/one.txt"), "1").unwrap();
        fs::write(source.join("a/b/two.txt"), "2").unwrap();

        run_sync_pass(&source, &replica).unwrap();
        let second = run_sync_pass(&source, &replica).unwrap();

        assert!(second.is_noop());
        assert_eq!(second.dirs_scanned, 2);
        assert_eq!(second.files_scanned, 2);
    }
}
