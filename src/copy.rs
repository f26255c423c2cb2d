//! Atomic file copying with metadata preservation
//!
//! Files are never written in place. The bytes are streamed into a hidden
//! temporary file created next to the destination, flushed to disk, given the
//! source's permissions and then renamed over the destination. A pass that is
//! interrupted mid-copy therefore leaves either the old replica file or the
//! new one, never a truncated mix. A temporary file orphaned by a killed
//! process has no counterpart in the source tree and is removed by the next
//! deletion phase.
//!
//! After the rename, the source's access and modification times are applied
//! to the destination with `filetime`.
//!
//! # Usage
//!
//! ```rust,no_run
//! use dirmirror::copy::copy_file_atomic;
//! use std::path::Path;
//!
//! let bytes = copy_file_atomic(Path::new("src/a.txt"), Path::new("replica/a.txt"))?;
//! println!("copied {bytes} bytes");
//! # Ok::<(), dirmirror::SyncError>(())
//! ```

use crate::error::{Result, SyncError};
use filetime::FileTime;
use std::fs::File;
use std::io;
use std::path::Path;
use tracing::debug;

/// Prefix of the temporary files created in replica directories
pub const TEMP_PREFIX: &str = ".dirmirror-";

/// Suffix of in-flight copy files
pub const TEMP_SUFFIX: &str = ".tmp";

/// Length of the random part between prefix and suffix
const TEMP_RAND_LEN: usize = 8;

/// Copy `src` to `dst` atomically, preserving permissions and timestamps
///
/// `dst` may or may not exist; an existing file is replaced by rename. The
/// parent directory of `dst` must exist.
///
/// # Returns
///
/// The number of bytes written.
///
/// # Errors
///
/// Returns [`SyncError::CopyFailed`] carrying both paths and the underlying
/// I/O error if any step fails (open, read, write, fsync, chmod, rename,
/// timestamp update). On failure the temporary file is removed.
pub fn copy_file_atomic(src: &Path, dst: &Path) -> Result<u64> {
    let fail = |cause: io::Error| SyncError::CopyFailed {
        from: src.to_path_buf(),
        to: dst.to_path_buf(),
        cause,
    };

    let parent = dst
        .parent()
        .ok_or_else(|| fail(io::Error::new(io::ErrorKind::InvalidInput, "destination has no parent")))?;

    let mut src_file = File::open(src).map_err(fail)?;
    let metadata = src_file.metadata().map_err(fail)?;

    let mut tmp = tempfile::Builder::new()
        .prefix(TEMP_PREFIX)
        .rand_bytes(TEMP_RAND_LEN)
        .suffix(TEMP_SUFFIX)
        .tempfile_in(parent)
        .map_err(fail)?;

    // File-to-file io::copy lets std use copy_file_range/sendfile on Linux
    let bytes = io::copy(&mut src_file, tmp.as_file_mut()).map_err(fail)?;
    tmp.as_file().sync_all().map_err(fail)?;
    tmp.as_file()
        .set_permissions(metadata.permissions())
        .map_err(fail)?;

    tmp.persist(dst).map_err(|e| fail(e.error))?;

    let atime = FileTime::from_last_access_time(&metadata);
    let mtime = FileTime::from_last_modification_time(&metadata);
    filetime::set_file_times(dst, atime, mtime).map_err(fail)?;

    debug!("copied {} -> {} ({} bytes)", src.display(), dst.display(), bytes);
    Ok(bytes)
}

/// Whether `path` names a temporary file left behind by [`copy_file_atomic`]
#[must_use]
pub fn is_temp_artifact(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .and_then(|name| name.strip_prefix(TEMP_PREFIX))
        .and_then(|rest| rest.strip_suffix(TEMP_SUFFIX))
        .is_some_and(|random| {
            random.len() == TEMP_RAND_LEN && random.bytes().all(|b| b.is_ascii_alphanumeric())
        })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    #[test]
    fn test_copy_new_file() {
        let temp_dir = TempDir::new().unwrap();
        let src = temp_dir.path().join("source.txt");
        let dst = temp_dir.path().join("destination.txt");
        fs::write(&src, "Hello, World!").unwrap();

        let bytes = copy_file_atomic(&src, &dst).unwrap();

        assert_eq!(bytes, 13);
        assert_eq!(fs::read_to_string(&dst).unwrap(), "Hello, World!");
    }

    #[test]
    fn test_copy_replaces_existing_file() {
        let temp_dir = TempDir::new().unwrap();
        let src = temp_dir.path().join("source.txt");
        let dst = temp_dir.path().join("destination.txt");
        fs::write(&src, "new").unwrap();
        fs::write(&dst, "old contents that are longer").unwrap();

        copy_file_atomic(&src, &dst).unwrap();

        assert_eq!(fs::read_to_string(&dst).unwrap(), "new");
    }

    #[test]
    fn test_permission_preservation() {
        let temp_dir = TempDir::new().unwrap();
        let src = temp_dir.path().join("source.sh");
        let dst = temp_dir.path().join("destination.sh");
        fs::write(&src, "#!/bin/sh\n").unwrap();
        fs::set_permissions(&src, fs::Permissions::from_mode(0o750)).unwrap();

        copy_file_atomic(&src, &dst).unwrap();

        let src_mode = fs::metadata(&src).unwrap().permissions().mode();
        let dst_mode = fs::metadata(&dst).unwrap().permissions().mode();
        assert_eq!(src_mode & 0o777, dst_mode & 0o777);
    }

    #[test]
    fn test_timestamp_preservation() {
        let temp_dir = TempDir::new().unwrap();
        let src = temp_dir.path().join("source.txt");
        let dst = temp_dir.path().join("destination.txt");
        fs::write(&src, "Hello").unwrap();
        let past = FileTime::from_unix_time(1_500_000_000, 0);
        filetime::set_file_mtime(&src, past).unwrap();

        copy_file_atomic(&src, &dst).unwrap();

        let dst_meta = fs::metadata(&dst).unwrap();
        assert_eq!(FileTime::from_last_modification_time(&dst_meta), past);
    }

    #[test]
    fn test_no_temp_file_left_behind() {
        let temp_dir = TempDir::new().unwrap();
        let src = temp_dir.path().join("source.txt");
        let dst_dir = temp_dir.path().join("out");
        fs::create_dir(&dst_dir).unwrap();
        fs::write(&src, "data").unwrap();

        copy_file_atomic(&src, &dst_dir.join("source.txt")).unwrap();

        let names: Vec<_> = fs::read_dir(&dst_dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("source.txt")]);
    }

    #[test]
    fn test_missing_source_reports_both_paths() {
        let temp_dir = TempDir::new().unwrap();
        let src = temp_dir.path().join("missing.txt");
        let dst = temp_dir.path().join("destination.txt");

        let err = copy_file_atomic(&src, &dst).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("missing.txt"));
        assert!(message.contains("destination.txt"));
        assert!(!dst.exists());
    }

    #[test]
    fn test_is_temp_artifact() {
        assert!(is_temp_artifact(Path::new("/r/.dirmirror-aB3xY9q2.tmp")));
        assert!(!is_temp_artifact(Path::new("/r/notes.txt")));
        // Same prefix, but not a name this crate generates
        assert!(!is_temp_artifact(Path::new("/r/.dirmirror-notes")));
        assert!(!is_temp_artifact(Path::new("/r/.dirmirror-config.tmp")));
        assert!(!is_temp_artifact(Path::new("/r/.dirmirror-ab-cd-ef.tmp")));
    }
}
