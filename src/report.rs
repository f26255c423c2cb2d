//! Per-pass change report

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Operation that was being attempted when an item failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Scan,
    CreateDirectory,
    Compare,
    Copy,
    Replace,
    RemoveFile,
    RemoveDirectory,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Scan => "scan",
            Self::CreateDirectory => "create directory",
            Self::Compare => "compare",
            Self::Copy => "copy",
            Self::Replace => "replace",
            Self::RemoveFile => "remove file",
            Self::RemoveDirectory => "remove directory",
        };
        f.write_str(name)
    }
}

/// A single item that could not be mirrored during a pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemFailure {
    pub operation: Operation,
    /// Source-side path, when the operation reads from the source
    pub source: Option<PathBuf>,
    /// Replica-side path the operation targeted
    pub destination: PathBuf,
    /// Rendered underlying cause
    pub message: String,
}

impl fmt::Display for ItemFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            Some(source) => write!(
                f,
                "{} {} -> {}: {}",
                self.operation,
                source.display(),
                self.destination.display(),
                self.message
            ),
            None => write!(
                f,
                "{} {}: {}",
                self.operation,
                self.destination.display(),
                self.message
            ),
        }
    }
}

/// Summary of one mirror pass
///
/// The five change lists hold paths relative to the tree roots, in the order
/// the changes were made.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub dirs_created: Vec<PathBuf>,
    pub dirs_removed: Vec<PathBuf>,
    pub files_copied: Vec<PathBuf>,
    pub files_replaced: Vec<PathBuf>,
    pub files_removed: Vec<PathBuf>,

    /// Items that failed and were skipped
    pub failures: Vec<ItemFailure>,

    /// Source directories visited, excluding the root
    pub dirs_scanned: usize,
    /// Source files visited
    pub files_scanned: usize,
    /// Bytes written into the replica
    pub bytes_copied: u64,
    pub duration: Duration,
}

impl SyncReport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// True when the pass changed nothing in the replica
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.change_count() == 0
    }

    /// Total number of create/copy/replace/remove operations performed
    #[must_use]
    pub fn change_count(&self) -> usize {
        self.dirs_created.len()
            + self.dirs_removed.len()
            + self.files_copied.len()
            + self.files_replaced.len()
            + self.files_removed.len()
    }

    #[must_use]
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }
}
