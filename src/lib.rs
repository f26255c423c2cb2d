//! dirmirror: one-way periodic directory mirroring
//!
//! This library keeps a replica directory tree identical to a source tree.
//! Each pass creates missing directories, copies new files, rewrites files
//! whose content changed (size, then SHA-256), and deletes replica entries
//! that no longer exist in the source. Copies go through a temporary file and
//! an atomic rename so the replica never holds a half-written file.

pub mod cli;
pub mod copy;
pub mod digest;
pub mod error;
pub mod fs_ops;
pub mod mirror;
pub mod progress;
pub mod report;
pub mod reporter;
pub mod scheduler;
pub mod signal;

// Re-export commonly used types
pub use digest::{files_equal, ContentDigest, Sha256Digest};
pub use error::{Result, SyncError};
pub use mirror::{run_sync_pass, MirrorEngine};
pub use report::SyncReport;
pub use reporter::{ChangeReporter, ReporterConfig};
pub use scheduler::Scheduler;
pub use signal::ShutdownToken;
