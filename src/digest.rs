//! Content equality for mirrored files
//!
//! Two files are considered equal when their sizes match and the SHA-256
//! digests of their contents match. Sizes are compared first so files of
//! different length are never read. Modification times are not consulted:
//! they drift across copies and filesystems, while content does not.
//!
//! The digest is computed by streaming the file in [`CHUNK_SIZE`] blocks,
//! so memory use is independent of file size.

use crate::error::{io_err, Result};
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::Path;
use tracing::trace;

/// Read size used when streaming a file through the hasher
pub const CHUNK_SIZE: usize = 64 * 1024;

/// Whole-content digest of a file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDigest(Vec<u8>);

impl FileDigest {
    /// Wrap raw digest bytes
    #[must_use]
    pub const fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Raw digest bytes
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for FileDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(&self.0))
    }
}

/// Computes a collision-resistant digest over a file's bytes
///
/// The engine only needs equality of digests, so any fixed algorithm works.
/// Implementations must stream the file rather than load it whole.
pub trait ContentDigest {
    /// Digest the full contents of the file at `path`
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or read.
    fn digest_file(&self, path: &Path) -> Result<FileDigest>;
}

impl<D: ContentDigest + ?Sized> ContentDigest for &D {
    fn digest_file(&self, path: &Path) -> Result<FileDigest> {
        (**self).digest_file(path)
    }
}

/// SHA-256 digester used by default
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256Digest;

impl ContentDigest for Sha256Digest {
    fn digest_file(&self, path: &Path) -> Result<FileDigest> {
        let mut file = File::open(path).map_err(|e| io_err(path, e))?;
        let mut hasher = Sha256::new();
        let mut buffer = vec![0u8; CHUNK_SIZE];

        loop {
            let read = match file.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(io_err(path, e)),
            };
            hasher.update(&buffer[..read]);
        }

        let digest = FileDigest::new(hasher.finalize().to_vec());
        trace!("sha256 {} = {}", path.display(), digest);
        Ok(digest)
    }
}

/// Compare two files by size, then by SHA-256 digest
///
/// # Errors
///
/// Returns an error if either file's metadata or content cannot be read.
pub fn files_equal(a: &Path, b: &Path) -> Result<bool> {
    files_equal_with(&Sha256Digest, a, b)
}

/// Compare two files by size, then by the digest produced by `digester`
///
/// # Errors
///
/// Returns an error if either file's metadata or content cannot be read.
pub fn files_equal_with<D: ContentDigest + ?Sized>(digester: &D, a: &Path, b: &Path) -> Result<bool> {
    let size_a = std::fs::metadata(a).map_err(|e| io_err(a, e))?.len();
    let size_b = std::fs::metadata(b).map_err(|e| io_err(b, e))?.len();
    if size_a != size_b {
        return Ok(false);
    }

    Ok(digester.digest_file(a)? == digester.digest_file(b)?)
}
