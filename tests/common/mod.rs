//! Common helpers for integration tests

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use walkdir::WalkDir;

/// A source and a replica directory under one temporary root
pub struct Trees {
    root: TempDir,
    pub source: PathBuf,
    pub replica: PathBuf,
}

impl Trees {
    pub fn new() -> Self {
        let root = TempDir::new().expect("Failed to create temp directory");
        let source = root.path().join("source");
        let replica = root.path().join("replica");
        fs::create_dir(&source).expect("Failed to create source");
        fs::create_dir(&replica).expect("Failed to create replica");
        Self {
            root,
            source,
            replica,
        }
    }

    pub fn root(&self) -> &Path {
        self.root.path()
    }
}

/// Write `contents` to `root/rel`, creating parent directories
pub fn write_file(root: &Path, rel: &str, contents: &str) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("Failed to create parent directory");
    }
    fs::write(path, contents).expect("Failed to write file");
}

/// Every entry below `root` as (relative path, Some(contents) for files / None for directories)
pub fn snapshot(root: &Path) -> Vec<(PathBuf, Option<Vec<u8>>)> {
    let mut entries: Vec<_> = WalkDir::new(root)
        .min_depth(1)
        .into_iter()
        .map(|entry| entry.expect("walk failed"))
        .map(|entry| {
            let rel = entry.path().strip_prefix(root).unwrap().to_path_buf();
            let contents = if entry.file_type().is_dir() {
                None
            } else {
                Some(fs::read(entry.path()).expect("read failed"))
            };
            (rel, contents)
        })
        .collect();
    entries.sort();
    entries
}

pub fn paths(items: &[&str]) -> Vec<PathBuf> {
    items.iter().map(PathBuf::from).collect()
}
