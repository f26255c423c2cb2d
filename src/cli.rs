//! Command-line interface definitions

use crate::reporter::resolve_log_path;
use anyhow::Result;
use clap::Parser;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Keep a replica directory identical to a source directory, one way, on a fixed interval
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Source directory (never modified)
    #[arg(value_name = "SOURCE")]
    pub source: PathBuf,

    /// Replica directory (made to match the source; extra entries are deleted)
    #[arg(value_name = "REPLICA")]
    pub replica: PathBuf,

    /// Seconds between the start of consecutive passes
    #[arg(value_name = "INTERVAL", value_parser = clap::value_parser!(u64).range(1..))]
    pub interval: u64,

    /// Log file to append to, or a directory to create `mirror.log` in
    #[arg(value_name = "LOG")]
    pub log: Option<PathBuf>,

    /// Run a single pass and exit
    #[arg(long)]
    pub once: bool,

    /// Show a progress spinner while a pass runs
    #[arg(long)]
    pub progress: bool,

    /// Disable colored console output
    #[arg(long)]
    pub no_color: bool,

    /// Verbose diagnostics (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (only errors reach the console; the log file is unaffected)
    #[arg(short, long)]
    pub quiet: bool,
}

impl Args {
    /// Validate command-line arguments
    ///
    /// # Errors
    ///
    /// This function will return an error if:
    /// - The source or replica path does not exist or is not a directory
    /// - The source and replica are the same directory, or one contains the other
    /// - The log file would live in a directory that does not exist
    /// - The log file would live inside the source or the replica
    /// - Both --quiet and --verbose options are used
    pub fn validate(&self) -> Result<()> {
        check_directory("Source", &self.source)?;
        check_directory("Replica", &self.replica)?;

        let source = self.source.canonicalize()?;
        let replica = self.replica.canonicalize()?;
        if source == replica {
            anyhow::bail!(
                "Source and replica are the same directory: {}",
                source.display()
            );
        }
        if replica.starts_with(&source) {
            anyhow::bail!(
                "Replica must not be inside the source: {}",
                replica.display()
            );
        }
        if source.starts_with(&replica) {
            anyhow::bail!(
                "Source must not be inside the replica: {}",
                source.display()
            );
        }

        self.validate_log()?;

        if self.quiet && self.verbose > 0 {
            anyhow::bail!("Cannot use both --quiet and --verbose options");
        }

        Ok(())
    }

    /// Check that the log destination is usable
    ///
    /// Roots that do not exist are skipped, so this also tells whether a
    /// startup error can safely be written to the log.
    ///
    /// # Errors
    ///
    /// Returns an error if the log file would live in a missing directory or
    /// inside the source or replica tree.
    pub fn validate_log(&self) -> Result<()> {
        let Some(log) = self.log_file() else {
            return Ok(());
        };
        let parent = log.parent().filter(|p| !p.as_os_str().is_empty());
        if parent.is_some_and(|dir| !dir.is_dir()) {
            anyhow::bail!("Log directory does not exist: {}", log.display());
        }

        let log = canonical_log_path(&log)?;
        if let Ok(source) = self.source.canonicalize() {
            if log.starts_with(&source) {
                anyhow::bail!("Log file must not be inside the source: {}", log.display());
            }
        }
        if let Ok(replica) = self.replica.canonicalize() {
            if log.starts_with(&replica) {
                anyhow::bail!("Log file must not be inside the replica: {}", log.display());
            }
        }
        Ok(())
    }

    /// Interval between pass starts
    #[must_use]
    pub const fn interval(&self) -> Duration {
        Duration::from_secs(self.interval)
    }

    /// Resolved log file, if a log destination was given
    #[must_use]
    pub fn log_file(&self) -> Option<PathBuf> {
        self.log.as_deref().map(resolve_log_path)
    }
}

/// Absolute form of a log file that may not exist yet
fn canonical_log_path(log: &Path) -> Result<PathBuf> {
    if log.exists() {
        return Ok(log.canonicalize()?);
    }
    let parent = match log.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(dir) => dir.canonicalize()?,
        None => std::env::current_dir()?,
    };
    Ok(match log.file_name() {
        Some(name) => parent.join(name),
        None => parent,
    })
}

fn check_directory(label: &str, path: &Path) -> Result<()> {
    if !path.exists() {
        anyhow::bail!("{label} path does not exist: {}", path.display());
    }
    if !path.is_dir() {
        anyhow::bail!("{label} path is not a directory: {}", path.display());
    }
    Ok(())
}

impl Args {
    /// Create a test Args instance with default values (for testing)
    #[cfg(test)]
    pub fn test_default(source: PathBuf, replica: PathBuf) -> Self {
        Self {
            source,
            replica,
            interval: 60,
            log: None,
            once: false,
            progress: false,
            no_color: false,
            verbose: 0,
            quiet: false,
        }
    }
}
