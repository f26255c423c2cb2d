//! Progress display for a running pass

use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::time::Duration;

/// Spinner showing the current phase and item count of a pass
///
/// A hidden tracker costs nothing, so the engine always holds one.
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    progress_bar: ProgressBar,
}

impl ProgressTracker {
    /// Visible spinner on stderr
    #[must_use]
    pub fn new() -> Self {
        let pb = ProgressBar::new_spinner();
        if let Ok(style) =
            ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {prefix:.bold} {pos} {wide_msg}")
        {
            pb.set_style(style);
        }
        pb.enable_steady_tick(Duration::from_millis(120));

        Self { progress_bar: pb }
    }

    /// Tracker that draws nothing
    #[must_use]
    pub fn hidden() -> Self {
        Self {
            progress_bar: ProgressBar::hidden(),
        }
    }

    /// Start a new phase and reset the item counter
    pub fn set_phase(&self, phase: &'static str) {
        self.progress_bar.set_prefix(phase);
        self.progress_bar.set_position(0);
    }

    /// Record one visited entry
    pub fn tick(&self, path: &Path) {
        self.progress_bar.inc(1);
        self.progress_bar.set_message(path.display().to_string());
    }

    /// Clear the spinner at the end of a pass
    pub fn finish(&self) {
        self.progress_bar.finish_and_clear();
    }
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::hidden()
    }
}
