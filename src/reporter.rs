//! Rendering of pass results to the console and the log file
//!
//! Every batch of output starts with a local timestamp line and may be
//! followed by indented detail lines. The console copy is optionally color
//! coded; the log file always receives plain text and is only ever appended
//! to.

use crate::report::SyncReport;
use chrono::Local;
use colored::{Color, Colorize};
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// File name used when the log destination is a directory
pub const DEFAULT_LOG_FILE: &str = "mirror.log";

/// Timestamp format for console and log lines
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// How a rendered line should be highlighted on the console
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Plain,
    Added,
    Changed,
    Removed,
    Failure,
}

impl Tone {
    const fn color(self) -> Option<Color> {
        match self {
            Self::Plain => None,
            Self::Added => Some(Color::Green),
            Self::Changed => Some(Color::Yellow),
            Self::Removed | Self::Failure => Some(Color::Red),
        }
    }
}

/// One rendered output line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    pub tone: Tone,
    pub text: String,
}

impl Line {
    fn new(tone: Tone, text: impl Into<String>) -> Self {
        Self {
            tone,
            text: text.into(),
        }
    }
}

/// Reporter settings
#[derive(Debug, Clone, Default)]
pub struct ReporterConfig {
    /// Highlight console lines with ANSI colors
    pub color: bool,
    /// Only write failures to the console
    pub quiet: bool,
    /// Append-only log file
    pub log_file: Option<PathBuf>,
}

/// Writes pass summaries and errors to the console and the log file
pub struct ChangeReporter<W: Write> {
    console: W,
    config: ReporterConfig,
}

impl ChangeReporter<io::Stdout> {
    /// Reporter writing to standard output
    #[must_use]
    pub fn stdout(config: ReporterConfig) -> Self {
        Self::new(io::stdout(), config)
    }
}

impl<W: Write> ChangeReporter<W> {
    pub const fn new(console: W, config: ReporterConfig) -> Self {
        Self { console, config }
    }

    #[must_use]
    pub fn log_file(&self) -> Option<&Path> {
        self.config.log_file.as_deref()
    }

    /// Render the outcome of one pass
    ///
    /// # Errors
    ///
    /// Returns an error if the console or the log file cannot be written.
    pub fn report(&mut self, report: &SyncReport) -> io::Result<()> {
        let lines = render_report(report);
        let is_failure = report.has_failures();
        self.emit(&lines, is_failure)
    }

    /// Render a single error message, such as a failed pass or startup check
    ///
    /// # Errors
    ///
    /// Returns an error if the console or the log file cannot be written.
    pub fn error(&mut self, message: &str) -> io::Result<()> {
        self.emit(&[Line::new(Tone::Failure, format!("Error: {message}"))], true)
    }

    /// Append an error message to the log file only
    ///
    /// Used when the console copy is printed elsewhere, such as fatal startup
    /// errors. Does nothing without a log file.
    ///
    /// # Errors
    ///
    /// Returns an error if the log file cannot be written.
    pub fn log_error(&self, message: &str) -> io::Result<()> {
        let stamp = timestamp();
        self.write_log(&stamp, &[Line::new(Tone::Failure, format!("Error: {message}"))])
    }

    /// Render an informational message, such as the shutdown notice
    ///
    /// # Errors
    ///
    /// Returns an error if the console or the log file cannot be written.
    pub fn info(&mut self, message: &str) -> io::Result<()> {
        self.emit(&[Line::new(Tone::Plain, message)], false)
    }

    /// Consume the reporter and hand back the console writer
    pub fn into_console(self) -> W {
        self.console
    }

    fn emit(&mut self, lines: &[Line], is_failure: bool) -> io::Result<()> {
        let stamp = timestamp();

        if !self.config.quiet || is_failure {
            for (i, line) in lines.iter().enumerate() {
                let text = match (self.config.color, line.tone.color()) {
                    (true, Some(color)) if line.tone == Tone::Failure => {
                        line.text.color(color).bold().to_string()
                    }
                    (true, Some(color)) => line.text.color(color).to_string(),
                    _ => line.text.clone(),
                };
                if i == 0 {
                    writeln!(self.console, "{stamp} {text}")?;
                } else {
                    writeln!(self.console, "{text}")?;
                }
            }
            self.console.flush()?;
        }

        self.write_log(&stamp, lines)
    }

    fn write_log(&self, stamp: &str, lines: &[Line]) -> io::Result<()> {
        let Some(path) = &self.config.log_file else {
            return Ok(());
        };
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        let mut buffer = String::new();
        for (i, line) in lines.iter().enumerate() {
            if i == 0 {
                buffer.push_str(stamp);
                buffer.push(' ');
            }
            buffer.push_str(&line.text);
            buffer.push('\n');
        }
        file.write_all(buffer.as_bytes())
    }
}

fn timestamp() -> String {
    format!("[{}]", Local::now().format(TIMESTAMP_FORMAT))
}

fn plural(count: usize, singular: &'static str, plural: &'static str) -> String {
    if count == 1 {
        format!("{count} {singular}")
    } else {
        format!("{count} {plural}")
    }
}

/// Render a report into a summary line followed by indented lists
#[must_use]
pub fn render_report(report: &SyncReport) -> Vec<Line> {
    let scanned = format!(
        "scanned {}, {}",
        plural(report.dirs_scanned, "directory", "directories"),
        plural(report.files_scanned, "file", "files")
    );

    let mut lines = Vec::new();
    if report.is_noop() {
        lines.push(Line::new(
            Tone::Plain,
            format!("No changes were made. Both folders are already in sync ({scanned})."),
        ));
    } else {
        lines.push(Line::new(
            Tone::Plain,
            format!(
                "Sync complete: {} created, {} removed, {} copied, {} replaced, {} removed ({scanned}, {:.2?}).",
                plural(report.dirs_created.len(), "directory", "directories"),
                plural(report.dirs_removed.len(), "directory", "directories"),
                plural(report.files_copied.len(), "file", "files"),
                plural(report.files_replaced.len(), "file", "files"),
                plural(report.files_removed.len(), "file", "files"),
                report.duration,
            ),
        ));
    }

    let sections: [(&str, &[PathBuf], Tone); 5] = [
        ("Directories created", &report.dirs_created, Tone::Added),
        ("Directories removed", &report.dirs_removed, Tone::Removed),
        ("Files copied", &report.files_copied, Tone::Added),
        ("Files replaced", &report.files_replaced, Tone::Changed),
        ("Files removed", &report.files_removed, Tone::Removed),
    ];
    for (title, paths, tone) in sections {
        if paths.is_empty() {
            continue;
        }
        lines.push(Line::new(Tone::Plain, format!("  {title}:")));
        for path in paths {
            lines.push(Line::new(tone, format!("    {}", path.display())));
        }
    }

    if !report.failures.is_empty() {
        lines.push(Line::new(
            Tone::Failure,
            format!("  Errors ({}):", report.failures.len()),
        ));
        for failure in &report.failures {
            lines.push(Line::new(Tone::Failure, format!("    {failure}")));
        }
    }

    lines
}

/// Resolve a log destination: a directory gets [`DEFAULT_LOG_FILE`] inside it
#[must_use]
pub fn resolve_log_path(destination: &Path) -> PathBuf {
    if destination.is_dir() {
        destination.join(DEFAULT_LOG_FILE)
    } else {
        destination.to_path_buf()
    }
}
