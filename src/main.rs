//! dirmirror: keep a replica directory in sync with a source directory
//!
//! Runs a mirror pass every INTERVAL seconds until interrupted. Each pass is
//! summarised on the console and appended to the optional log file.

use anyhow::{Context, Result};
use clap::Parser;
use dirmirror::cli::Args;
use dirmirror::scheduler::StopReason;
use dirmirror::{signal, ChangeReporter, MirrorEngine, ReporterConfig, Scheduler, ShutdownToken};
use std::cell::RefCell;
use tracing::{info, warn, Level};

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logging based on verbosity and quiet mode
    let level = if args.quiet {
        Level::ERROR
    } else {
        match args.verbose {
            0 => Level::WARN,
            1 => Level::INFO,
            2 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let reporter = ChangeReporter::stdout(ReporterConfig {
        color: !args.no_color,
        quiet: args.quiet,
        log_file: args.log_file(),
    });

    // Validate arguments before touching either tree. The console copy of
    // the error comes from the returned Err; the log only gets it when the
    // log destination itself is acceptable.
    if let Err(e) = args.validate() {
        if args.validate_log().is_ok() {
            if let Err(write_err) = reporter.log_error(&format!("{e:#}")) {
                warn!("Failed to write startup error to log: {write_err}");
            }
        }
        return Err(e.context("Invalid arguments"));
    }

    info!("Starting dirmirror v{}", env!("CARGO_PKG_VERSION"));
    info!("Source: {}", args.source.display());
    info!("Replica: {}", args.replica.display());
    info!("Interval: {:?}", args.interval());
    if let Some(log) = reporter.log_file() {
        info!("Log file: {}", log.display());
    }

    let shutdown = ShutdownToken::new();
    signal::install_handlers(&shutdown).context("Failed to install signal handlers")?;

    let engine = MirrorEngine::new(&args.source, &args.replica).with_progress(args.progress);
    let mut scheduler = Scheduler::new(args.interval(), shutdown);
    if args.once {
        scheduler = scheduler.with_max_passes(1);
    }

    let reporter = RefCell::new(reporter);
    let stats = scheduler.run_with(
        |_| {
            let report = engine.run_pass().context("Mirror pass failed")?;
            reporter
                .borrow_mut()
                .report(&report)
                .context("Failed to write pass report")
        },
        |_, message| {
            if let Err(e) = reporter.borrow_mut().error(message) {
                warn!("Failed to write error report: {e}");
            }
        },
    );

    info!(
        "Stopped after {} passes ({} failed)",
        stats.passes, stats.failed_passes
    );
    if stats.stop_reason == StopReason::Cancelled {
        reporter
            .into_inner()
            .info("Interrupt received. Shutting down.")
            .context("Failed to write shutdown message")?;
    }

    Ok(())
}
