//! Fixed-interval pass scheduling
//!
//! Passes start every `interval`, measured from the start of the previous
//! pass. A pass that overruns the interval is followed immediately by the
//! next one; passes never overlap and missed ticks are not made up.
//!
//! The shutdown token is checked before every pass and while waiting, so an
//! interrupt never cuts a pass short. An error or panic escaping a pass is
//! logged and the loop carries on with the next tick.

use crate::signal::ShutdownToken;
use std::panic::{self, AssertUnwindSafe};
use std::time::{Duration, Instant};
use tracing::{debug, error};

/// Longest single sleep while waiting for the next tick
const POLL_SLICE: Duration = Duration::from_millis(100);

/// Why the scheduler stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The shutdown token was cancelled
    Cancelled,
    /// The configured number of passes ran
    Completed,
}

/// Counters for a scheduler run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerStats {
    pub passes: u64,
    pub failed_passes: u64,
    pub stop_reason: StopReason,
}

/// Runs a pass function at a fixed interval until cancelled
#[derive(Debug, Clone)]
pub struct Scheduler {
    interval: Duration,
    max_passes: Option<u64>,
    shutdown: ShutdownToken,
}

impl Scheduler {
    #[must_use]
    pub const fn new(interval: Duration, shutdown: ShutdownToken) -> Self {
        Self {
            interval,
            max_passes: None,
            shutdown,
        }
    }

    /// Stop after `max_passes` passes
    #[must_use]
    pub const fn with_max_passes(mut self, max_passes: u64) -> Self {
        self.max_passes = Some(max_passes);
        self
    }

    /// Run `pass` repeatedly
    ///
    /// `pass` receives the 1-based pass number. An `Err` or a panic from
    /// `pass` counts as a failed pass and does not stop the loop.
    pub fn run<F>(&self, pass: F) -> SchedulerStats
    where
        F: FnMut(u64) -> anyhow::Result<()>,
    {
        self.run_with(pass, |_, _| {})
    }

    /// Like [`Scheduler::run`], handing each failed pass to `on_failure`
    ///
    /// `on_failure` receives the pass number and a rendered message for the
    /// error or panic.
    pub fn run_with<F, G>(&self, mut pass: F, mut on_failure: G) -> SchedulerStats
    where
        F: FnMut(u64) -> anyhow::Result<()>,
        G: FnMut(u64, &str),
    {
        let mut passes = 0u64;
        let mut failed_passes = 0u64;

        loop {
            if self.shutdown.is_cancelled() {
                return finish(passes, failed_passes, StopReason::Cancelled);
            }

            let started = Instant::now();
            passes += 1;
            debug!("starting pass {passes}");

            match panic::catch_unwind(AssertUnwindSafe(|| pass(passes))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    failed_passes += 1;
                    let message = format!("{e:#}");
                    error!("pass {passes} failed: {message}");
                    on_failure(passes, &message);
                }
                Err(payload) => {
                    failed_passes += 1;
                    let message = format!("Pass panicked: {}", panic_message(payload.as_ref()));
                    error!("pass {passes}: {message}");
                    on_failure(passes, &message);
                }
            }

            if self.max_passes.is_some_and(|max| passes >= max) {
                return finish(passes, failed_passes, StopReason::Completed);
            }

            let remaining = self.interval.saturating_sub(started.elapsed());
            if !self.wait(remaining) {
                return finish(passes, failed_passes, StopReason::Cancelled);
            }
        }
    }

    /// Sleep for `duration` in short slices; false if cancelled meanwhile
    fn wait(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        loop {
            if self.shutdown.is_cancelled() {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            std::thread::sleep(POLL_SLICE.min(deadline - now));
        }
    }
}

const fn finish(passes: u64, failed_passes: u64, stop_reason: StopReason) -> SchedulerStats {
    SchedulerStats {
        passes,
        failed_passes,
        stop_reason,
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancelled_before_first_pass() {
        let token = ShutdownToken::new();
        token.cancel();
        let scheduler = Scheduler::new(Duration::from_secs(60), token);

        let mut calls = 0;
        let stats = scheduler.run(|_| {
            calls += 1;
            Ok(())
        });

        assert_eq!(calls, 0);
        assert_eq!(stats.passes, 0);
        assert_eq!(stats.stop_reason, StopReason::Cancelled);
    }

    #[test]
    fn test_max_passes() {
        let scheduler =
            Scheduler::new(Duration::from_millis(1), ShutdownToken::new()).with_max_passes(3);

        let mut seen = Vec::new();
        let stats = scheduler.run(|n| {
            seen.push(n);
            Ok(())
        });

        assert_eq!(seen, vec![1, 2, 3]);
        assert_eq!(stats.stop_reason, StopReason::Completed);
    }

    #[test]
    fn test_cancel_during_pass_finishes_that_pass() {
        let token = ShutdownToken::new();
        let scheduler = Scheduler::new(Duration::from_secs(60), token.clone());

        let mut finished = 0;
        let stats = scheduler.run(|_| {
            token.cancel();
            finished += 1;
            Ok(())
        });

        assert_eq!(finished, 1);
        assert_eq!(stats.passes, 1);
        assert_eq!(stats.stop_reason, StopReason::Cancelled);
    }

    #[test]
    fn test_errors_and_panics_do_not_stop_the_loop() {
        let scheduler =
            Scheduler::new(Duration::from_millis(1), ShutdownToken::new()).with_max_passes(3);

        let stats = scheduler.run(|n| match n {
            1 => anyhow::bail!("disk on fire"),
            2 => panic!("unexpected"),
            _ => Ok(()),
        });

        assert_eq!(stats.passes, 3);
        assert_eq!(stats.failed_passes, 2);
    }

    #[test]
    fn test_failures_reach_the_sink() {
        let scheduler =
            Scheduler::new(Duration::from_millis(1), ShutdownToken::new()).with_max_passes(3);

        let mut failures = Vec::new();
        let stats = scheduler.run_with(
            |n| match n {
                1 => Err(anyhow::anyhow!("replica gone").context("Mirror pass failed")),
                3 => panic!("bad state"),
                _ => Ok(()),
            },
            |n, message| failures.push((n, message.to_string())),
        );

        assert_eq!(stats.failed_passes, 2);
        assert_eq!(
            failures,
            vec![
                (1, "Mirror pass failed: replica gone".to_string()),
                (3, "Pass panicked: bad state".to_string()),
            ]
        );
    }

    #[test]
    fn test_overrun_starts_next_pass_immediately() {
        let scheduler =
            Scheduler::new(Duration::from_millis(10), ShutdownToken::new()).with_max_passes(2);

        let started = Instant::now();
        scheduler.run(|n| {
            if n == 1 {
                std::thread::sleep(Duration::from_millis(50));
            }
            Ok(())
        });

        // One overrunning pass and no extra wait before the second
        assert!(started.elapsed() < Duration::from_secs(2));
    }
}
