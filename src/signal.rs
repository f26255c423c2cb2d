//! Cooperative shutdown
//!
//! A [`ShutdownToken`] is a shared flag checked by the scheduler between
//! passes. [`install_handlers`] routes SIGINT and SIGTERM to a token so an
//! interrupt ends the loop after the running pass finishes instead of
//! killing it mid-copy. A second interrupt while that pass is still running
//! exits the process immediately with status `128 + signal`.

use crate::error::{Result, SyncError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

/// Shared cancellation flag
#[derive(Debug, Clone, Default)]
pub struct ShutdownToken {
    cancelled: Arc<AtomicBool>,
}

impl ShutdownToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request shutdown
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Flag set from the signal handler; the handler may only touch atomics
static SIGNAL_FLAG: OnceLock<Arc<AtomicBool>> = OnceLock::new();

/// Set `flag`; true if it was already set by an earlier signal
#[cfg_attr(not(unix), allow(dead_code))]
fn mark_signalled(flag: &AtomicBool) -> bool {
    flag.swap(true, Ordering::SeqCst)
}

#[cfg(unix)]
extern "C" fn on_signal(signum: libc::c_int) {
    if let Some(flag) = SIGNAL_FLAG.get() {
        if mark_signalled(flag) {
            // SAFETY: _exit is async-signal-safe
            unsafe { libc::_exit(128 + signum) };
        }
    }
}

/// Cancel `token` when the process receives SIGINT or SIGTERM
///
/// Only the first token passed in is bound to the signals.
///
/// # Errors
///
/// Returns [`SyncError::Signal`] if a handler cannot be installed.
#[cfg(unix)]
pub fn install_handlers(token: &ShutdownToken) -> Result<()> {
    if SIGNAL_FLAG.set(Arc::clone(&token.cancelled)).is_err() {
        tracing::debug!("signal handlers already installed");
        return Ok(());
    }

    let handler = on_signal as extern "C" fn(libc::c_int) as libc::sighandler_t;
    for signum in [libc::SIGINT, libc::SIGTERM] {
        // SAFETY: the handler only performs an atomic swap and _exit
        let previous = unsafe { libc::signal(signum, handler) };
        if previous == libc::SIG_ERR {
            return Err(SyncError::Signal(format!(
                "failed to install handler for signal {signum}: {}",
                std::io::Error::last_os_error()
            )));
        }
    }
    Ok(())
}

/// Signals are not wired up on this platform; the token can still be
/// cancelled programmatically.
#[cfg(not(unix))]
pub fn install_handlers(_token: &ShutdownToken) -> Result<()> {
    tracing::warn!("interrupt handling is not supported on this platform");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_clones_share_state() {
        let token = ShutdownToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());

        token.cancel();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn test_second_signal_is_detected() {
        let flag = AtomicBool::new(false);
        assert!(!mark_signalled(&flag));
        assert!(flag.load(Ordering::SeqCst));
        assert!(mark_signalled(&flag));
    }
}
