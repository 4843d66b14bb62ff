//! Cooperative cancellation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

/// Set from another thread or a signal handler; polled by the capture loop.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

/// Flag shared with the SIGINT handler.
static SIGINT_FLAG: OnceLock<Arc<AtomicBool>> = OnceLock::new();

extern "C" fn on_sigint(_signal: libc::c_int) {
    if let Some(flag) = SIGINT_FLAG.get() {
        flag.store(true, Ordering::SeqCst);
    }
}

impl CancelToken {
    /// A token nobody has cancelled yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// A token cancelled by the first SIGINT.
    ///
    /// The handler resets itself after firing, so a second Ctrl-C kills the
    /// process the usual way. Interrupted system calls are restarted.
    ///
    /// # Errors
    ///
    /// Returns the error from `sigaction`.
    pub fn on_sigint() -> std::io::Result<Self> {
        let flag = SIGINT_FLAG.get_or_init(|| Arc::new(AtomicBool::new(false)));
        flag.store(false, Ordering::SeqCst);

        // SAFETY: sigaction necessary - std has no signal API.
        // Invariants: (1) sa is fully initialised (zeroed, then mask emptied);
        // (2) on_sigint only performs an atomic store, which is async-signal-safe.
        let ret = unsafe {
            let mut sa: libc::sigaction = std::mem::zeroed();
            sa.sa_sigaction = on_sigint as extern "C" fn(libc::c_int) as libc::sighandler_t;
            sa.sa_flags = libc::SA_RESETHAND | libc::SA_RESTART;
            libc::sigemptyset(&raw mut sa.sa_mask);
            libc::sigaction(libc::SIGINT, &raw const sa, std::ptr::null_mut())
        };
        if ret != 0 {
            return Err(std::io::Error::last_os_error());
        }
        Ok(Self(Arc::clone(flag)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_state() {
        let token = CancelToken::new();
        let other = token.clone();
        assert!(!other.is_cancelled());
        token.cancel();
        assert!(other.is_cancelled());
    }
}
