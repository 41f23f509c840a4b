use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// A single cheaply-`Clone`able latch, set exactly once, observed at every
/// suspension point (dequeue timeouts, heartbeat ticks, the gate's landing
/// pass) instead of a raw `sig_atomic_t`-style flag threaded through by hand.
/// A signal handler installed by `hydrogen-server` only calls
/// [`ShutdownToken::trip`]; it never touches queue or pool state directly.
#[derive(Clone, Default)]
pub struct ShutdownToken {
    tripped: Arc<AtomicBool>,
}

impl ShutdownToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// One-way latch: once tripped, stays tripped.
    pub fn trip(&self) {
        self.tripped.store(true, Ordering::SeqCst);
    }

    pub fn is_tripped(&self) -> bool {
        self.tripped.load(Ordering::SeqCst)
    }

    /// Blocks up to `timeout`, waking early (returning `true`) if tripped.
    /// Used by worker loops in place of a condvar wait since the token has
    /// no waiters list; callers that need to also service a work queue
    /// should prefer a dequeue-with-timeout and check [`is_tripped`] after.
    pub fn wait_or_tripped(&self, timeout: Duration) -> bool {
        let step = Duration::from_millis(20).min(timeout);
        let mut waited = Duration::ZERO;
        while waited < timeout {
            if self.is_tripped() {
                return true;
            }
            std::thread::sleep(step);
            waited += step;
        }
        self.is_tripped()
    }
}
