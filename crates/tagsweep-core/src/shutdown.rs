//! Graceful shutdown: process-wide signal flag plus a per-run stop token

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Global shutdown flag, set by the SIGTERM/SIGINT handler
pub fn shutdown_flag() -> &'static AtomicBool {
    static FLAG: AtomicBool = AtomicBool::new(false);
    &FLAG
}

/// Check if shutdown was requested
pub fn is_shutdown_requested() -> bool {
    shutdown_flag().load(Ordering::Relaxed)
}

/// Request shutdown (for signal handlers)
pub fn request_shutdown() {
    shutdown_flag().store(true, Ordering::Relaxed);
}

/// Why a run stopped early.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopReason {
    /// Global `target_total` reached
    TargetReached,
    /// Publish retries exhausted or checkpoint could not be written
    Halted,
    /// SIGINT / SIGTERM
    Interrupted,
}

impl StopReason {
    fn code(self) -> u8 {
        match self {
            Self::TargetReached => 1,
            Self::Halted => 2,
            Self::Interrupted => 3,
        }
    }

    fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::TargetReached),
            2 => Some(Self::Halted),
            3 => Some(Self::Interrupted),
            _ => None,
        }
    }
}

/// Granularity of interruptible sleeps
const SLEEP_SLICE: Duration = Duration::from_millis(50);

/// Cancellation token shared by all workers of one run.
///
/// Workers check it at every page boundary. The first recorded reason
/// wins, except that `Halted` overrides `TargetReached` so a failed final
/// flush is never reported as a clean completion. The process-wide
/// [`shutdown_flag`] is folded in as `Interrupted`.
#[derive(Clone, Debug, Default)]
pub struct StopToken {
    reason: Arc<AtomicU8>,
}

impl StopToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self, reason: StopReason) {
        let new = reason.code();
        let _ = self
            .reason
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |cur| match cur {
                0 => Some(new),
                c if c == StopReason::TargetReached.code() && reason == StopReason::Halted => {
                    Some(new)
                }
                _ => None,
            });
    }

    pub fn reason(&self) -> Option<StopReason> {
        StopReason::from_code(self.reason.load(Ordering::Acquire)).or_else(|| {
            is_shutdown_requested().then_some(StopReason::Interrupted)
        })
    }

    pub fn is_stopped(&self) -> bool {
        self.reason().is_some()
    }

    /// Whether the run must stop right away (`Halted` / `Interrupted`),
    /// as opposed to winding down after reaching the target.
    pub fn is_aborted(&self) -> bool {
        matches!(
            self.reason(),
            Some(StopReason::Halted | StopReason::Interrupted)
        )
    }

    /// Sleep for `duration`, waking early if the token is stopped.
    ///
    /// Returns `false` when interrupted.
    pub fn sleep(&self, duration: Duration) -> bool {
        self.sleep_until(duration, Self::is_stopped)
    }

    /// Backoff sleep: only an abort cuts it short, so retries of a batch
    /// already in flight still run after the target is reached.
    pub fn backoff_sleep(&self, duration: Duration) -> bool {
        self.sleep_until(duration, Self::is_aborted)
    }

    fn sleep_until(&self, duration: Duration, wake: fn(&Self) -> bool) -> bool {
        let deadline = Instant::now() + duration;
        loop {
            if wake(self) {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            std::thread::sleep(SLEEP_SLICE.min(deadline - now));
        }
    }
}
