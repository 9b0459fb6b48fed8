//! Retry with exponential backoff for fetch and publish calls

use std::time::Duration;

use rand::Rng;

use crate::error::RemoteError;
use crate::shutdown::StopToken;

/// Backoff policy shared by the fetch and publish paths.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// Total attempts including the first one (0 is treated as 1)
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Upper bound of the uniform random delay added to each backoff
    pub jitter: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(60),
            jitter: Duration::from_millis(500),
        }
    }
}

impl BackoffPolicy {
    /// Policy without any sleeping, for tests and dry runs.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            jitter: Duration::ZERO,
        }
    }

    /// Deterministic part of the delay after failed attempt `attempt` (1-based):
    /// base, 2*base, 4*base, ... capped at `max_delay`.
    pub fn backoff_duration(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    fn delay(&self, attempt: u32) -> Duration {
        let jitter_ms = u64::try_from(self.jitter.as_millis()).unwrap_or(u64::MAX);
        let jitter = if jitter_ms == 0 {
            Duration::ZERO
        } else {
            Duration::from_millis(rand::rng().random_range(0..jitter_ms))
        };
        self.backoff_duration(attempt) + jitter
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, runs out
    /// of attempts, or the run is aborted during a backoff sleep.
    ///
    /// Returns the last error on failure.
    pub fn run<T>(
        &self,
        label: &str,
        stop: &StopToken,
        mut op: impl FnMut() -> Result<T, RemoteError>,
    ) -> Result<T, RemoteError> {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match op() {
                Ok(v) => return Ok(v),
                Err(e) if attempt < max_attempts && e.is_retryable() => {
                    let delay = self.delay(attempt);
                    log::debug!(
                        "{label}: attempt {attempt}/{max_attempts} failed: {e}, retrying in {delay:?}"
                    );
                    if !stop.backoff_sleep(delay) {
                        log::debug!("{label}: stop requested during backoff");
                        return Err(e);
                    }
                }
                Err(e) => {
                    log::warn!("{label}: failed after {attempt} attempt(s): {e}");
                    return Err(e);
                }
            }
        }
    }
}
