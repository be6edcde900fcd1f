//! Exponential backoff with jitter for transient HTTP failures
//!
//! Applied on every network boundary: listing, message detail, and the
//! language-model call. Only transient failures (HTTP 429, 5xx, and
//! connection-level errors) are retried. Every request goes through an
//! [`agent`] with a bounded timeout, so a stalled peer surfaces as a
//! transient `Timeout` instead of hanging the search.

use std::fmt::Display;
use std::time::Duration;

use log::debug;
use serde::{Deserialize, Serialize};

/// Retry options: `{retries, base_delay_ms, max_delay_ms}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Extra attempts after the first one
    pub retries: u32,
    /// Delay before the first retry; doubles on each further retry
    pub base_delay_ms: u64,
    /// Upper bound for a single delay (before jitter)
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 3,
            base_delay_ms: 100,
            max_delay_ms: 5_000,
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries
    pub fn none() -> Self {
        Self {
            retries: 0,
            base_delay_ms: 0,
            max_delay_ms: 0,
        }
    }

    /// Backoff before retry number `attempt` (0-based), without jitter
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
        let millis = self
            .base_delay_ms
            .saturating_mul(factor)
            .min(self.max_delay_ms);
        Duration::from_millis(millis)
    }

    /// Run `op`, retrying while `is_transient` says the error is worth another try
    pub fn run<T, E, F, P>(&self, what: &str, mut op: F, is_transient: P) -> Result<T, E>
    where
        F: FnMut() -> Result<T, E>,
        P: Fn(&E) -> bool,
        E: Display,
    {
        let mut attempt = 0;
        loop {
            match op() {
                Ok(value) => return Ok(value),
                Err(e) if attempt < self.retries && is_transient(&e) => {
                    let delay = self.backoff(attempt) + jitter(self.base_delay_ms);
                    debug!(
                        "{} failed ({}), retry {}/{} in {:?}",
                        what,
                        e,
                        attempt + 1,
                        self.retries,
                        delay
                    );
                    std::thread::sleep(delay);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Whether an HTTP status is worth retrying
pub fn is_transient_status(status: u16) -> bool {
    status == 429 || (500..=599).contains(&status)
}

/// Whether a ureq error is worth retrying
pub fn is_transient(err: &ureq::Error) -> bool {
    match err {
        ureq::Error::StatusCode(status) => is_transient_status(*status),
        ureq::Error::Io(_)
        | ureq::Error::Timeout(_)
        | ureq::Error::ConnectionFailed
        | ureq::Error::HostNotFound => true,
        _ => false,
    }
}

/// Upper bound for one HTTP exchange, connect through response body
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP agent whose requests give up after [`REQUEST_TIMEOUT`]
pub fn agent() -> ureq::Agent {
    agent_with_timeout(REQUEST_TIMEOUT)
}

pub(crate) fn agent_with_timeout(timeout: Duration) -> ureq::Agent {
    ureq::Agent::config_builder()
        .timeout_global(Some(timeout))
        .build()
        .into()
}

/// Random jitter in `0..bound` milliseconds
fn jitter(bound_ms: u64) -> Duration {
    use std::collections::hash_map::RandomState;
    use std::hash::{BuildHasher, Hasher};

    if bound_ms == 0 {
        return Duration::ZERO;
    }
    let hasher = RandomState::new().build_hasher();
    Duration::from_millis(hasher.finish() % bound_ms)
}
