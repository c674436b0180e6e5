//! # Exponential Backoff
//!
//! Rate limiting of requeues. Every key keeps its own failure count; the
//! delay doubles with each failure starting from a base delay and is capped
//! at a maximum. After too many failures the key is dropped and only a new
//! change event brings it back.
//!
//! Sequence for base 5s, max 300s: 5s, 10s, 20s, 40s, 80s, 160s, 300s (max)

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tracing::warn;

/// Exponential backoff calculator
///
/// Yields `base * 2^n` for the n-th consecutive failure, capped at `max`.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    base: Duration,
    max: Duration,
    /// Consecutive failures seen so far
    attempts: u32,
}

impl ExponentialBackoff {
    /// Create a new backoff starting at `base` and never exceeding `max`
    #[must_use]
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max,
            attempts: 0,
        }
    }

    /// Get the next backoff duration and advance the sequence
    pub fn next_backoff(&mut self) -> Duration {
        let delay = Self::calculate_for_error_count(self.attempts, self.base, self.max);
        self.attempts = self.attempts.saturating_add(1);
        delay
    }

    /// Number of delays handed out since the last reset
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Reset the backoff to the initial state
    pub fn reset(&mut self) {
        self.attempts = 0;
    }

    /// Calculate the delay for a given error count (0-indexed) without state
    #[must_use]
    pub fn calculate_for_error_count(error_count: u32, base: Duration, max: Duration) -> Duration {
        let factor = 1u32.checked_shl(error_count).unwrap_or(u32::MAX);
        base.checked_mul(factor).map_or(max, |delay| delay.min(max))
    }
}

/// Per-key requeue rate limiter
///
/// Keys are opaque strings, typically `kind/namespace/name`.
#[derive(Debug)]
pub struct RequeueLimiter {
    base: Duration,
    max: Duration,
    max_retries: u32,
    states: Mutex<HashMap<String, ExponentialBackoff>>,
}

impl RequeueLimiter {
    /// Create a limiter handing out at most `max_retries` delays per key
    #[must_use]
    pub fn new(base: Duration, max: Duration, max_retries: u32) -> Self {
        Self {
            base,
            max,
            max_retries,
            states: Mutex::new(HashMap::new()),
        }
    }

    /// Delay before the next attempt of `key`.
    ///
    /// Returns `None` once `key` has used up its retries; its state is
    /// forgotten at that point so a later change event starts over.
    pub fn next_delay(&self, key: &str) -> Option<Duration> {
        let mut states = match self.states.lock() {
            Ok(states) => states,
            Err(e) => {
                warn!("Failed to lock backoff states: {}, using base delay", e);
                return Some(self.base);
            }
        };

        let backoff = states
            .entry(key.to_string())
            .or_insert_with(|| ExponentialBackoff::new(self.base, self.max));
        if backoff.attempts() >= self.max_retries {
            states.remove(key);
            return None;
        }
        Some(backoff.next_backoff())
    }

    /// Forget the failure history of `key` (on successful reconciliation)
    pub fn forget(&self, key: &str) {
        if let Ok(mut states) = self.states.lock() {
            states.remove(key);
        }
    }

    /// Number of failures recorded for `key`
    #[must_use]
    pub fn failures(&self, key: &str) -> u32 {
        self.states
            .lock()
            .ok()
            .and_then(|states| states.get(key).map(ExponentialBackoff::attempts))
            .unwrap_or(0)
    }
}
