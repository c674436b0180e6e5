//! Controller configuration.
//!
//! Read once at startup from environment variables. Every variable is
//! optional; unparsable values are rejected instead of silently defaulted.

use crate::error::ControllerError;
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Runtime settings of the instancetype controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    /// Namespace to watch; all namespaces when `None`
    pub namespace: Option<String>,
    /// Maximum number of concurrent reconciliations per watcher
    pub worker_concurrency: u16,
    /// Quiet period after the last event before reconciling an object
    pub debounce: Duration,
    /// Delay of the first rate-limited requeue
    pub requeue_base: Duration,
    /// Upper bound of the rate-limited requeue delay
    pub requeue_max: Duration,
    /// Rate-limited requeues of a key before it is dropped
    pub max_retries: u32,
    /// Read timeout of API server requests
    pub request_timeout: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            namespace: None,
            worker_concurrency: 3,
            debounce: Duration::from_secs(1),
            requeue_base: Duration::from_secs(5),
            requeue_max: Duration::from_secs(300),
            max_retries: 15,
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl ControllerConfig {
    /// Loads the configuration from the process environment.
    pub fn from_env() -> Result<Self, ControllerError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self, ControllerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let config = Self {
            namespace: lookup("WATCH_NAMESPACE").filter(|namespace| !namespace.is_empty()),
            worker_concurrency: parse_or(&lookup, "WORKER_CONCURRENCY", defaults.worker_concurrency)?,
            debounce: seconds_or(&lookup, "DEBOUNCE_SECONDS", defaults.debounce)?,
            requeue_base: seconds_or(&lookup, "REQUEUE_BASE_SECONDS", defaults.requeue_base)?,
            requeue_max: seconds_or(&lookup, "REQUEUE_MAX_SECONDS", defaults.requeue_max)?,
            max_retries: parse_or(&lookup, "MAX_RETRIES", defaults.max_retries)?,
            request_timeout: seconds_or(&lookup, "REQUEST_TIMEOUT_SECONDS", defaults.request_timeout)?,
        };

        if config.worker_concurrency == 0 {
            return Err(ControllerError::InvalidConfig(
                "WORKER_CONCURRENCY must be at least 1".to_string(),
            ));
        }
        if config.requeue_base.is_zero() {
            return Err(ControllerError::InvalidConfig(
                "REQUEUE_BASE_SECONDS must be at least 1".to_string(),
            ));
        }
        if config.requeue_max < config.requeue_base {
            return Err(ControllerError::InvalidConfig(format!(
                "REQUEUE_MAX_SECONDS ({}) must not be below REQUEUE_BASE_SECONDS ({})",
                config.requeue_max.as_secs(),
                config.requeue_base.as_secs()
            )));
        }
        Ok(config)
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ControllerError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e| {
            ControllerError::InvalidConfig(format!("{key}={raw:?} is not valid: {e}"))
        }),
    }
}

fn seconds_or<F>(lookup: &F, key: &str, default: Duration) -> Result<Duration, ControllerError>
where
    F: Fn(&str) -> Option<String>,
{
    parse_or(lookup, key, default.as_secs()).map(Duration::from_secs)
}
