//! Engine settings and their built-in defaults (layer 1)

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::ConfigError;
use crate::observability::LogFormat;
use crate::poller::Poller;
use crate::timeout::{TimeoutPolicy, DEFAULT_TIMEOUT_SECONDS, MAX_TIMEOUT_SECONDS};

/// Upper bound for `poll_interval_ms` (one minute)
pub const MAX_POLL_INTERVAL_MS: u64 = 60_000;

/// Settings the engine reads after all layers are merged
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConvergeConfig {
    /// Delay between status checks (default: 2000)
    pub poll_interval_ms: u64,

    /// Applied when a declaration has no timeout; 0 means wait forever
    /// (default: 300)
    pub default_timeout_seconds: u64,

    /// Largest timeout a declaration may ask for (default: 86400)
    pub max_timeout_seconds: u64,

    pub log_format: LogFormat,
}

impl Default for ConvergeConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 2000,
            default_timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
            max_timeout_seconds: MAX_TIMEOUT_SECONDS,
            log_format: LogFormat::Pretty,
        }
    }
}

impl ConvergeConfig {
    /// JSON form used as the base merge layer
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::json!({
            "poll_interval_ms": self.poll_interval_ms,
            "default_timeout_seconds": self.default_timeout_seconds,
            "max_timeout_seconds": self.max_timeout_seconds,
            "log_format": self.log_format.as_str(),
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval_ms == 0 || self.poll_interval_ms > MAX_POLL_INTERVAL_MS {
            return Err(ConfigError::Validation(format!(
                "poll_interval_ms must be in (0, {}], got {}",
                MAX_POLL_INTERVAL_MS, self.poll_interval_ms
            )));
        }

        self.timeout_policy()
            .validate()
            .map_err(|e| ConfigError::Validation(e.to_string()))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn poller(&self) -> Poller {
        Poller::new(self.poll_interval())
    }

    pub fn timeout_policy(&self) -> TimeoutPolicy {
        TimeoutPolicy {
            default_seconds: self.default_timeout_seconds,
            max_seconds: self.max_timeout_seconds,
        }
    }
}
