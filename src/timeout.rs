//! Timeout parsing and bounds
//!
//! Declarations carry timeouts as `humantime` duration strings (`"30s"`,
//! `"1m30s"`, `"500ms"`, `"2min"`). The engine itself never invents a deadline; the
//! policy here lets the configuration layer supply one:
//! - `default_seconds`: applied when a declaration omits a timeout (0 = unbounded)
//! - `max_seconds`: upper bound for any timeout, declared or defaulted

use std::time::Duration;

/// Default timeout applied by the configuration layer (5 min)
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 300;

/// Largest accepted timeout (24 h)
pub const MAX_TIMEOUT_SECONDS: u64 = 86400;

/// Duration string that `humantime` could not parse
#[derive(Debug, thiserror::Error)]
#[error("invalid duration '{input}': {source}")]
pub struct TimeoutParseError {
    pub input: String,
    #[source]
    pub source: humantime::DurationError,
}

/// Parse a duration string such as `"30s"`, `"1h15m"` or `"1m 30s"`.
///
/// A bare `"0"` is accepted; every other component needs a unit.
pub fn parse_duration(input: &str) -> Result<Duration, TimeoutParseError> {
    let s = input.trim();
    if s == "0" {
        return Ok(Duration::ZERO);
    }
    humantime::parse_duration(s).map_err(|source| TimeoutParseError {
        input: s.to_string(),
        source,
    })
}

/// Render a duration for messages (`"1m 30s"`, `"250ms"`)
pub fn format_duration(duration: Duration) -> String {
    humantime::format_duration(duration).to_string()
}

/// Timeout policy validation errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TimeoutValidationError {
    #[error("max_timeout_seconds must be in (0, 86400], got {value}")]
    MaxOutOfBounds { value: u64 },

    #[error("default_timeout_seconds must be in [0, {max}], got {value}")]
    DefaultOutOfBounds { value: u64, max: u64 },

    #[error("timeout must be greater than zero")]
    Zero,

    #[error("timeout {requested} exceeds the maximum of {max}s")]
    TooLarge { requested: String, max: u64 },
}

/// Timeout defaults and bounds applied before a request reaches the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutPolicy {
    /// Applied when a declaration has no timeout (0 = unbounded)
    pub default_seconds: u64,

    /// Upper bound for any timeout
    pub max_seconds: u64,
}

impl Default for TimeoutPolicy {
    fn default() -> Self {
        Self {
            default_seconds: DEFAULT_TIMEOUT_SECONDS,
            max_seconds: MAX_TIMEOUT_SECONDS,
        }
    }
}

impl TimeoutPolicy {
    /// Policy that leaves omitted timeouts unbounded
    pub fn unbounded() -> Self {
        Self {
            default_seconds: 0,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), TimeoutValidationError> {
        if self.max_seconds == 0 || self.max_seconds > MAX_TIMEOUT_SECONDS {
            return Err(TimeoutValidationError::MaxOutOfBounds {
                value: self.max_seconds,
            });
        }
        if self.default_seconds > self.max_seconds {
            return Err(TimeoutValidationError::DefaultOutOfBounds {
                value: self.default_seconds,
                max: self.max_seconds,
            });
        }
        Ok(())
    }

    /// The default timeout, or `None` when omitted timeouts stay unbounded
    pub fn default_timeout(&self) -> Option<Duration> {
        match self.default_seconds {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    /// Apply the default to an omitted timeout and bound-check the result
    pub fn resolve(&self, requested: Option<Duration>) -> Result<Option<Duration>, TimeoutValidationError> {
        let timeout = match requested {
            Some(timeout) => timeout,
            None => return Ok(self.default_timeout()),
        };
        if timeout.is_zero() {
            return Err(TimeoutValidationError::Zero);
        }
        if timeout > Duration::from_secs(self.max_seconds) {
            return Err(TimeoutValidationError::TooLarge {
                requested: format_duration(timeout),
                max: self.max_seconds,
            });
        }
        Ok(Some(timeout))
    }
}
