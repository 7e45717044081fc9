//! Failure injection for the mock cluster

use std::collections::HashMap;
use std::time::Duration;

use converge_api::ApiError;
use serde::{Deserialize, Serialize};

/// Remote API operation a failure can be attached to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    GetStatus,
    Dispatch,
    Delete,
}

/// Failure configuration for an operation
#[derive(Debug, Clone, PartialEq)]
pub struct FailureConfig {
    /// Error to return (if any)
    pub error: Option<ApiError>,
    /// Delay before responding; honours the caller's context
    pub delay: Option<Duration>,
    /// Number of times to fail before succeeding (None = always fail)
    pub fail_count: Option<u32>,
    /// Calls that succeed before the failure kicks in
    pub after_calls: u32,
}

impl FailureConfig {
    /// A config that returns `error`
    pub fn error(error: ApiError) -> Self {
        Self {
            error: Some(error),
            delay: None,
            fail_count: None,
            after_calls: 0,
        }
    }

    /// A config that just adds delay
    pub fn delay(duration: Duration) -> Self {
        Self {
            error: None,
            delay: Some(duration),
            fail_count: None,
            after_calls: 0,
        }
    }

    pub fn with_fail_count(mut self, count: u32) -> Self {
        self.fail_count = Some(count);
        self
    }

    /// Let the first `calls` calls through untouched
    pub fn after_calls(mut self, calls: u32) -> Self {
        self.after_calls = calls;
        self
    }
}

/// Per-operation failure injector
#[derive(Debug, Default)]
pub struct FailureInjector {
    configs: HashMap<Operation, FailureConfig>,
    call_counts: HashMap<Operation, u32>,
}

impl FailureInjector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inject a failure for an operation, resetting its call count
    pub fn inject(&mut self, op: Operation, config: FailureConfig) {
        self.configs.insert(op, config);
        self.call_counts.insert(op, 0);
    }

    pub fn inject_error(&mut self, op: Operation, error: ApiError) {
        self.inject(op, FailureConfig::error(error));
    }

    pub fn inject_delay(&mut self, op: Operation, delay: Duration) {
        self.inject(op, FailureConfig::delay(delay));
    }

    pub fn clear(&mut self) {
        self.configs.clear();
        self.call_counts.clear();
    }

    pub fn clear_op(&mut self, op: Operation) {
        self.configs.remove(&op);
        self.call_counts.remove(&op);
    }

    /// Record a call to `op` and return the failure to apply, if any
    pub fn check(&mut self, op: Operation) -> Option<FailureConfig> {
        let config = self.configs.get(&op)?;
        let count = self.call_counts.entry(op).or_insert(0);
        *count += 1;

        if *count <= config.after_calls {
            return None;
        }

        if let Some(fail_limit) = config.fail_count {
            if *count - config.after_calls > fail_limit {
                return None;
            }
        }

        Some(config.clone())
    }
}
