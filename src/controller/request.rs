//! Transition requests
//!
//! `TransitionRequest` is what the controller consumes. `StateDeclaration`
//! is the user-facing shape (strings for timeout and timestamps) that the
//! surrounding layer deserializes from its own configuration.

use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use converge_api::ResourceKind;
use serde::{Deserialize, Serialize};

use super::ReconcileError;
use crate::adapter::adapter_for;
use crate::timeout::{parse_duration, TimeoutPolicy};

/// One state transition, immutable once issued
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionRequest {
    pub kind: ResourceKind,
    pub resource_id: String,
    pub desired_state: String,

    /// Only meaningful for stop-style transitions
    pub force: bool,

    /// Bounds the whole reconcile call when set; `None` means no deadline
    pub timeout: Option<Duration>,

    /// Datafeed search window (start action only)
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl TransitionRequest {
    pub fn new(kind: ResourceKind, resource_id: impl Into<String>, desired_state: impl Into<String>) -> Self {
        Self {
            kind,
            resource_id: resource_id.into(),
            desired_state: desired_state.into(),
            force: false,
            timeout: None,
            start: None,
            end: None,
        }
    }

    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_bounds(mut self, start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Self {
        self.start = start;
        self.end = end;
        self
    }

    /// Reject requests that can never be dispatched
    pub fn validate(&self) -> Result<(), ReconcileError> {
        let adapter = adapter_for(self.kind);

        if self.resource_id.trim().is_empty() {
            return Err(ReconcileError::config(self.kind, "resource id must not be empty"));
        }

        if !adapter.is_valid_state(&self.desired_state) {
            return Err(adapter.unknown_state(&self.desired_state));
        }

        let has_bounds = self.start.is_some() || self.end.is_some();
        if has_bounds && !adapter.accepts_bounds(&self.desired_state) {
            return Err(ReconcileError::config(
                self.kind,
                format!(
                    "start/end bounds are not accepted when the desired state is '{}'",
                    self.desired_state
                ),
            ));
        }

        if let (Some(start), Some(end)) = (self.start, self.end) {
            if end <= start {
                return Err(ReconcileError::config(
                    self.kind,
                    format!("end ({}) must be after start ({})", end.to_rfc3339(), start.to_rfc3339()),
                ));
            }
        }

        if self.timeout.is_some_and(|t| t.is_zero()) {
            return Err(ReconcileError::config(self.kind, "timeout must be greater than zero"));
        }

        Ok(())
    }
}

/// Declared state as the surrounding layer stores it
///
/// ```toml
/// kind = "datafeed"
/// id = "datafeed-web-logs"
/// state = "started"
/// force = false
/// timeout = "5m"
/// start = "2024-01-01T00:00:00Z"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateDeclaration {
    pub kind: ResourceKind,
    pub id: String,
    pub state: String,

    #[serde(default)]
    pub force: bool,

    /// Duration string, e.g. `"30s"`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,

    /// RFC 3339 timestamp or epoch milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<String>,
}

impl StateDeclaration {
    /// Convert into a validated request, applying `policy` to the timeout
    pub fn into_request(self, policy: &TimeoutPolicy) -> Result<TransitionRequest, ReconcileError> {
        let kind = self.kind;

        let declared = match self.timeout.as_deref() {
            Some(raw) => Some(
                parse_duration(raw)
                    .map_err(|e| ReconcileError::config(kind, format!("timeout: {}", e)))?,
            ),
            None => None,
        };
        let timeout = policy
            .resolve(declared)
            .map_err(|e| ReconcileError::config(kind, e.to_string()))?;

        let start = self
            .start
            .as_deref()
            .map(|raw| parse_timestamp(kind, "start", raw))
            .transpose()?;
        let end = self
            .end
            .as_deref()
            .map(|raw| parse_timestamp(kind, "end", raw))
            .transpose()?;

        let request = TransitionRequest::new(kind, self.id, self.state)
            .with_force(self.force)
            .with_timeout(timeout)
            .with_bounds(start, end);
        request.validate()?;
        Ok(request)
    }
}

fn parse_timestamp(kind: ResourceKind, field: &str, raw: &str) -> Result<DateTime<Utc>, ReconcileError> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Ok(parsed.with_timezone(&Utc));
    }
    if let Ok(millis) = raw.parse::<i64>() {
        if let Some(parsed) = Utc.timestamp_millis_opt(millis).single() {
            return Ok(parsed);
        }
    }
    Err(ReconcileError::config(
        kind,
        format!("{} must be an RFC 3339 timestamp or epoch milliseconds, got '{}'", field, raw),
    ))
}
