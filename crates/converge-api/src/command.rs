//! Transition commands dispatched to the remote system
//!
//! Dispatch is fire-and-acknowledge: the remote system accepts the command
//! and the caller polls for the resulting state separately.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Remote transition action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransitionAction {
    /// Open a job
    Open,
    /// Close a job
    Close,
    /// Start a datafeed
    Start,
    /// Stop a datafeed
    Stop,
}

impl TransitionAction {
    /// Stop-style actions may abandon in-flight work when forced
    pub fn is_stop_style(&self) -> bool {
        matches!(self, TransitionAction::Close | TransitionAction::Stop)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransitionAction::Open => "open",
            TransitionAction::Close => "close",
            TransitionAction::Start => "start",
            TransitionAction::Stop => "stop",
        }
    }
}

impl fmt::Display for TransitionAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single transition command with its parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionCommand {
    pub action: TransitionAction,

    /// Only ever set for stop-style actions
    pub force: bool,

    /// Server-side timeout for acknowledging the action
    #[serde(default, skip_serializing_if = "Option::is_none", with = "duration_ms")]
    pub timeout: Option<Duration>,

    /// Datafeed search window start (start action only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<DateTime<Utc>>,

    /// Datafeed search window end (start action only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<DateTime<Utc>>,
}

impl TransitionCommand {
    pub fn new(action: TransitionAction) -> Self {
        Self {
            action,
            force: false,
            timeout: None,
            start: None,
            end: None,
        }
    }

    /// Set `force`. Ignored for actions that are not stop-style.
    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force && self.action.is_stop_style();
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
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => serializer.serialize_some(&u64::try_from(d.as_millis()).unwrap_or(u64::MAX)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(deserializer)?.map(Duration::from_millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_force_only_sticks_on_stop_style() {
        let start = TransitionCommand::new(TransitionAction::Start).with_force(true);
        assert!(!start.force);

        let open = TransitionCommand::new(TransitionAction::Open).with_force(true);
        assert!(!open.force);

        let stop = TransitionCommand::new(TransitionAction::Stop).with_force(true);
        assert!(stop.force);

        let close = TransitionCommand::new(TransitionAction::Close).with_force(true);
        assert!(close.force);
    }

    #[test]
    fn test_timeout_serialized_as_millis() {
        let cmd = TransitionCommand::new(TransitionAction::Close)
            .with_timeout(Some(Duration::from_secs(30)));
        let json = serde_json::to_value(&cmd).unwrap();
        assert_eq!(json["timeout"], 30_000);
        assert_eq!(json["action"], "close");

        let back: TransitionCommand = serde_json::from_value(json).unwrap();
        assert_eq!(back.timeout, Some(Duration::from_secs(30)));
    }
}
