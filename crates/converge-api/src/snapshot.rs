//! Remote status snapshots
//!
//! A snapshot is produced fresh by every status fetch and never mutated
//! afterwards; the engine only compares snapshots across fetches.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Node a resource is assigned to
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NodeInfo {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ephemeral_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transport_address: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
}

/// Interval a datafeed is searching over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunningInterval {
    /// Start of the search window (epoch millis)
    pub start_ms: i64,
    /// End of the search window (epoch millis); absent while running in real time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_ms: Option<i64>,
    /// Whether the datafeed was started without an end time
    pub real_time_configured: bool,
    /// Whether the datafeed has caught up and is following new data
    pub real_time_running: bool,
}

/// Cumulative timing counters reported for a datafeed
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TimingCounters {
    /// Number of searches performed; never decreases for a live datafeed
    pub search_count: u64,
    #[serde(default)]
    pub bucket_count: u64,
    #[serde(default)]
    pub total_search_time_ms: f64,
}

/// Point-in-time status of a remote resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteStatusSnapshot {
    pub resource_id: String,

    /// State string as reported by the remote system
    pub state: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node: Option<NodeInfo>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub running_interval: Option<RunningInterval>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timing: Option<TimingCounters>,

    /// Why the resource is (or is not) assigned to a node
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignment_explanation: Option<String>,

    pub observed_at: DateTime<Utc>,
}

impl RemoteStatusSnapshot {
    pub fn new(resource_id: impl Into<String>, state: impl Into<String>) -> Self {
        Self {
            resource_id: resource_id.into(),
            state: state.into(),
            node: None,
            running_interval: None,
            timing: None,
            assignment_explanation: None,
            observed_at: Utc::now(),
        }
    }

    pub fn with_node(mut self, node: NodeInfo) -> Self {
        self.node = Some(node);
        self
    }

    pub fn with_running_interval(mut self, interval: RunningInterval) -> Self {
        self.running_interval = Some(interval);
        self
    }

    pub fn with_timing(mut self, timing: TimingCounters) -> Self {
        self.timing = Some(timing);
        self
    }

    /// Shorthand for timing counters carrying only a search count
    pub fn with_search_count(self, search_count: u64) -> Self {
        self.with_timing(TimingCounters {
            search_count,
            ..TimingCounters::default()
        })
    }

    pub fn with_assignment_explanation(mut self, explanation: impl Into<String>) -> Self {
        self.assignment_explanation = Some(explanation.into());
        self
    }

    /// Returns true if the reported state equals `state`
    pub fn is_in(&self, state: &str) -> bool {
        self.state == state
    }

    /// Cumulative search count, if timing counters were reported
    pub fn search_count(&self) -> Option<u64> {
        self.timing.map(|t| t.search_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let snapshot = RemoteStatusSnapshot::new("datafeed-1", "started")
            .with_search_count(42)
            .with_assignment_explanation("assigned to node-a");

        assert!(snapshot.is_in("started"));
        assert!(!snapshot.is_in("stopped"));
        assert_eq!(snapshot.search_count(), Some(42));
        assert_eq!(
            snapshot.assignment_explanation.as_deref(),
            Some("assigned to node-a")
        );
    }

    #[test]
    fn test_json_omits_absent_fields() {
        let snapshot = RemoteStatusSnapshot::new("job-1", "closed");
        let json = serde_json::to_string_pretty(&snapshot).unwrap();
        assert!(json.contains("\"state\": \"closed\""));
        assert!(!json.contains("running_interval"));
        assert!(!json.contains("timing"));

        let parsed: RemoteStatusSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, snapshot);
    }
}
