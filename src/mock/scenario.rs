//! TOML scenarios for the mock cluster
//!
//! ```toml
//! [[resource]]
//! kind = "job"
//! id = "job-1"
//! state = "opened"
//! after_transition = [
//!     { state = "opened" },
//!     { state = "closing" },
//!     { state = "closed" },
//! ]
//!
//! [[failure]]
//! operation = "dispatch"
//! error = "conflict"
//! kind = "datafeed"
//! id = "df-1"
//! reason = "already stopping"
//! fail_count = 1
//! ```

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use converge_api::{ApiError, RemoteStatusSnapshot, ResourceKind};
use serde::{Deserialize, Serialize};

use super::cluster::{MockCluster, Observation};
use super::failure::{FailureConfig, Operation};
use crate::adapter::adapter_for;

#[derive(Debug, thiserror::Error)]
pub enum ScenarioError {
    #[error("failed to read scenario {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid scenario TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("{kind} {id} is declared more than once")]
    Duplicate { kind: ResourceKind, id: String },

    #[error("invalid scenario: {0}")]
    Invalid(String),
}

/// One resource in the mock cluster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceSpec {
    pub kind: ResourceKind,
    pub id: String,
    pub state: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignment_explanation: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub after_transition: Vec<Observation>,
}

impl ResourceSpec {
    fn snapshot(&self) -> RemoteStatusSnapshot {
        let mut snapshot = RemoteStatusSnapshot::new(&self.id, &self.state);
        if let Some(count) = self.search_count {
            snapshot = snapshot.with_search_count(count);
        }
        if let Some(explanation) = &self.assignment_explanation {
            snapshot = snapshot.with_assignment_explanation(explanation);
        }
        snapshot
    }
}

/// Error kinds a scenario can inject
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InjectedError {
    NotFound,
    Conflict,
    Unauthorized,
    Rejected,
    Transport,
    Malformed,
}

/// One injected failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureSpec {
    pub operation: Operation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<InjectedError>,

    /// Resource named in not_found / conflict errors
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<ResourceKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default = "default_reason")]
    pub reason: String,
    #[serde(default = "default_status")]
    pub status: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fail_count: Option<u32>,
    #[serde(default)]
    pub after_calls: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay_ms: Option<u64>,
}

fn default_reason() -> String {
    "injected failure".to_string()
}

fn default_status() -> u16 {
    500
}

impl FailureSpec {
    fn to_config(&self) -> Result<FailureConfig, ScenarioError> {
        let error = match self.error {
            None => None,
            Some(kind) => Some(self.api_error(kind)?),
        };
        if error.is_none() && self.delay_ms.is_none() {
            return Err(ScenarioError::Invalid(format!(
                "failure on {:?} sets neither error nor delay_ms",
                self.operation
            )));
        }

        Ok(FailureConfig {
            error,
            delay: self.delay_ms.map(Duration::from_millis),
            fail_count: self.fail_count,
            after_calls: self.after_calls,
        })
    }

    fn api_error(&self, injected: InjectedError) -> Result<ApiError, ScenarioError> {
        let reason = self.reason.clone();
        let target = || match (self.kind, self.id.as_deref()) {
            (Some(kind), Some(id)) => Ok((kind, id.to_string())),
            _ => Err(ScenarioError::Invalid(format!(
                "{:?} failure needs both kind and id",
                injected
            ))),
        };

        Ok(match injected {
            InjectedError::NotFound => {
                let (kind, id) = target()?;
                ApiError::NotFound { kind, id }
            }
            InjectedError::Conflict => {
                let (kind, id) = target()?;
                ApiError::Conflict { kind, id, reason }
            }
            InjectedError::Unauthorized => ApiError::Unauthorized(reason),
            InjectedError::Rejected => ApiError::Rejected {
                status: self.status,
                reason,
            },
            InjectedError::Transport => ApiError::Transport(reason),
            InjectedError::Malformed => ApiError::Malformed(reason),
        })
    }
}

/// A mock cluster described in TOML
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(default, rename = "resource")]
    pub resources: Vec<ResourceSpec>,
    #[serde(default, rename = "failure")]
    pub failures: Vec<FailureSpec>,
}

impl Scenario {
    pub fn from_path(path: &Path) -> Result<Self, ScenarioError> {
        let contents = fs::read_to_string(path).map_err(|source| ScenarioError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ScenarioError> {
        let scenario: Scenario = toml::from_str(contents)?;
        scenario.validate()?;
        Ok(scenario)
    }

    /// Reject duplicates and states the kind never reports
    pub fn validate(&self) -> Result<(), ScenarioError> {
        let mut seen = BTreeSet::new();
        for resource in &self.resources {
            if !seen.insert((resource.kind, resource.id.as_str())) {
                return Err(ScenarioError::Duplicate {
                    kind: resource.kind,
                    id: resource.id.clone(),
                });
            }

            let adapter = adapter_for(resource.kind);
            let states = std::iter::once(resource.state.as_str())
                .chain(resource.after_transition.iter().map(|o| o.state.as_str()));
            for state in states {
                if !adapter.is_valid_state(state) && !adapter.is_transitional(state) {
                    return Err(ScenarioError::Invalid(format!(
                        "{} {} uses unknown state '{}'",
                        resource.kind, resource.id, state
                    )));
                }
            }
        }

        for failure in &self.failures {
            failure.to_config()?;
        }
        Ok(())
    }

    /// Build a cluster holding every declared resource and failure
    pub fn build(&self) -> Result<MockCluster, ScenarioError> {
        let cluster = MockCluster::new();
        for resource in &self.resources {
            cluster.insert_scripted(
                resource.kind,
                resource.snapshot(),
                resource.after_transition.clone(),
            );
        }
        for failure in &self.failures {
            cluster.inject_failure(failure.operation, failure.to_config()?);
        }
        Ok(cluster)
    }
}
