//! Per-kind transition adapters
//!
//! Everything that differs between jobs and datafeeds lives here: the
//! closed set of target states, which remote action reaches each state,
//! which progress counter guards against drift, and what deleting the
//! managing resource does. The controller itself is kind-agnostic.

mod datafeed;
mod job;

pub use datafeed::DatafeedAdapter;
pub use job::JobAdapter;

use converge_api::{RemoteStatusSnapshot, ResourceKind, TransitionAction, TransitionCommand};

use crate::controller::{ReconcileError, TransitionRequest};

/// What deleting the managing resource does to the remote resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletePolicy {
    /// Leave remote state untouched; only local tracking is dropped
    Inert,

    /// Bring the resource to `settled_state` via `action`, then delete it
    StopThenDelete {
        action: TransitionAction,
        settled_state: &'static str,
    },
}

/// Kind-specific transition behaviour
pub trait ResourceAdapter: Send + Sync {
    fn kind(&self) -> ResourceKind;

    /// States a caller may ask for
    fn valid_states(&self) -> &'static [&'static str];

    /// States the remote system reports while moving between valid states
    fn transitional_states(&self) -> &'static [&'static str];

    /// Whether start/end bounds may accompany a request for `desired`
    fn accepts_bounds(&self, _desired: &str) -> bool {
        false
    }

    /// The single command that moves the resource towards `request.desired_state`
    fn command_for(&self, request: &TransitionRequest) -> Result<TransitionCommand, ReconcileError>;

    /// Monotonic progress counter (name, value), if the kind exposes one
    fn progress_counter(&self, _snapshot: &RemoteStatusSnapshot) -> Option<(&'static str, u64)> {
        None
    }

    fn delete_policy(&self) -> DeletePolicy;

    fn is_valid_state(&self, state: &str) -> bool {
        self.valid_states().contains(&state)
    }

    fn is_transitional(&self, state: &str) -> bool {
        self.transitional_states().contains(&state)
    }

    /// Config error for a state outside `valid_states`
    fn unknown_state(&self, state: &str) -> ReconcileError {
        ReconcileError::config(
            self.kind(),
            format!(
                "unknown desired state '{}' (expected one of: {})",
                state,
                self.valid_states().join(", ")
            ),
        )
    }
}

/// The adapter for `kind`
pub fn adapter_for(kind: ResourceKind) -> &'static dyn ResourceAdapter {
    match kind {
        ResourceKind::Job => &JobAdapter,
        ResourceKind::Datafeed => &DatafeedAdapter,
    }
}
