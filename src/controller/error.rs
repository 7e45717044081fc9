//! Reconciliation errors

use converge_api::{ApiError, ContextError, RemoteStatusSnapshot, ResourceKind};

use super::drift::Drift;

/// Errors surfaced by `StateController`
///
/// Every variant names the resource; none is retried internally.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ReconcileError {
    /// Invalid request (unknown state, empty id, bad bounds). Never dispatched.
    #[error("invalid {kind} state request: {reason}")]
    Config { kind: ResourceKind, reason: String },

    /// The resource must exist before its state can be reconciled
    #[error("{kind} {id} not found")]
    NotFound { kind: ResourceKind, id: String },

    /// The remote API failed during `operation`
    #[error("failed to {operation} {kind} {id} (desired state {desired}): {source}")]
    Remote {
        kind: ResourceKind,
        id: String,
        desired: String,
        operation: &'static str,
        #[source]
        source: ApiError,
    },

    /// The context finished before the resource converged
    #[error("{kind} {id} did not reach state {desired} ({}): {source}", last_state_label(.last_observed))]
    NotConverged {
        kind: ResourceKind,
        id: String,
        desired: String,
        last_observed: Option<Box<RemoteStatusSnapshot>>,
        #[source]
        source: ContextError,
    },

    /// The reported state matched but the transition did not genuinely happen
    #[error("{kind} {id} reported state {desired} but drifted: {drift}")]
    Drift {
        kind: ResourceKind,
        id: String,
        desired: String,
        drift: Drift,
    },
}

fn last_state_label(last: &Option<Box<RemoteStatusSnapshot>>) -> String {
    match last {
        Some(snapshot) => format!("last observed state {}", snapshot.state),
        None => "no state observed".to_string(),
    }
}

impl ReconcileError {
    pub fn config(kind: ResourceKind, reason: impl Into<String>) -> Self {
        ReconcileError::Config {
            kind,
            reason: reason.into(),
        }
    }

    /// The context error, for timeouts and cancellations
    pub fn context_error(&self) -> Option<ContextError> {
        match self {
            ReconcileError::NotConverged { source, .. } => Some(*source),
            _ => None,
        }
    }

    pub fn is_deadline_exceeded(&self) -> bool {
        self.context_error() == Some(ContextError::DeadlineExceeded)
    }

    pub fn is_cancelled(&self) -> bool {
        self.context_error() == Some(ContextError::Cancelled)
    }

    /// Only running out of time is worth retrying (with a larger timeout)
    pub fn is_retryable(&self) -> bool {
        matches!(self, ReconcileError::NotConverged { .. })
    }

    /// Last snapshot seen before giving up, if any
    pub fn last_observed(&self) -> Option<&RemoteStatusSnapshot> {
        match self {
            ReconcileError::NotConverged { last_observed, .. } => last_observed.as_deref(),
            _ => None,
        }
    }

    /// Short machine-readable category
    pub fn category(&self) -> &'static str {
        match self {
            ReconcileError::Config { .. } => "config",
            ReconcileError::NotFound { .. } => "not_found",
            ReconcileError::Remote { .. } => "remote",
            ReconcileError::NotConverged { source: ContextError::Cancelled, .. } => "cancelled",
            ReconcileError::NotConverged { .. } => "timeout",
            ReconcileError::Drift { .. } => "drift",
        }
    }

    /// Process exit code for the CLI
    pub fn exit_code(&self) -> i32 {
        match self {
            ReconcileError::Config { .. } => 10,
            ReconcileError::NotFound { .. } => 11,
            ReconcileError::Remote { .. } => 20,
            ReconcileError::Drift { .. } => 30,
            ReconcileError::NotConverged { .. } => 80,
        }
    }
}
