//! Reconciliation outcomes

use converge_api::{RemoteStatusSnapshot, ResourceKind, TransitionAction};
use serde::Serialize;

use super::ReconcileError;

/// Result of one `reconcile` call
///
/// - converged: `converged = true`, `final_snapshot` is the verified state
/// - still converging: `converged = false`, `error` is a timeout or
///   cancellation and `final_snapshot` is the last state observed
/// - failed: `converged = false`, `error` set
#[derive(Debug, Clone)]
pub struct ConvergenceOutcome {
    converged: bool,
    final_snapshot: Option<RemoteStatusSnapshot>,
    action: Option<TransitionAction>,
    error: Option<ReconcileError>,
}

impl ConvergenceOutcome {
    pub fn reached(snapshot: RemoteStatusSnapshot, action: Option<TransitionAction>) -> Self {
        Self {
            converged: true,
            final_snapshot: Some(snapshot),
            action,
            error: None,
        }
    }

    pub fn failed(error: ReconcileError, action: Option<TransitionAction>) -> Self {
        let final_snapshot = error.last_observed().cloned();
        Self {
            converged: false,
            final_snapshot,
            action,
            error: Some(error),
        }
    }

    pub fn is_converged(&self) -> bool {
        self.converged
    }

    /// Verified final state when converged, last observed state otherwise
    pub fn final_snapshot(&self) -> Option<&RemoteStatusSnapshot> {
        self.final_snapshot.as_ref()
    }

    /// The transition dispatched, `None` when nothing had to change
    pub fn action(&self) -> Option<TransitionAction> {
        self.action
    }

    pub fn error(&self) -> Option<&ReconcileError> {
        self.error.as_ref()
    }

    /// Timed out or cancelled while waiting; retrying may succeed
    pub fn is_still_converging(&self) -> bool {
        self.error.as_ref().is_some_and(ReconcileError::is_retryable)
    }

    /// The verified final snapshot, or the error.
    ///
    /// A failed outcome always carries its error, and a converged one its
    /// snapshot, so exactly one side is present.
    pub fn into_result(self) -> Result<RemoteStatusSnapshot, ReconcileError> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self
                .final_snapshot
                .unwrap_or_else(|| RemoteStatusSnapshot::new(String::new(), String::new()))),
        }
    }

    /// Serializable summary for CLI output
    pub fn report(&self, kind: ResourceKind, resource_id: &str, desired: &str) -> OutcomeReport {
        OutcomeReport {
            kind,
            resource_id: resource_id.to_string(),
            desired_state: desired.to_string(),
            converged: self.converged,
            action: self.action,
            final_state: self.final_snapshot.as_ref().map(|s| s.state.clone()),
            final_snapshot: self.final_snapshot.clone(),
            error_category: self.error.as_ref().map(|e| e.category().to_string()),
            error: self.error.as_ref().map(|e| e.to_string()),
        }
    }
}

/// JSON form of a `ConvergenceOutcome`
#[derive(Debug, Clone, Serialize)]
pub struct OutcomeReport {
    pub kind: ResourceKind,
    pub resource_id: String,
    pub desired_state: String,
    pub converged: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<TransitionAction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_snapshot: Option<RemoteStatusSnapshot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl OutcomeReport {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// What `StateController::delete` did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteOutcome {
    /// Local tracking dropped; remote state untouched
    Forgotten,

    /// Nothing to delete
    AlreadyGone,

    /// Deleted, after stopping it first if it was running
    Deleted { stopped_first: bool },
}

#[cfg(test)]
mod tests {
    use super::*;
    use converge_api::ContextError;

    #[test]
    fn test_timeout_outcome_keeps_last_snapshot() {
        let err = ReconcileError::NotConverged {
            kind: ResourceKind::Datafeed,
            id: "df-1".to_string(),
            desired: "started".to_string(),
            last_observed: Some(Box::new(RemoteStatusSnapshot::new("df-1", "starting"))),
            source: ContextError::DeadlineExceeded,
        };

        let outcome = ConvergenceOutcome::failed(err, Some(TransitionAction::Start));
        assert!(!outcome.is_converged());
        assert!(outcome.is_still_converging());
        assert_eq!(
            outcome.final_snapshot().map(|s| s.state.as_str()),
            Some("starting")
        );

        let report = outcome.report(ResourceKind::Datafeed, "df-1", "started");
        assert_eq!(report.error_category.as_deref(), Some("timeout"));
        assert_eq!(report.final_state.as_deref(), Some("starting"));
        assert!(outcome.into_result().unwrap_err().is_deadline_exceeded());
    }

    #[test]
    fn test_converged_report_json() {
        let outcome = ConvergenceOutcome::reached(
            RemoteStatusSnapshot::new("job-1", "closed"),
            Some(TransitionAction::Close),
        );
        assert!(!outcome.is_still_converging());

        let json = outcome.report(ResourceKind::Job, "job-1", "closed").to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["converged"], true);
        assert_eq!(value["action"], "close");
        assert_eq!(value["final_state"], "closed");
        assert!(value.get("error").is_none());
    }

    #[test]
    fn test_delete_outcome_serialization() {
        let value = serde_json::to_value(DeleteOutcome::Deleted { stopped_first: true }).unwrap();
        assert_eq!(value["deleted"]["stopped_first"], true);
        assert_eq!(serde_json::to_value(DeleteOutcome::Forgotten).unwrap(), "forgotten");
    }
}
