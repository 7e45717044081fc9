//! Datafeed: started / stopped

use converge_api::{RemoteStatusSnapshot, ResourceKind, TransitionAction, TransitionCommand};

use super::{DeletePolicy, ResourceAdapter};
use crate::controller::{ReconcileError, TransitionRequest};

pub const STARTED: &str = "started";
pub const STOPPED: &str = "stopped";

/// Datafeeds start (optionally over a bounded search window) and stop.
///
/// `starting` and `stopping` are reported while a transition is in flight
/// and simply mean "not converged yet". The cumulative search count must
/// never go backwards across a transition.
#[derive(Debug, Clone, Copy, Default)]
pub struct DatafeedAdapter;

impl ResourceAdapter for DatafeedAdapter {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Datafeed
    }

    fn valid_states(&self) -> &'static [&'static str] {
        &[STARTED, STOPPED]
    }

    fn transitional_states(&self) -> &'static [&'static str] {
        &["starting", "stopping"]
    }

    fn accepts_bounds(&self, desired: &str) -> bool {
        desired == STARTED
    }

    fn command_for(&self, request: &TransitionRequest) -> Result<TransitionCommand, ReconcileError> {
        let command = match request.desired_state.as_str() {
            STARTED => TransitionCommand::new(TransitionAction::Start)
                .with_bounds(request.start, request.end),
            STOPPED => TransitionCommand::new(TransitionAction::Stop).with_force(request.force),
            other => return Err(self.unknown_state(other)),
        };
        Ok(command.with_timeout(request.timeout))
    }

    fn progress_counter(&self, snapshot: &RemoteStatusSnapshot) -> Option<(&'static str, u64)> {
        snapshot.search_count().map(|count| ("search_count", count))
    }

    fn delete_policy(&self) -> DeletePolicy {
        DeletePolicy::StopThenDelete {
            action: TransitionAction::Stop,
            settled_state: STOPPED,
        }
    }
}
