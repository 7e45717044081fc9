//! Anomaly detection job: opened / closed

use converge_api::{ResourceKind, TransitionAction, TransitionCommand};

use super::{DeletePolicy, ResourceAdapter};
use crate::controller::{ReconcileError, TransitionRequest};

pub const OPENED: &str = "opened";
pub const CLOSED: &str = "closed";

/// Jobs open and close. Deleting the state resource never touches the job:
/// the job was created elsewhere and only its state is tracked here.
#[derive(Debug, Clone, Copy, Default)]
pub struct JobAdapter;

impl ResourceAdapter for JobAdapter {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Job
    }

    fn valid_states(&self) -> &'static [&'static str] {
        &[OPENED, CLOSED]
    }

    fn transitional_states(&self) -> &'static [&'static str] {
        &["opening", "closing"]
    }

    fn command_for(&self, request: &TransitionRequest) -> Result<TransitionCommand, ReconcileError> {
        let command = match request.desired_state.as_str() {
            OPENED => TransitionCommand::new(TransitionAction::Open),
            CLOSED => TransitionCommand::new(TransitionAction::Close).with_force(request.force),
            other => return Err(self.unknown_state(other)),
        };
        Ok(command.with_timeout(request.timeout))
    }

    fn delete_policy(&self) -> DeletePolicy {
        DeletePolicy::Inert
    }
}
