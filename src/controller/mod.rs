//! State controller
//!
//! Drives one resource to one desired state:
//!
//! 1. validate the request (never dispatched when invalid)
//! 2. fetch the current status; a missing resource is fatal
//! 3. already there: return without dispatching anything
//! 4. dispatch exactly one transition command
//! 5. poll until the reported state matches
//! 6. re-fetch and check for drift against the pre-transition snapshot
//!
//! Nothing is retried. A timeout or cancellation yields a
//! `NotConverged` error carrying the last snapshot seen, so the caller can
//! tell "still converging" apart from "failed".

mod drift;
mod error;
mod outcome;
mod request;

pub use drift::{detect_drift, Drift};
pub use error::ReconcileError;
pub use outcome::{ConvergenceOutcome, DeleteOutcome, OutcomeReport};
pub use request::{StateDeclaration, TransitionRequest};

use std::sync::Arc;

use converge_api::{
    ApiError, Context, ContextError, RemoteResourceApi, RemoteStatusSnapshot, ResourceKind,
    TransitionAction, TransitionCommand,
};

use crate::adapter::{adapter_for, DeletePolicy};
use crate::observability::{delete_span, reconcile_span};
use crate::poller::{PollError, Poller};

/// Desired state used in errors raised while deleting
const DELETED: &str = "deleted";

/// The resource an operation targets, for error context
#[derive(Clone, Copy)]
struct Target<'a> {
    kind: ResourceKind,
    id: &'a str,
    desired: &'a str,
}

impl Target<'_> {
    fn error(
        &self,
        operation: &'static str,
        err: ApiError,
        last: Option<&RemoteStatusSnapshot>,
    ) -> ReconcileError {
        match err {
            ApiError::NotFound { .. } => ReconcileError::NotFound {
                kind: self.kind,
                id: self.id.to_string(),
            },
            ApiError::Context(source) => self.not_converged(source, last),
            source => ReconcileError::Remote {
                kind: self.kind,
                id: self.id.to_string(),
                desired: self.desired.to_string(),
                operation,
                source,
            },
        }
    }

    fn not_converged(&self, source: ContextError, last: Option<&RemoteStatusSnapshot>) -> ReconcileError {
        ReconcileError::NotConverged {
            kind: self.kind,
            id: self.id.to_string(),
            desired: self.desired.to_string(),
            last_observed: last.cloned().map(Box::new),
            source,
        }
    }

    fn poll_error(&self, err: PollError, last: &RemoteStatusSnapshot) -> ReconcileError {
        match err {
            PollError::Context(source) => self.not_converged(source, Some(last)),
            PollError::Check { source, .. } => self.error("check state of", source, Some(last)),
        }
    }
}

/// Converges remote resources onto requested states
pub struct StateController {
    api: Arc<dyn RemoteResourceApi>,
    poller: Poller,
}

impl StateController {
    pub fn new(api: Arc<dyn RemoteResourceApi>) -> Self {
        Self::with_poller(api, Poller::default())
    }

    pub fn with_poller(api: Arc<dyn RemoteResourceApi>, poller: Poller) -> Self {
        Self { api, poller }
    }

    pub fn poller(&self) -> Poller {
        self.poller
    }

    /// Drive `request.resource_id` to `request.desired_state`.
    ///
    /// `request.timeout`, when set, bounds the whole call on top of any
    /// deadline `ctx` already carries.
    pub fn reconcile(&self, ctx: &Context, request: &TransitionRequest) -> ConvergenceOutcome {
        let span = reconcile_span(request.kind, &request.resource_id, &request.desired_state);
        let _guard = span.enter();

        let mut action = None;
        match self.try_reconcile(ctx, request, &mut action) {
            Ok(snapshot) => {
                tracing::info!(
                    state = %snapshot.state,
                    action = action.as_ref().map(TransitionAction::as_str),
                    "converged"
                );
                ConvergenceOutcome::reached(snapshot, action)
            }
            Err(err) => {
                if err.is_retryable() {
                    tracing::warn!(error = %err, "not converged yet");
                } else {
                    tracing::error!(error = %err, category = err.category(), "reconcile failed");
                }
                ConvergenceOutcome::failed(err, action)
            }
        }
    }

    fn try_reconcile(
        &self,
        ctx: &Context,
        request: &TransitionRequest,
        action: &mut Option<TransitionAction>,
    ) -> Result<RemoteStatusSnapshot, ReconcileError> {
        request.validate()?;

        let adapter = adapter_for(request.kind);
        let target = Target {
            kind: request.kind,
            id: &request.resource_id,
            desired: &request.desired_state,
        };
        let ctx = match request.timeout {
            Some(timeout) => ctx.with_timeout(timeout),
            None => ctx.clone(),
        };

        let before = self
            .api
            .get_status(&ctx, target.kind, target.id)
            .map_err(|e| target.error("fetch status of", e, None))?;

        if before.is_in(target.desired) {
            tracing::debug!("already in desired state, nothing to dispatch");
            return Ok(before);
        }

        let command = adapter.command_for(request)?;
        tracing::info!(
            from = %before.state,
            action = %command.action,
            force = command.force,
            "dispatching transition"
        );
        self.api
            .dispatch_transition(&ctx, target.kind, target.id, &command)
            .map_err(|e| target.error(command.action.as_str(), e, Some(&before)))?;
        *action = Some(command.action);

        let last = self.wait_for_state(&ctx, target, before.clone())?;

        let after = self
            .api
            .get_status(&ctx, target.kind, target.id)
            .map_err(|e| target.error("fetch status of", e, Some(&last)))?;

        if let Some(drift) = detect_drift(adapter, target.desired, &before, &after) {
            tracing::warn!(%drift, "drift detected after convergence");
            return Err(ReconcileError::Drift {
                kind: target.kind,
                id: target.id.to_string(),
                desired: target.desired.to_string(),
                drift,
            });
        }

        Ok(after)
    }

    /// Poll until `target.desired` is reported; returns the matching snapshot
    fn wait_for_state(
        &self,
        ctx: &Context,
        target: Target<'_>,
        initial: RemoteStatusSnapshot,
    ) -> Result<RemoteStatusSnapshot, ReconcileError> {
        let api = &self.api;
        let mut last = initial;

        let mut checker = |ctx: &Context| -> Result<bool, ApiError> {
            let snapshot = api.get_status(ctx, target.kind, target.id)?;
            let reached = snapshot.is_in(target.desired);
            last = snapshot;
            Ok(reached)
        };
        let polled = self.poller.wait_for(ctx, target.kind, target.id, &mut checker);

        match polled {
            Ok(()) => Ok(last),
            Err(err) => Err(target.poll_error(err, &last)),
        }
    }

    /// Stop tracking `id`, removing the remote resource where its kind requires it.
    ///
    /// Jobs are left untouched. Datafeeds are stopped (non-forced) if
    /// running, then deleted; a datafeed that is already gone is not an
    /// error. A failed stop aborts before anything is deleted, unless the
    /// cluster answers with a conflict (already stopped).
    pub fn delete(
        &self,
        ctx: &Context,
        kind: ResourceKind,
        id: &str,
    ) -> Result<DeleteOutcome, ReconcileError> {
        let span = delete_span(kind, id);
        let _guard = span.enter();

        let (action, settled_state) = match adapter_for(kind).delete_policy() {
            DeletePolicy::Inert => {
                tracing::info!("remote state left untouched");
                return Ok(DeleteOutcome::Forgotten);
            }
            DeletePolicy::StopThenDelete {
                action,
                settled_state,
            } => (action, settled_state),
        };

        let settle = Target {
            kind,
            id,
            desired: settled_state,
        };

        let current = match self.api.get_status(ctx, kind, id) {
            Ok(snapshot) => snapshot,
            Err(err) if err.is_not_found() => {
                tracing::info!("already gone");
                return Ok(DeleteOutcome::AlreadyGone);
            }
            Err(err) => return Err(settle.error("fetch status of", err, None)),
        };

        let mut stopped_first = false;
        if !current.is_in(settled_state) {
            tracing::info!(from = %current.state, %action, "settling before delete");
            match self
                .api
                .dispatch_transition(ctx, kind, id, &TransitionCommand::new(action))
            {
                Ok(()) => match self.wait_for_state(ctx, settle, current) {
                    Ok(_) => stopped_first = true,
                    Err(ReconcileError::NotFound { .. }) => {
                        tracing::info!("gone while settling");
                        return Ok(DeleteOutcome::AlreadyGone);
                    }
                    Err(err) => return Err(err),
                },
                Err(err) if err.is_conflict() => {
                    tracing::debug!(error = %err, "already settling or settled");
                }
                Err(err) if err.is_not_found() => {
                    tracing::info!("already gone");
                    return Ok(DeleteOutcome::AlreadyGone);
                }
                Err(err) => return Err(settle.error(action.as_str(), err, Some(&current))),
            }
        }

        let removal = Target {
            kind,
            id,
            desired: DELETED,
        };
        match self.api.delete(ctx, kind, id) {
            Ok(()) => {
                tracing::info!(stopped_first, "deleted");
                Ok(DeleteOutcome::Deleted { stopped_first })
            }
            Err(err) if err.is_not_found() => {
                tracing::info!("already gone");
                Ok(DeleteOutcome::AlreadyGone)
            }
            Err(err) => Err(removal.error("delete", err, None)),
        }
    }
}
