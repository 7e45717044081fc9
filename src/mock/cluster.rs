//! In-process mock of the remote resource API

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use converge_api::{
    ApiError, Context, RemoteResourceApi, RemoteStatusSnapshot, ResourceKind, TimingCounters,
    TransitionAction, TransitionCommand,
};
use serde::{Deserialize, Serialize};

use super::failure::{FailureConfig, FailureInjector, Operation};

/// One status the resource reports after a transition is dispatched
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observation {
    pub state: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_count: Option<u64>,
}

impl Observation {
    pub fn state(state: impl Into<String>) -> Self {
        Self {
            state: state.into(),
            search_count: None,
        }
    }

    pub fn with_search_count(mut self, search_count: u64) -> Self {
        self.search_count = Some(search_count);
        self
    }

    fn apply(self, snapshot: &mut RemoteStatusSnapshot) {
        snapshot.state = self.state;
        if let Some(search_count) = self.search_count {
            let timing = snapshot.timing.get_or_insert_with(TimingCounters::default);
            timing.search_count = search_count;
        }
    }
}

/// A call the cluster received, in order
#[derive(Debug, Clone, PartialEq)]
pub enum ApiCall {
    GetStatus {
        kind: ResourceKind,
        id: String,
    },
    Dispatch {
        kind: ResourceKind,
        id: String,
        command: TransitionCommand,
    },
    Delete {
        kind: ResourceKind,
        id: String,
    },
}

#[derive(Debug)]
struct MockResource {
    snapshot: RemoteStatusSnapshot,
    /// Consumed by the next dispatch
    after_transition: Vec<Observation>,
    /// Reported one per status call, the last one sticks
    pending: VecDeque<Observation>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// State the mock settles in once `action` completes
pub fn settled_state(action: TransitionAction) -> &'static str {
    match action {
        TransitionAction::Open => "opened",
        TransitionAction::Close => "closed",
        TransitionAction::Start => "started",
        TransitionAction::Stop => "stopped",
    }
}

/// Mock cluster holding jobs and datafeeds in memory
///
/// A dispatched transition completes instantly unless the resource has an
/// `after_transition` script, in which case each following status call
/// reports the next scripted observation.
#[derive(Debug, Default)]
pub struct MockCluster {
    resources: Mutex<BTreeMap<(ResourceKind, String), MockResource>>,
    failures: Mutex<FailureInjector>,
    calls: Mutex<Vec<ApiCall>>,
}

impl MockCluster {
    pub fn new() -> Self {
        Self::default()
    }

    // === Test configuration ===

    /// Add or replace a resource
    pub fn insert(&self, kind: ResourceKind, snapshot: RemoteStatusSnapshot) {
        self.insert_scripted(kind, snapshot, Vec::new());
    }

    /// Add or replace a resource with a post-transition script
    pub fn insert_scripted(
        &self,
        kind: ResourceKind,
        snapshot: RemoteStatusSnapshot,
        after_transition: Vec<Observation>,
    ) {
        let mut resources = lock(&self.resources);
        resources.insert(
            (kind, snapshot.resource_id.clone()),
            MockResource {
                snapshot,
                after_transition,
                pending: VecDeque::new(),
            },
        );
    }

    /// Replace the script of an existing resource; returns false if unknown
    pub fn set_after_transition(&self, kind: ResourceKind, id: &str, script: Vec<Observation>) -> bool {
        let mut resources = lock(&self.resources);
        match resources.get_mut(&(kind, id.to_string())) {
            Some(resource) => {
                resource.after_transition = script;
                true
            }
            None => false,
        }
    }

    pub fn inject_failure(&self, op: Operation, config: FailureConfig) {
        lock(&self.failures).inject(op, config);
    }

    pub fn inject_error(&self, op: Operation, error: ApiError) {
        lock(&self.failures).inject_error(op, error);
    }

    pub fn clear_failures(&self) {
        lock(&self.failures).clear();
    }

    // === Inspection ===

    pub fn contains(&self, kind: ResourceKind, id: &str) -> bool {
        lock(&self.resources).contains_key(&(kind, id.to_string()))
    }

    /// Current state, without recording a call or advancing a script
    pub fn state_of(&self, kind: ResourceKind, id: &str) -> Option<String> {
        let resources = lock(&self.resources);
        resources
            .get(&(kind, id.to_string()))
            .map(|r| r.snapshot.state.clone())
    }

    pub fn calls(&self) -> Vec<ApiCall> {
        lock(&self.calls).clone()
    }

    /// Commands dispatched so far
    pub fn dispatches(&self) -> Vec<TransitionCommand> {
        lock(&self.calls)
            .iter()
            .filter_map(|call| match call {
                ApiCall::Dispatch { command, .. } => Some(command.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn status_calls(&self) -> usize {
        lock(&self.calls)
            .iter()
            .filter(|call| matches!(call, ApiCall::GetStatus { .. }))
            .count()
    }

    fn record(&self, call: ApiCall) {
        lock(&self.calls).push(call);
    }

    /// Apply any injected failure for `op`, sleeping under `ctx` first
    fn check_failure(&self, ctx: &Context, op: Operation) -> Result<(), ApiError> {
        let failure = lock(&self.failures).check(op);
        let Some(failure) = failure else {
            return Ok(());
        };
        if let Some(delay) = failure.delay {
            ctx.sleep(delay)?;
        }
        match failure.error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl RemoteResourceApi for MockCluster {
    fn get_status(
        &self,
        ctx: &Context,
        kind: ResourceKind,
        id: &str,
    ) -> Result<RemoteStatusSnapshot, ApiError> {
        self.record(ApiCall::GetStatus {
            kind,
            id: id.to_string(),
        });
        ctx.check()?;
        self.check_failure(ctx, Operation::GetStatus)?;

        let mut resources = lock(&self.resources);
        let resource = resources
            .get_mut(&(kind, id.to_string()))
            .ok_or_else(|| ApiError::not_found(kind, id))?;

        if let Some(next) = resource.pending.pop_front() {
            next.apply(&mut resource.snapshot);
        }
        resource.snapshot.observed_at = Utc::now();
        Ok(resource.snapshot.clone())
    }

    fn dispatch_transition(
        &self,
        ctx: &Context,
        kind: ResourceKind,
        id: &str,
        command: &TransitionCommand,
    ) -> Result<(), ApiError> {
        self.record(ApiCall::Dispatch {
            kind,
            id: id.to_string(),
            command: command.clone(),
        });
        ctx.check()?;
        self.check_failure(ctx, Operation::Dispatch)?;

        let mut resources = lock(&self.resources);
        let resource = resources
            .get_mut(&(kind, id.to_string()))
            .ok_or_else(|| ApiError::not_found(kind, id))?;

        let script = std::mem::take(&mut resource.after_transition);
        if script.is_empty() {
            resource.pending.clear();
            resource.snapshot.state = settled_state(command.action).to_string();
        } else {
            resource.pending = script.into();
        }
        Ok(())
    }

    fn delete(&self, ctx: &Context, kind: ResourceKind, id: &str) -> Result<(), ApiError> {
        self.record(ApiCall::Delete {
            kind,
            id: id.to_string(),
        });
        ctx.check()?;
        self.check_failure(ctx, Operation::Delete)?;

        let mut resources = lock(&self.resources);
        resources
            .remove(&(kind, id.to_string()))
            .map(|_| ())
            .ok_or_else(|| ApiError::not_found(kind, id))
    }
}
