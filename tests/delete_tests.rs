//! Delete semantics per resource kind
//!
//! Jobs are never touched remotely. Datafeeds are stopped (gently) and then
//! deleted, tolerating a datafeed that is already stopped or already gone.
//! A stop that fails for any other reason leaves the datafeed in place.

use std::sync::Arc;
use std::time::Duration;

use elastic_converge::mock::{ApiCall, FailureConfig, MockCluster, Observation, Operation};
use elastic_converge::{
    ApiError, Context, DeleteOutcome, Poller, ReconcileError, RemoteStatusSnapshot, ResourceKind,
    StateController, TransitionAction,
};

fn controller(cluster: &Arc<MockCluster>) -> StateController {
    StateController::with_poller(cluster.clone(), Poller::new(Duration::from_millis(5)))
}

fn datafeed(id: &str, state: &str) -> RemoteStatusSnapshot {
    RemoteStatusSnapshot::new(id, state)
}

#[test]
fn test_job_delete_leaves_remote_untouched() {
    let cluster = Arc::new(MockCluster::new());
    cluster.insert(ResourceKind::Job, RemoteStatusSnapshot::new("job-1", "opened"));

    let outcome = controller(&cluster)
        .delete(&Context::background(), ResourceKind::Job, "job-1")
        .unwrap();

    assert_eq!(outcome, DeleteOutcome::Forgotten);
    assert!(cluster.calls().is_empty());
    assert_eq!(cluster.state_of(ResourceKind::Job, "job-1").as_deref(), Some("opened"));
}

#[test]
fn test_started_datafeed_is_stopped_then_deleted() {
    let cluster = Arc::new(MockCluster::new());
    cluster.insert_scripted(
        ResourceKind::Datafeed,
        datafeed("df-1", "started"),
        vec![
            Observation::state("stopping"),
            Observation::state("stopping"),
            Observation::state("stopped"),
        ],
    );

    let outcome = controller(&cluster)
        .delete(&Context::background(), ResourceKind::Datafeed, "df-1")
        .unwrap();

    assert_eq!(outcome, DeleteOutcome::Deleted { stopped_first: true });
    assert!(!cluster.contains(ResourceKind::Datafeed, "df-1"));

    let dispatches = cluster.dispatches();
    assert_eq!(dispatches.len(), 1);
    assert_eq!(dispatches[0].action, TransitionAction::Stop);
    assert!(!dispatches[0].force);

    // status + three polls, then the delete itself
    assert_eq!(cluster.status_calls(), 4);
    assert!(matches!(cluster.calls().last(), Some(ApiCall::Delete { .. })));
}

#[test]
fn test_stopped_datafeed_is_deleted_directly() {
    let cluster = Arc::new(MockCluster::new());
    cluster.insert(ResourceKind::Datafeed, datafeed("df-1", "stopped"));

    let outcome = controller(&cluster)
        .delete(&Context::background(), ResourceKind::Datafeed, "df-1")
        .unwrap();

    assert_eq!(outcome, DeleteOutcome::Deleted { stopped_first: false });
    assert!(cluster.dispatches().is_empty());
}

#[test]
fn test_missing_datafeed_is_already_gone() {
    let cluster = Arc::new(MockCluster::new());

    let outcome = controller(&cluster)
        .delete(&Context::background(), ResourceKind::Datafeed, "df-1")
        .unwrap();

    assert_eq!(outcome, DeleteOutcome::AlreadyGone);
    assert_eq!(cluster.calls().len(), 1);
}

#[test]
fn test_stop_conflict_is_tolerated() {
    let cluster = Arc::new(MockCluster::new());
    cluster.insert(ResourceKind::Datafeed, datafeed("df-1", "started"));
    cluster.inject_error(
        Operation::Dispatch,
        ApiError::conflict(ResourceKind::Datafeed, "df-1", "datafeed already stopped"),
    );

    let outcome = controller(&cluster)
        .delete(&Context::background(), ResourceKind::Datafeed, "df-1")
        .unwrap();

    assert_eq!(outcome, DeleteOutcome::Deleted { stopped_first: false });
    assert!(!cluster.contains(ResourceKind::Datafeed, "df-1"));
}

#[test]
fn test_stop_failure_aborts_delete() {
    let cluster = Arc::new(MockCluster::new());
    cluster.insert(ResourceKind::Datafeed, datafeed("df-1", "started"));
    cluster.inject_error(
        Operation::Dispatch,
        ApiError::Unauthorized("missing manage_ml privilege".to_string()),
    );

    let err = controller(&cluster)
        .delete(&Context::background(), ResourceKind::Datafeed, "df-1")
        .unwrap_err();

    assert!(matches!(
        err,
        ReconcileError::Remote {
            operation: "stop",
            source: ApiError::Unauthorized(_),
            ..
        }
    ));
    assert!(!cluster
        .calls()
        .iter()
        .any(|call| matches!(call, ApiCall::Delete { .. })));
    assert_eq!(cluster.state_of(ResourceKind::Datafeed, "df-1").as_deref(), Some("started"));
}

#[test]
fn test_datafeed_vanishing_while_stopping_is_already_gone() {
    let cluster = Arc::new(MockCluster::new());
    cluster.insert_scripted(
        ResourceKind::Datafeed,
        datafeed("df-1", "started"),
        vec![Observation::state("stopping")],
    );
    // initial status and one poll succeed, then the feed is gone
    cluster.inject_failure(
        Operation::GetStatus,
        FailureConfig::error(ApiError::not_found(ResourceKind::Datafeed, "df-1")).after_calls(2),
    );

    let outcome = controller(&cluster)
        .delete(&Context::background(), ResourceKind::Datafeed, "df-1")
        .unwrap();

    assert_eq!(outcome, DeleteOutcome::AlreadyGone);
    assert_eq!(cluster.status_calls(), 3);
    assert!(!matches!(cluster.calls().last(), Some(ApiCall::Delete { .. })));
}

#[test]
fn test_delete_failure_is_surfaced() {
    let cluster = Arc::new(MockCluster::new());
    cluster.insert(ResourceKind::Datafeed, datafeed("df-1", "stopped"));
    cluster.inject_error(
        Operation::Delete,
        ApiError::Rejected {
            status: 503,
            reason: "cluster busy".to_string(),
        },
    );

    let err = controller(&cluster)
        .delete(&Context::background(), ResourceKind::Datafeed, "df-1")
        .unwrap_err();

    assert!(matches!(err, ReconcileError::Remote { operation: "delete", .. }));
    assert!(cluster.contains(ResourceKind::Datafeed, "df-1"));
}

#[test]
fn test_delete_racing_removal_is_already_gone() {
    let cluster = Arc::new(MockCluster::new());
    cluster.insert(ResourceKind::Datafeed, datafeed("df-1", "stopped"));
    cluster.inject_error(
        Operation::Delete,
        ApiError::not_found(ResourceKind::Datafeed, "df-1"),
    );

    let outcome = controller(&cluster)
        .delete(&Context::background(), ResourceKind::Datafeed, "df-1")
        .unwrap();
    assert_eq!(outcome, DeleteOutcome::AlreadyGone);
}

#[test]
fn test_stop_that_never_settles_times_out() {
    let cluster = Arc::new(MockCluster::new());
    cluster.insert_scripted(
        ResourceKind::Datafeed,
        datafeed("df-1", "started"),
        vec![Observation::state("stopping")],
    );

    let ctx = Context::background().with_timeout(Duration::from_millis(40));
    let err = controller(&cluster)
        .delete(&ctx, ResourceKind::Datafeed, "df-1")
        .unwrap_err();

    assert!(err.is_deadline_exceeded());
    assert_eq!(err.last_observed().map(|s| s.state.as_str()), Some("stopping"));
    assert!(cluster.contains(ResourceKind::Datafeed, "df-1"));
}
