//! elastic-converge - state convergence for ML jobs and datafeeds
//!
//! Drives anomaly-detection jobs and their datafeeds to a declared state
//! (`opened`/`closed`, `started`/`stopped`) against a remote API that can
//! only start an action and report status. A transition is dispatched at
//! most once and then polled until the resource converges, the caller's
//! context times out or is cancelled, or the API fails. Convergence is
//! verified against the pre-transition snapshot to catch drift.
//!
//! The remote API is the `converge_api::RemoteResourceApi` trait; `mock`
//! provides an in-memory implementation.

pub mod adapter;
pub mod config;
pub mod controller;
pub mod mock;
pub mod observability;
pub mod poller;
pub mod timeout;

pub use adapter::{adapter_for, DatafeedAdapter, DeletePolicy, JobAdapter, ResourceAdapter};
pub use config::{ConfigError, ConvergeConfig, EffectiveConfig};
pub use controller::{
    detect_drift, ConvergenceOutcome, DeleteOutcome, Drift, OutcomeReport, ReconcileError,
    StateController, StateDeclaration, TransitionRequest,
};
pub use poller::{PollError, Poller, StateChecker, DEFAULT_POLL_INTERVAL};
pub use timeout::{parse_duration, TimeoutPolicy};

pub use converge_api::{
    ApiError, CancelHandle, Context, ContextError, RemoteResourceApi, RemoteStatusSnapshot,
    ResourceKind, TransitionAction, TransitionCommand,
};
