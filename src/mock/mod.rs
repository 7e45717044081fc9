//! Mock cluster
//!
//! In-process implementation of `RemoteResourceApi` for tests and for the
//! CLI's scenario mode. Resources live in memory; transitions either settle
//! at once or play back a scripted sequence of observations, and every
//! operation can be made to fail or stall through the failure injector.

mod cluster;
mod failure;
mod scenario;

pub use cluster::{settled_state, ApiCall, MockCluster, Observation};
pub use failure::{FailureConfig, FailureInjector, Operation};
pub use scenario::{FailureSpec, InjectedError, ResourceSpec, Scenario, ScenarioError};
