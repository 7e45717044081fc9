//! Remote Resource API surface
//!
//! Types shared between the convergence engine and whatever executes the
//! actual remote calls: the execution context, resource kinds, status
//! snapshots, transition commands and the error taxonomy.

pub mod api;
pub mod command;
pub mod context;
pub mod error;
pub mod kind;
pub mod snapshot;

pub use api::RemoteResourceApi;
pub use command::{TransitionAction, TransitionCommand};
pub use context::{CancelHandle, Context, ContextError};
pub use error::ApiError;
pub use kind::{ParseKindError, ResourceKind};
pub use snapshot::{NodeInfo, RemoteStatusSnapshot, RunningInterval, TimingCounters};
