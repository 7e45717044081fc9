//! The remote resource API trait

use std::sync::Arc;

use crate::command::TransitionCommand;
use crate::context::Context;
use crate::error::ApiError;
use crate::kind::ResourceKind;
use crate::snapshot::RemoteStatusSnapshot;

/// Synchronous access to the remote system.
///
/// Implementations block the calling thread until the remote call returns
/// and should give up with `ApiError::Context` once `ctx` is done.
pub trait RemoteResourceApi: Send + Sync {
    /// Fetch the current status. A missing resource is `ApiError::NotFound`.
    fn get_status(
        &self,
        ctx: &Context,
        kind: ResourceKind,
        id: &str,
    ) -> Result<RemoteStatusSnapshot, ApiError>;

    /// Issue a transition. Returns once the remote system acknowledged it;
    /// does not wait for the resource to reach the new state.
    fn dispatch_transition(
        &self,
        ctx: &Context,
        kind: ResourceKind,
        id: &str,
        command: &TransitionCommand,
    ) -> Result<(), ApiError>;

    /// Delete the resource
    fn delete(&self, ctx: &Context, kind: ResourceKind, id: &str) -> Result<(), ApiError>;
}

impl<T: RemoteResourceApi + ?Sized> RemoteResourceApi for Arc<T> {
    fn get_status(
        &self,
        ctx: &Context,
        kind: ResourceKind,
        id: &str,
    ) -> Result<RemoteStatusSnapshot, ApiError> {
        (**self).get_status(ctx, kind, id)
    }

    fn dispatch_transition(
        &self,
        ctx: &Context,
        kind: ResourceKind,
        id: &str,
        command: &TransitionCommand,
    ) -> Result<(), ApiError> {
        (**self).dispatch_transition(ctx, kind, id, command)
    }

    fn delete(&self, ctx: &Context, kind: ResourceKind, id: &str) -> Result<(), ApiError> {
        (**self).delete(ctx, kind, id)
    }
}
