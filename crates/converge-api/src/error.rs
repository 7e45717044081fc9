//! Errors returned by the remote resource API

use crate::context::ContextError;
use crate::kind::ResourceKind;

/// Remote API failure
///
/// None of these are retried by the convergence engine; they are surfaced
/// to the caller unchanged.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ApiError {
    #[error("{kind} {id} not found")]
    NotFound { kind: ResourceKind, id: String },

    /// The action conflicts with the current state (e.g. already stopped)
    #[error("{kind} {id} conflict: {reason}")]
    Conflict {
        kind: ResourceKind,
        id: String,
        reason: String,
    },

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("request rejected with status {status}: {reason}")]
    Rejected { status: u16, reason: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("malformed response: {0}")]
    Malformed(String),

    /// The call was abandoned because its context finished
    #[error(transparent)]
    Context(#[from] ContextError),
}

impl ApiError {
    pub fn not_found(kind: ResourceKind, id: impl Into<String>) -> Self {
        ApiError::NotFound {
            kind,
            id: id.into(),
        }
    }

    pub fn conflict(kind: ResourceKind, id: impl Into<String>, reason: impl Into<String>) -> Self {
        ApiError::Conflict {
            kind,
            id: id.into(),
            reason: reason.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::NotFound { .. })
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, ApiError::Conflict { .. })
    }

    /// The context error, if the call was interrupted by its context
    pub fn context_error(&self) -> Option<ContextError> {
        match self {
            ApiError::Context(err) => Some(*err),
            _ => None,
        }
    }
}
