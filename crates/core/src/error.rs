//! Workflow error model.
//!
//! One taxonomy for the whole pipeline: gateways, store, and queue all speak
//! `WorkflowError`. Transient enrichment failures never appear here; the
//! worker absorbs them internally up to the retry budget.

use thiserror::Error;

use crate::id::PackageId;
use crate::package::PackageState;

/// Result type used across the workflow.
pub type WorkflowResult<T> = Result<T, WorkflowError>;

/// Workflow-level error.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum WorkflowError {
    /// The requested package does not exist.
    #[error("package not found: {0}")]
    NotFound(PackageId),

    /// The operation is not valid for the package's current state.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// An optimistic-concurrency loss: the package's state no longer matches
    /// what the caller assumed. Re-fetch and retry.
    #[error("precondition failed: expected {expected:?}, found {actual:?}")]
    PreconditionFailed {
        expected: PackageState,
        actual: PackageState,
    },

    /// Survey submitted before enrichment finished.
    #[error("package not ready for survey (state: {0:?})")]
    NotReady(PackageState),

    /// Survey submitted for an already-completed package. Clients may treat
    /// this as success-equivalent.
    #[error("survey already complete")]
    AlreadyComplete,

    /// The upload collaborator failed; no state was changed, the whole
    /// submission is safe to retry.
    #[error("upload failed: {0}")]
    UploadFailed(String),

    /// An enrichment job for this package is already outstanding.
    #[error("enrichment job already outstanding for package {0}")]
    DuplicateJob(PackageId),

    /// An identifier failed to parse.
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// Storage backend failure.
    #[error("storage error: {0}")]
    Storage(String),
}

impl WorkflowError {
    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }

    pub fn upload_failed(msg: impl Into<String>) -> Self {
        Self::UploadFailed(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }
}
