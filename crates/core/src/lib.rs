//! `mailroom-core` — domain foundation for the mail package workflow.
//!
//! This crate contains **pure domain** primitives (no storage, queue, or HTTP
//! concerns): typed identifiers, the [`MailPackage`] entity and its state
//! machine, and the shared [`WorkflowError`] taxonomy.

pub mod error;
pub mod id;
pub mod package;
pub mod status;

pub use error::{WorkflowError, WorkflowResult};
pub use id::{JobId, PackageId};
pub use package::{
    Enrichment, FailureInfo, MailPackage, PackageMutation, PackageState, SurveyResult, UrgencyLevel,
};
pub use status::DisplayState;
