//! Package storage.

mod in_memory;
mod sqlite;

pub use in_memory::InMemoryPackageStore;
pub use sqlite::SqlitePackageStore;

use std::sync::Arc;

use mailroom_core::{MailPackage, PackageId, PackageMutation, PackageState, WorkflowResult};

/// Durable record of mail packages.
///
/// All mutating operations are conditional on the caller's expected current
/// state (optimistic concurrency). A losing writer gets
/// [`mailroom_core::WorkflowError::PreconditionFailed`] and should re-fetch;
/// there are no locks to hold. Every successful mutation refreshes
/// `updated_at` and is visible to subsequent `get` calls.
pub trait PackageStore: Send + Sync {
    /// Create a new package in `Scanning` with the given image refs.
    fn create(&self, images: Vec<String>) -> WorkflowResult<MailPackage>;

    /// Fetch a package by id.
    fn get(&self, id: PackageId) -> WorkflowResult<MailPackage>;

    /// Apply a mutation, conditional on the package currently being in
    /// `expected`. Returns the updated package.
    fn apply(
        &self,
        id: PackageId,
        expected: PackageState,
        mutation: PackageMutation,
    ) -> WorkflowResult<MailPackage>;

    /// All packages currently in `state`, oldest first.
    fn list_by_state(&self, state: PackageState) -> WorkflowResult<Vec<MailPackage>>;

    /// All packages, oldest first.
    fn list(&self) -> WorkflowResult<Vec<MailPackage>>;
}

impl<T: PackageStore + ?Sized> PackageStore for Arc<T> {
    fn create(&self, images: Vec<String>) -> WorkflowResult<MailPackage> {
        (**self).create(images)
    }

    fn get(&self, id: PackageId) -> WorkflowResult<MailPackage> {
        (**self).get(id)
    }

    fn apply(
        &self,
        id: PackageId,
        expected: PackageState,
        mutation: PackageMutation,
    ) -> WorkflowResult<MailPackage> {
        (**self).apply(id, expected, mutation)
    }

    fn list_by_state(&self, state: PackageState) -> WorkflowResult<Vec<MailPackage>> {
        (**self).list_by_state(state)
    }

    fn list(&self) -> WorkflowResult<Vec<MailPackage>> {
        (**self).list()
    }
}
