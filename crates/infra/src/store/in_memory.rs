//! In-memory store for tests and development.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use mailroom_core::{
    MailPackage, PackageId, PackageMutation, PackageState, WorkflowError, WorkflowResult,
};

use super::PackageStore;

#[derive(Debug, Default)]
pub struct InMemoryPackageStore {
    packages: RwLock<HashMap<PackageId, MailPackage>>,
}

impl InMemoryPackageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

impl PackageStore for InMemoryPackageStore {
    fn create(&self, images: Vec<String>) -> WorkflowResult<MailPackage> {
        let package = MailPackage::new(images);
        let mut packages = self.packages.write().unwrap();
        packages.insert(package.id, package.clone());
        Ok(package)
    }

    fn get(&self, id: PackageId) -> WorkflowResult<MailPackage> {
        let packages = self.packages.read().unwrap();
        packages
            .get(&id)
            .cloned()
            .ok_or(WorkflowError::NotFound(id))
    }

    fn apply(
        &self,
        id: PackageId,
        expected: PackageState,
        mutation: PackageMutation,
    ) -> WorkflowResult<MailPackage> {
        let mut packages = self.packages.write().unwrap();
        let package = packages.get_mut(&id).ok_or(WorkflowError::NotFound(id))?;

        if package.state != expected {
            return Err(WorkflowError::PreconditionFailed {
                expected,
                actual: package.state,
            });
        }

        // Mutate a copy so a rejected mutation leaves the stored record intact.
        let mut updated = package.clone();
        updated.apply(mutation)?;
        *package = updated.clone();
        Ok(updated)
    }

    fn list_by_state(&self, state: PackageState) -> WorkflowResult<Vec<MailPackage>> {
        let packages = self.packages.read().unwrap();
        let mut result: Vec<_> = packages
            .values()
            .filter(|p| p.state == state)
            .cloned()
            .collect();
        result.sort_by_key(|p| p.created_at);
        Ok(result)
    }

    fn list(&self) -> WorkflowResult<Vec<MailPackage>> {
        let packages = self.packages.read().unwrap();
        let mut result: Vec<_> = packages.values().cloned().collect();
        result.sort_by_key(|p| p.created_at);
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_and_get() {
        let store = InMemoryPackageStore::new();
        let created = store.create(vec!["img-1".to_string()]).unwrap();

        let fetched = store.get(created.id).unwrap();
        assert_eq!(fetched, created);
        assert_eq!(fetched.state, PackageState::Scanning);
    }

    #[test]
    fn get_missing_is_not_found() {
        let store = InMemoryPackageStore::new();
        let err = store.get(PackageId::new()).unwrap_err();
        assert!(matches!(err, WorkflowError::NotFound(_)));
    }

    #[test]
    fn apply_checks_expected_state() {
        let store = InMemoryPackageStore::new();
        let pkg = store.create(vec!["img-1".to_string()]).unwrap();

        let err = store
            .apply(
                pkg.id,
                PackageState::Processing,
                PackageMutation::IncrementRetry,
            )
            .unwrap_err();
        assert_eq!(
            err,
            WorkflowError::PreconditionFailed {
                expected: PackageState::Processing,
                actual: PackageState::Scanning,
            }
        );
    }

    #[test]
    fn rejected_mutation_leaves_record_untouched() {
        let store = InMemoryPackageStore::new();
        let pkg = store.create(Vec::new()).unwrap();

        // BeginProcessing requires non-empty artifacts.
        let err = store
            .apply(
                pkg.id,
                PackageState::Scanning,
                PackageMutation::BeginProcessing {
                    ocr_text: "text".to_string(),
                    ocr_ref: "blob".to_string(),
                },
            )
            .unwrap_err();
        assert!(matches!(err, WorkflowError::InvalidState(_)));
        assert_eq!(store.get(pkg.id).unwrap().state, PackageState::Scanning);
    }

    #[test]
    fn successful_mutation_refreshes_updated_at() {
        let store = InMemoryPackageStore::new();
        let pkg = store.create(vec!["img-1".to_string()]).unwrap();

        let updated = store
            .apply(
                pkg.id,
                PackageState::Scanning,
                PackageMutation::AppendImages(vec!["img-2".to_string()]),
            )
            .unwrap();
        assert!(updated.updated_at >= pkg.updated_at);
        assert_eq!(store.get(pkg.id).unwrap().images.len(), 2);
    }

    #[test]
    fn list_by_state_is_oldest_first() {
        let store = InMemoryPackageStore::new();
        let a = store.create(vec!["a".to_string()]).unwrap();
        let b = store.create(vec!["b".to_string()]).unwrap();

        let scanning = store.list_by_state(PackageState::Scanning).unwrap();
        assert_eq!(
            scanning.iter().map(|p| p.id).collect::<Vec<_>>(),
            vec![a.id, b.id]
        );
        assert!(store.list_by_state(PackageState::Failed).unwrap().is_empty());
    }
}
