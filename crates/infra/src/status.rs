//! Read-side status projection.
//!
//! Collapses internal workflow state into the four-value display status the
//! UI shows, plus the handful of fields a list view needs.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use mailroom_core::{DisplayState, MailPackage, PackageId, WorkflowResult};

use crate::store::PackageStore;

/// What a user sees for one package.
#[derive(Debug, Clone, Serialize)]
pub struct PackageStatusView {
    pub id: String,
    pub display: DisplayState,
    pub label: &'static str,
    /// Whether the user can act on the package right now (survey or retry).
    pub actionable: bool,
    pub retry_count: u32,
    pub failure_reason: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl From<&MailPackage> for PackageStatusView {
    fn from(package: &MailPackage) -> Self {
        let display = DisplayState::from(package.state);
        Self {
            id: package.id.to_string(),
            display,
            label: display.label(),
            actionable: display.is_actionable(),
            retry_count: package.retry_count,
            failure_reason: package.failure.as_ref().map(|f| f.reason.clone()),
            updated_at: package.updated_at,
        }
    }
}

pub struct StatusProjector {
    store: Arc<dyn PackageStore>,
}

impl StatusProjector {
    pub fn new(store: Arc<dyn PackageStore>) -> Self {
        Self { store }
    }

    pub fn status(&self, id: PackageId) -> WorkflowResult<PackageStatusView> {
        Ok(PackageStatusView::from(&self.store.get(id)?))
    }

    /// Status of every package, oldest first.
    pub fn overview(&self) -> WorkflowResult<Vec<PackageStatusView>> {
        Ok(self
            .store
            .list()?
            .iter()
            .map(PackageStatusView::from)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mailroom_core::{PackageMutation, PackageState};

    use crate::store::InMemoryPackageStore;
    use crate::testing::sample_enrichment;

    #[test]
    fn projects_display_state_and_failure_reason() {
        let store = InMemoryPackageStore::arc();
        let projector = StatusProjector::new(store.clone());

        let pkg = store.create(vec!["img".to_string()]).unwrap();
        let view = projector.status(pkg.id).unwrap();
        assert_eq!(view.display, DisplayState::Processing);
        assert_eq!(view.label, "Processing…");
        assert!(!view.actionable);
        assert!(view.failure_reason.is_none());

        store
            .apply(
                pkg.id,
                PackageState::Scanning,
                PackageMutation::BeginProcessing {
                    ocr_text: "text".to_string(),
                    ocr_ref: "blob".to_string(),
                },
            )
            .unwrap();
        store
            .apply(
                pkg.id,
                PackageState::Processing,
                PackageMutation::MarkFailed {
                    reason: "analysis timed out".to_string(),
                },
            )
            .unwrap();

        let view = projector.status(pkg.id).unwrap();
        assert_eq!(view.display, DisplayState::NeedsAttention);
        assert!(view.actionable);
        assert_eq!(view.retry_count, 1);
        assert_eq!(view.failure_reason.as_deref(), Some("analysis timed out"));
    }

    #[test]
    fn overview_lists_every_package_oldest_first() {
        let store = InMemoryPackageStore::arc();
        let projector = StatusProjector::new(store.clone());

        let a = store.create(vec!["a".to_string()]).unwrap();
        let b = store.create(vec!["b".to_string()]).unwrap();
        store
            .apply(
                b.id,
                PackageState::Scanning,
                PackageMutation::BeginProcessing {
                    ocr_text: "text".to_string(),
                    ocr_ref: "blob".to_string(),
                },
            )
            .unwrap();
        store
            .apply(
                b.id,
                PackageState::Processing,
                PackageMutation::RecordEnrichment(sample_enrichment("Acme")),
            )
            .unwrap();

        let views = projector.overview().unwrap();
        assert_eq!(views.len(), 2);
        assert_eq!(views[0].id, a.id.to_string());
        assert_eq!(views[1].display, DisplayState::ReadyForSurvey);
        assert!(views[1].actionable);
    }
}
