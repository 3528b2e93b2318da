//! User-gated survey completion.
//!
//! The survey is the only transition a user drives directly. It is gated on
//! the package being [`PackageState::ReadyForSurvey`]; everything earlier is
//! "not ready", a second submission is "already complete".

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

use mailroom_core::{
    Enrichment, MailPackage, PackageId, PackageMutation, PackageState, SurveyResult,
    WorkflowError, WorkflowResult,
};

use crate::store::PackageStore;

/// Survey answers as submitted by the user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurveyAnswers {
    /// The enrichment as the user confirmed or corrected it.
    pub confirmed: Enrichment,
    /// Whether the user signs off on the package overall.
    pub approved: bool,
    #[serde(default)]
    pub notes: Option<String>,
}

pub struct SurveyGateway {
    store: Arc<dyn PackageStore>,
}

impl SurveyGateway {
    pub fn new(store: Arc<dyn PackageStore>) -> Self {
        Self { store }
    }

    /// Record the user's survey and complete the package.
    pub fn submit_survey(
        &self,
        id: PackageId,
        answers: SurveyAnswers,
    ) -> WorkflowResult<MailPackage> {
        let package = self.store.get(id)?;
        match package.state {
            PackageState::ReadyForSurvey => {}
            PackageState::SurveyComplete => return Err(WorkflowError::AlreadyComplete),
            state => return Err(WorkflowError::NotReady(state)),
        }

        let result = SurveyResult {
            confirmed: answers.confirmed,
            approved: answers.approved,
            notes: answers.notes,
            submitted_at: Utc::now(),
        };

        let package = self
            .store
            .apply(
                id,
                PackageState::ReadyForSurvey,
                PackageMutation::RecordSurvey(result),
            )
            .map_err(|e| match e {
                // Lost a race against another submission.
                WorkflowError::PreconditionFailed {
                    actual: PackageState::SurveyComplete,
                    ..
                } => WorkflowError::AlreadyComplete,
                WorkflowError::PreconditionFailed { actual, .. } => {
                    WorkflowError::NotReady(actual)
                }
                other => other,
            })?;

        info!(package_id = %id, approved = package.survey.as_ref().is_some_and(|s| s.approved), "survey recorded");
        Ok(package)
    }
}
