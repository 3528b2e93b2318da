//! The mail package entity and its state machine.
//!
//! Every mutation goes through [`PackageMutation`], applied by the entity
//! itself, so all storage backends share one transition-validation path.
//! The state graph is strictly forward:
//!
//! ```text
//! Scanning -> Processing -> ReadyForSurvey -> SurveyComplete
//!                 |  ^
//!                 v  |
//!               Failed
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{WorkflowError, WorkflowResult};
use crate::id::PackageId;

/// Lifecycle state of a mail package.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PackageState {
    /// The user is still capturing scans; artifacts are append-only.
    Scanning,
    /// Artifacts are frozen; an enrichment job is pending or in flight.
    Processing,
    /// Enrichment succeeded; waiting on the user's survey.
    ReadyForSurvey,
    /// Survey recorded. Terminal.
    SurveyComplete,
    /// Enrichment exhausted its retry budget or was rejected; user-actionable.
    Failed,
}

impl PackageState {
    pub fn is_terminal(self) -> bool {
        matches!(self, PackageState::SurveyComplete)
    }

    /// Whether the directed state graph has an edge `self -> next`.
    pub fn can_advance_to(self, next: PackageState) -> bool {
        matches!(
            (self, next),
            (PackageState::Scanning, PackageState::Processing)
                | (PackageState::Processing, PackageState::ReadyForSurvey)
                | (PackageState::ReadyForSurvey, PackageState::SurveyComplete)
                | (PackageState::Processing, PackageState::Failed)
                | (PackageState::Failed, PackageState::Processing)
        )
    }

    /// Stable textual form, used as the storage column value.
    pub fn as_str(self) -> &'static str {
        match self {
            PackageState::Scanning => "scanning",
            PackageState::Processing => "processing",
            PackageState::ReadyForSurvey => "ready_for_survey",
            PackageState::SurveyComplete => "survey_complete",
            PackageState::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "scanning" => Some(PackageState::Scanning),
            "processing" => Some(PackageState::Processing),
            "ready_for_survey" => Some(PackageState::ReadyForSurvey),
            "survey_complete" => Some(PackageState::SurveyComplete),
            "failed" => Some(PackageState::Failed),
            _ => None,
        }
    }
}

/// Urgency derived by the analysis collaborator.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UrgencyLevel {
    Low,
    Medium,
    High,
}

/// Result of the AI text-analysis step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Enrichment {
    pub industry: String,
    pub brand_name: String,
    pub primary_offer: String,
    /// Suggested handling ("respond", "archive", "unsubscribe", ...).
    pub response_intention: String,
    /// Whether the mail is addressed to the account holder's own name.
    pub name_check: bool,
    pub urgency_level: UrgencyLevel,
    /// Estimated monetary value of the offer, when one could be derived.
    pub estimated_value: Option<f64>,
}

/// User-confirmed (possibly edited) enrichment fields plus the approval flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurveyResult {
    pub confirmed: Enrichment,
    pub approved: bool,
    pub notes: Option<String>,
    pub submitted_at: DateTime<Utc>,
}

/// Why a package ended up in `Failed`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureInfo {
    pub reason: String,
    pub failed_at: DateTime<Utc>,
}

/// The central entity: one physical mail item being documented by a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MailPackage {
    pub id: PackageId,
    pub state: PackageState,
    /// Storage references of scanned images, in capture order. Append-only
    /// during `Scanning`, frozen thereafter.
    pub images: Vec<String>,
    /// Combined OCR text, set when scanning is finalized.
    pub ocr_text: Option<String>,
    /// Storage reference of the uploaded OCR blob.
    pub ocr_ref: Option<String>,
    pub enrichment: Option<Enrichment>,
    pub survey: Option<SurveyResult>,
    /// Total failed enrichment attempts. Monotonic, kept for audit; never
    /// reset, not even by reprocess.
    pub retry_count: u32,
    pub failure: Option<FailureInfo>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A state-conditional mutation of a [`MailPackage`].
#[derive(Debug, Clone, PartialEq)]
pub enum PackageMutation {
    /// Append more scan references. Requires `Scanning`.
    AppendImages(Vec<String>),
    /// Freeze artifacts and move to `Processing`. Requires `Scanning` and a
    /// non-empty image list; both uploads must already be confirmed.
    BeginProcessing { ocr_text: String, ocr_ref: String },
    /// Record the analysis result and move to `ReadyForSurvey`. Requires
    /// `Processing`.
    RecordEnrichment(Enrichment),
    /// Record the survey and move to `SurveyComplete`. Requires
    /// `ReadyForSurvey`.
    RecordSurvey(SurveyResult),
    /// Count a failed enrichment attempt that will be retried. Requires
    /// `Processing`.
    IncrementRetry,
    /// Count a final failed attempt and move to `Failed`. Requires
    /// `Processing`.
    MarkFailed { reason: String },
    /// User-triggered recovery: clear results and move back to `Processing`.
    /// Requires `Failed`.
    Reprocess,
}

impl MailPackage {
    /// Create a fresh package in `Scanning` with the given image refs.
    pub fn new(images: Vec<String>) -> Self {
        let now = Utc::now();
        Self {
            id: PackageId::new(),
            state: PackageState::Scanning,
            images,
            ocr_text: None,
            ocr_ref: None,
            enrichment: None,
            survey: None,
            retry_count: 0,
            failure: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply a mutation, validating the state transition it implies.
    ///
    /// On success `updated_at` is refreshed. On error the package is
    /// untouched.
    pub fn apply(&mut self, mutation: PackageMutation) -> WorkflowResult<()> {
        match mutation {
            PackageMutation::AppendImages(refs) => {
                self.require(PackageState::Scanning, "append scans")?;
                self.images.extend(refs);
            }
            PackageMutation::BeginProcessing { ocr_text, ocr_ref } => {
                self.require(PackageState::Scanning, "finalize scan")?;
                if self.images.is_empty() {
                    return Err(WorkflowError::invalid_state(
                        "cannot finalize a package without scanned images",
                    ));
                }
                self.ocr_text = Some(ocr_text);
                self.ocr_ref = Some(ocr_ref);
                self.state = PackageState::Processing;
            }
            PackageMutation::RecordEnrichment(enrichment) => {
                self.require(PackageState::Processing, "record enrichment")?;
                self.enrichment = Some(enrichment);
                self.state = PackageState::ReadyForSurvey;
            }
            PackageMutation::RecordSurvey(survey) => {
                self.require(PackageState::ReadyForSurvey, "record survey")?;
                self.survey = Some(survey);
                self.state = PackageState::SurveyComplete;
            }
            PackageMutation::IncrementRetry => {
                self.require(PackageState::Processing, "count retry")?;
                self.retry_count += 1;
            }
            PackageMutation::MarkFailed { reason } => {
                self.require(PackageState::Processing, "mark failed")?;
                self.retry_count += 1;
                self.failure = Some(FailureInfo {
                    reason,
                    failed_at: Utc::now(),
                });
                self.state = PackageState::Failed;
            }
            PackageMutation::Reprocess => {
                self.require(PackageState::Failed, "reprocess")?;
                self.enrichment = None;
                self.survey = None;
                self.failure = None;
                self.state = PackageState::Processing;
            }
        }
        self.updated_at = Utc::now();
        Ok(())
    }

    fn require(&self, expected: PackageState, action: &str) -> WorkflowResult<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(WorkflowError::invalid_state(format!(
                "cannot {action}: package is {:?}, requires {expected:?}",
                self.state
            )))
        }
    }
}
