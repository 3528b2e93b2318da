//! Shared test doubles for the workflow crates.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use mailroom_core::{Enrichment, UrgencyLevel, WorkflowError, WorkflowResult};
use mailroom_enrich::{AnalysisError, MailAnalyzer};

use crate::upload::{ArtifactUpload, StorageRef, UploadMetadata};

pub(crate) fn sample_enrichment(brand: &str) -> Enrichment {
    Enrichment {
        industry: "Retail".to_string(),
        brand_name: brand.to_string(),
        primary_offer: "20% off storewide".to_string(),
        response_intention: "visit store".to_string(),
        name_check: true,
        urgency_level: UrgencyLevel::Medium,
        estimated_value: Some(25.0),
    }
}

/// Analyzer that plays back a scripted sequence of outcomes, then falls back
/// to a fixed success.
pub(crate) struct ScriptedAnalyzer {
    script: Mutex<VecDeque<Result<Enrichment, AnalysisError>>>,
    calls: AtomicUsize,
}

impl ScriptedAnalyzer {
    pub(crate) fn new(script: Vec<Result<Enrichment, AnalysisError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl MailAnalyzer for ScriptedAnalyzer {
    fn analyze(&self, _text: &str) -> Result<Enrichment, AnalysisError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(sample_enrichment("fallback")))
    }
}

/// Analyzer that sleeps when it sees a marker payload, so tests can force
/// one package to finish after another.
pub(crate) struct DelayedAnalyzer {
    pub(crate) slow_payload: String,
    pub(crate) delay: Duration,
}

impl MailAnalyzer for DelayedAnalyzer {
    fn analyze(&self, text: &str) -> Result<Enrichment, AnalysisError> {
        if text == self.slow_payload {
            std::thread::sleep(self.delay);
        }
        Ok(sample_enrichment(text))
    }
}

/// Upload sink that refuses everything.
pub(crate) struct FailingUpload;

impl ArtifactUpload for FailingUpload {
    fn store(
        &self,
        _bytes: &[u8],
        _content_type: &str,
        _metadata: &UploadMetadata,
    ) -> WorkflowResult<StorageRef> {
        Err(WorkflowError::upload_failed("object store unavailable"))
    }
}
