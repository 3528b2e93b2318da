//! Scan ingestion gateway.
//!
//! Front door of the workflow: accepts scanned images (plus optional OCR
//! text), uploads artifacts before touching the store, and hands finished
//! scans to the enrichment queue. Uploads happen first so a storage failure
//! leaves no package record behind.

use std::sync::Arc;

use tracing::{debug, info, warn};

use mailroom_core::{
    MailPackage, PackageId, PackageMutation, PackageState, WorkflowError, WorkflowResult,
};

use crate::queue::EnrichmentQueue;
use crate::store::PackageStore;
use crate::upload::{ArtifactUpload, UploadMetadata};

/// A single scanned image as received from the capture device.
#[derive(Debug, Clone)]
pub struct ScanImage {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

/// One ingestion request: a batch of page scans, optionally already OCR'd.
#[derive(Debug, Clone, Default)]
pub struct ScanSubmission {
    pub images: Vec<ScanImage>,
    /// When present, the scan is complete and goes straight to enrichment.
    pub ocr_text: Option<String>,
}

pub struct IngestionGateway {
    store: Arc<dyn PackageStore>,
    upload: Arc<dyn ArtifactUpload>,
    queue: Arc<EnrichmentQueue>,
}

impl IngestionGateway {
    pub fn new(
        store: Arc<dyn PackageStore>,
        upload: Arc<dyn ArtifactUpload>,
        queue: Arc<EnrichmentQueue>,
    ) -> Self {
        Self {
            store,
            upload,
            queue,
        }
    }

    /// Ingest a scan batch.
    ///
    /// With `package_id = None` a new package is created (at least one image
    /// required); otherwise the images are appended to an existing package
    /// still in [`PackageState::Scanning`]. All images are uploaded before
    /// any store write, so a failed upload aborts the whole submission.
    pub fn submit_scan(
        &self,
        package_id: Option<PackageId>,
        submission: ScanSubmission,
    ) -> WorkflowResult<MailPackage> {
        if package_id.is_none() && submission.images.is_empty() {
            return Err(WorkflowError::invalid_state(
                "a new package needs at least one scanned image",
            ));
        }

        let refs = self.upload_images(package_id, &submission.images)?;

        let package = match package_id {
            None => {
                let package = self.store.create(refs)?;
                info!(package_id = %package.id, images = package.images.len(), "package created");
                package
            }
            Some(id) if refs.is_empty() => self.store.get(id)?,
            Some(id) => {
                let package = self
                    .store
                    .apply(id, PackageState::Scanning, PackageMutation::AppendImages(refs))
                    .map_err(|e| match e {
                        WorkflowError::PreconditionFailed { actual, .. } => {
                            WorkflowError::invalid_state(format!(
                                "cannot append scans to a package in {actual:?}"
                            ))
                        }
                        other => other,
                    })?;
                debug!(package_id = %id, images = package.images.len(), "scans appended");
                package
            }
        };

        match submission.ocr_text {
            Some(text) => self.finalize_scan(package.id, text),
            None => Ok(package),
        }
    }

    /// Finish scanning: store the OCR text as an artifact, move the package
    /// to [`PackageState::Processing`], and enqueue enrichment.
    ///
    /// Idempotent: calling again after the package left `Scanning` returns
    /// the current record without uploading or enqueueing anything.
    pub fn finalize_scan(&self, id: PackageId, ocr_text: String) -> WorkflowResult<MailPackage> {
        let package = self.store.get(id)?;
        if package.state != PackageState::Scanning {
            debug!(package_id = %id, state = ?package.state, "finalize is a no-op, package already advanced");
            return Ok(package);
        }

        let ocr_ref = self.upload.store(
            ocr_text.as_bytes(),
            "text/plain",
            &UploadMetadata {
                package_hint: Some(id.to_string()),
                filename: Some("ocr.txt".to_string()),
            },
        )?;

        let package = match self.store.apply(
            id,
            PackageState::Scanning,
            PackageMutation::BeginProcessing {
                ocr_text: ocr_text.clone(),
                ocr_ref,
            },
        ) {
            Ok(package) => package,
            // A concurrent finalize won; its outcome stands.
            Err(WorkflowError::PreconditionFailed { .. }) => return self.store.get(id),
            Err(e) => return Err(e),
        };

        match self.queue.enqueue(id, ocr_text) {
            Ok(job_id) => {
                info!(package_id = %id, job_id = %job_id, "enrichment job enqueued")
            }
            Err(WorkflowError::DuplicateJob(_)) => {
                debug!(package_id = %id, "enrichment already in progress")
            }
            Err(e) => warn!(package_id = %id, error = %e, "failed to enqueue enrichment"),
        }

        Ok(package)
    }

    fn upload_images(
        &self,
        package_id: Option<PackageId>,
        images: &[ScanImage],
    ) -> WorkflowResult<Vec<String>> {
        images
            .iter()
            .enumerate()
            .map(|(i, img)| {
                self.upload.store(
                    &img.bytes,
                    &img.content_type,
                    &UploadMetadata {
                        package_hint: package_id.map(|id| id.to_string()),
                        filename: Some(format!("scan-{i}")),
                    },
                )
            })
            .collect()
    }

    /// User-requested reprocessing of a failed package. Clears the failed
    /// outcome and enqueues a fresh attempt with a full retry budget.
    pub fn retry_failed(&self, id: PackageId) -> WorkflowResult<MailPackage> {
        let package = self.store.get(id)?;
        if package.state != PackageState::Failed {
            return Err(WorkflowError::invalid_state(format!(
                "only failed packages can be retried, package is {:?}",
                package.state
            )));
        }
        let payload = package.ocr_text.clone().ok_or_else(|| {
            WorkflowError::invalid_state("failed package has no recognized text to reprocess")
        })?;

        let package = self
            .store
            .apply(id, PackageState::Failed, PackageMutation::Reprocess)?;

        match self.queue.enqueue(id, payload) {
            Ok(job_id) => {
                info!(package_id = %id, job_id = %job_id, "failed package requeued")
            }
            Err(WorkflowError::DuplicateJob(_)) => {
                debug!(package_id = %id, "enrichment already in progress")
            }
            Err(e) => warn!(package_id = %id, error = %e, "failed to requeue package"),
        }

        Ok(package)
    }
}
