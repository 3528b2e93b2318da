//! `mailroom-infra` — storage, queue, workers, and gateways.
//!
//! Wires the pure domain (mailroom-core) to its collaborators: durable
//! package storage, the enrichment work queue and worker pool, the ingestion
//! and survey gateways, the status read view, and the startup recovery scan.

pub mod ingest;
pub mod queue;
pub mod recovery;
pub mod status;
pub mod store;
pub mod survey;
pub mod upload;
pub mod worker;

#[cfg(test)]
pub(crate) mod testing;

pub use ingest::{IngestionGateway, ScanImage, ScanSubmission};
pub use queue::{EnrichmentJob, EnrichmentQueue, RetryPolicy};
pub use recovery::requeue_orphaned;
pub use status::{PackageStatusView, StatusProjector};
pub use store::{InMemoryPackageStore, PackageStore, SqlitePackageStore};
pub use survey::{SurveyAnswers, SurveyGateway};
pub use upload::{ArtifactUpload, InMemoryUpload, StorageRef, UploadMetadata};
pub use worker::{WorkerConfig, WorkerPool, WorkerPoolHandle, run_once};
