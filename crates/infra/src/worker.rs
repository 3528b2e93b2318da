//! Enrichment worker pool.
//!
//! Workers poll the shared queue, call the analysis collaborator, and apply
//! the outcome to the package store with conditional writes. Per-package
//! exclusivity comes from the queue; workers hold no locks across the
//! analysis call, so N workers drain the queue concurrently and packages
//! finish in whatever order the collaborator allows.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use tracing::{debug, info, warn};

use mailroom_core::{PackageMutation, PackageState, WorkflowError};
use mailroom_enrich::MailAnalyzer;

use crate::queue::{EnrichmentJob, EnrichmentQueue, RetryPolicy};
use crate::store::PackageStore;

/// Worker pool configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Number of worker threads.
    pub workers: usize,
    /// How often an idle worker re-polls the queue.
    pub poll_interval: Duration,
    /// Name prefix for worker threads (and logs).
    pub name: String,
    pub retry: RetryPolicy,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            workers: 2,
            poll_interval: Duration::from_millis(100),
            name: "enrichment-worker".to_string(),
            retry: RetryPolicy::default(),
        }
    }
}

/// Handle to control a running pool.
#[derive(Debug)]
pub struct WorkerPoolHandle {
    stop: Arc<AtomicBool>,
    joins: Vec<thread::JoinHandle<()>>,
}

impl WorkerPoolHandle {
    /// Request graceful shutdown and wait for every worker to stop.
    pub fn shutdown(mut self) {
        self.stop.store(true, Ordering::Relaxed);
        for join in self.joins.drain(..) {
            let _ = join.join();
        }
    }
}

/// Pool of enrichment workers over a shared queue and store.
pub struct WorkerPool {
    store: Arc<dyn PackageStore>,
    queue: Arc<EnrichmentQueue>,
    analyzer: Arc<dyn MailAnalyzer>,
}

impl WorkerPool {
    pub fn new(
        store: Arc<dyn PackageStore>,
        queue: Arc<EnrichmentQueue>,
        analyzer: Arc<dyn MailAnalyzer>,
    ) -> Self {
        Self {
            store,
            queue,
            analyzer,
        }
    }

    /// Spawn the configured number of worker threads.
    pub fn spawn(self, config: WorkerConfig) -> WorkerPoolHandle {
        let stop = Arc::new(AtomicBool::new(false));
        let workers = config.workers.max(1);

        let joins = (0..workers)
            .map(|i| {
                let store = self.store.clone();
                let queue = self.queue.clone();
                let analyzer = self.analyzer.clone();
                let retry = config.retry.clone();
                let stop = stop.clone();
                let poll_interval = config.poll_interval;
                let name = format!("{}-{i}", config.name);

                thread::Builder::new()
                    .name(name)
                    .spawn(move || {
                        worker_loop(&*store, &queue, &*analyzer, &retry, &stop, poll_interval)
                    })
                    .expect("failed to spawn enrichment worker thread")
            })
            .collect();

        WorkerPoolHandle { stop, joins }
    }
}

fn worker_loop(
    store: &dyn PackageStore,
    queue: &EnrichmentQueue,
    analyzer: &dyn MailAnalyzer,
    retry: &RetryPolicy,
    stop: &AtomicBool,
    poll_interval: Duration,
) {
    info!("enrichment worker started");

    while !stop.load(Ordering::Relaxed) {
        if !run_once(store, queue, analyzer, retry) {
            thread::sleep(poll_interval);
        }
    }

    info!("enrichment worker stopped");
}

/// Process at most one job. Returns `false` when nothing was eligible.
///
/// Split out of the loop so tests (and embedders without a pool) can drive
/// the worker deterministically.
pub fn run_once(
    store: &dyn PackageStore,
    queue: &EnrichmentQueue,
    analyzer: &dyn MailAnalyzer,
    retry: &RetryPolicy,
) -> bool {
    let Some(job) = queue.claim() else {
        return false;
    };
    process(store, queue, analyzer, retry, job);
    true
}

fn process(
    store: &dyn PackageStore,
    queue: &EnrichmentQueue,
    analyzer: &dyn MailAnalyzer,
    retry: &RetryPolicy,
    job: EnrichmentJob,
) {
    debug!(package_id = %job.package_id, attempt = job.attempt, "claimed enrichment job");

    match analyzer.analyze(&job.payload) {
        Ok(enrichment) => {
            match store.apply(
                job.package_id,
                PackageState::Processing,
                PackageMutation::RecordEnrichment(enrichment),
            ) {
                Ok(_) => {
                    debug!(package_id = %job.package_id, attempt = job.attempt, "enrichment recorded")
                }
                // The package moved on underneath us; drop the result whole.
                Err(WorkflowError::PreconditionFailed { .. }) | Err(WorkflowError::NotFound(_)) => {
                    debug!(package_id = %job.package_id, "discarding enrichment result, package state advanced")
                }
                Err(e) => {
                    warn!(package_id = %job.package_id, error = %e, "failed to record enrichment")
                }
            }
            queue.settle(job.package_id);
        }
        Err(e) if !e.is_permanent() && retry.should_retry(job.attempt) => {
            if let Err(store_err) = store.apply(
                job.package_id,
                PackageState::Processing,
                PackageMutation::IncrementRetry,
            ) {
                warn!(package_id = %job.package_id, error = %store_err, "failed to count retry");
            }

            let delay = retry.delay_after(job.attempt);
            warn!(
                package_id = %job.package_id,
                attempt = job.attempt,
                delay_ms = delay.as_millis() as u64,
                error = %e,
                "transient enrichment failure, retry scheduled"
            );
            queue.retry(&job, delay);
        }
        Err(e) => {
            // Permanent rejection, or the retry budget is spent.
            warn!(
                package_id = %job.package_id,
                attempt = job.attempt,
                error = %e,
                "enrichment failed permanently"
            );
            match store.apply(
                job.package_id,
                PackageState::Processing,
                PackageMutation::MarkFailed {
                    reason: e.to_string(),
                },
            ) {
                Ok(_) => {}
                Err(WorkflowError::PreconditionFailed { .. }) | Err(WorkflowError::NotFound(_)) => {
                    debug!(package_id = %job.package_id, "package no longer processing, dropping failure")
                }
                Err(store_err) => {
                    warn!(package_id = %job.package_id, error = %store_err, "failed to mark package failed")
                }
            }
            queue.settle(job.package_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mailroom_core::PackageState;
    use mailroom_enrich::AnalysisError;

    use crate::store::InMemoryPackageStore;
    use crate::testing::{ScriptedAnalyzer, sample_enrichment};

    fn processing_package(store: &InMemoryPackageStore, queue: &EnrichmentQueue) -> mailroom_core::PackageId {
        let pkg = store.create(vec!["img-1".to_string()]).unwrap();
        store
            .apply(
                pkg.id,
                PackageState::Scanning,
                PackageMutation::BeginProcessing {
                    ocr_text: "Dear customer".to_string(),
                    ocr_ref: "blob-ocr".to_string(),
                },
            )
            .unwrap();
        queue.enqueue(pkg.id, "Dear customer".to_string()).unwrap();
        pkg.id
    }

    #[test]
    fn success_records_enrichment_and_settles() {
        let store = InMemoryPackageStore::new();
        let queue = EnrichmentQueue::new();
        let analyzer = ScriptedAnalyzer::new(vec![Ok(sample_enrichment("Acme"))]);
        let retry = RetryPolicy::default();

        let id = processing_package(&store, &queue);
        assert!(run_once(&store, &queue, &analyzer, &retry));

        let pkg = store.get(id).unwrap();
        assert_eq!(pkg.state, PackageState::ReadyForSurvey);
        assert_eq!(pkg.enrichment.unwrap().brand_name, "Acme");
        assert_eq!(pkg.retry_count, 0);
        assert!(!queue.is_outstanding(id));
    }

    #[test]
    fn transient_failures_retry_then_succeed() {
        let store = InMemoryPackageStore::new();
        let queue = EnrichmentQueue::new();
        let analyzer = ScriptedAnalyzer::new(vec![
            Err(AnalysisError::Timeout),
            Err(AnalysisError::Timeout),
            Ok(sample_enrichment("Third Time")),
        ]);
        // Zero backoff keeps the retried jobs immediately eligible.
        let retry = RetryPolicy {
            base_delay: Duration::ZERO,
            ..RetryPolicy::default()
        };

        let id = processing_package(&store, &queue);
        assert!(run_once(&store, &queue, &analyzer, &retry));
        assert!(run_once(&store, &queue, &analyzer, &retry));
        assert!(run_once(&store, &queue, &analyzer, &retry));
        assert!(!run_once(&store, &queue, &analyzer, &retry));

        let pkg = store.get(id).unwrap();
        assert_eq!(pkg.state, PackageState::ReadyForSurvey);
        assert_eq!(pkg.retry_count, 2);
        assert_eq!(pkg.enrichment.unwrap().brand_name, "Third Time");
        assert_eq!(analyzer.call_count(), 3);
    }

    #[test]
    fn exhausted_budget_fails_package() {
        let store = InMemoryPackageStore::new();
        let queue = EnrichmentQueue::new();
        let analyzer = ScriptedAnalyzer::new(vec![
            Err(AnalysisError::Timeout),
            Err(AnalysisError::Transport("connection reset".to_string())),
            Err(AnalysisError::Timeout),
        ]);
        let retry = RetryPolicy {
            base_delay: Duration::ZERO,
            ..RetryPolicy::default()
        };

        let id = processing_package(&store, &queue);
        for _ in 0..3 {
            assert!(run_once(&store, &queue, &analyzer, &retry));
        }

        let pkg = store.get(id).unwrap();
        assert_eq!(pkg.state, PackageState::Failed);
        assert_eq!(pkg.retry_count, retry.max_attempts);
        assert!(pkg.failure.unwrap().reason.contains("timed out"));
        assert!(!queue.is_outstanding(id));
        assert!(!run_once(&store, &queue, &analyzer, &retry));
    }

    #[test]
    fn rejection_fails_without_retry() {
        let store = InMemoryPackageStore::new();
        let queue = EnrichmentQueue::new();
        let analyzer =
            ScriptedAnalyzer::new(vec![Err(AnalysisError::Rejected("gibberish input".to_string()))]);
        let retry = RetryPolicy::default();

        let id = processing_package(&store, &queue);
        assert!(run_once(&store, &queue, &analyzer, &retry));

        let pkg = store.get(id).unwrap();
        assert_eq!(pkg.state, PackageState::Failed);
        assert_eq!(pkg.retry_count, 1);
        assert_eq!(analyzer.call_count(), 1);
        assert!(!queue.is_outstanding(id));
    }

    #[test]
    fn stale_result_is_discarded_silently() {
        let store = InMemoryPackageStore::new();
        let queue = EnrichmentQueue::new();
        let analyzer = ScriptedAnalyzer::new(vec![Ok(sample_enrichment("Late"))]);
        let retry = RetryPolicy::default();

        let id = processing_package(&store, &queue);
        // Another writer wins the race while the job is in flight.
        store
            .apply(
                id,
                PackageState::Processing,
                PackageMutation::RecordEnrichment(sample_enrichment("First")),
            )
            .unwrap();

        assert!(run_once(&store, &queue, &analyzer, &retry));

        let pkg = store.get(id).unwrap();
        assert_eq!(pkg.state, PackageState::ReadyForSurvey);
        // The first result stands; the worker's late one was dropped.
        assert_eq!(pkg.enrichment.unwrap().brand_name, "First");
        assert!(!queue.is_outstanding(id));
    }
}
