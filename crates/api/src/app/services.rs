//! Infrastructure wiring for the HTTP app.
//!
//! Builds the store, queue, analyzer, worker pool, and gateways from
//! environment configuration. Construction is synchronous on purpose: the
//! SQLite store and the HTTP analyzer both own blocking machinery that must
//! not be created inside an async context, so `main` wires everything up
//! before it starts the server runtime.

use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::{info, warn};

use mailroom_enrich::{HttpAnalyzer, HttpAnalyzerConfig, MailAnalyzer};
use mailroom_infra::{
    EnrichmentQueue, IngestionGateway, InMemoryPackageStore, InMemoryUpload, PackageStore,
    RetryPolicy, SqlitePackageStore, StatusProjector, SurveyGateway, WorkerConfig, WorkerPool,
    WorkerPoolHandle, requeue_orphaned,
};

/// Environment-driven configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Listen address.
    pub addr: String,
    /// SQLite database path; in-memory store when unset.
    pub db_path: Option<String>,
    pub workers: usize,
    pub analyzer_url: String,
    pub analyzer_timeout: Duration,
    pub max_attempts: u32,
    pub backoff_base: Duration,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let defaults = HttpAnalyzerConfig::default();
        Self {
            addr: std::env::var("MAILROOM_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string()),
            db_path: std::env::var("MAILROOM_DB").ok(),
            workers: env_parse("MAILROOM_WORKERS", 2),
            analyzer_url: std::env::var("MAILROOM_ANALYZER_URL")
                .unwrap_or(defaults.endpoint),
            analyzer_timeout: Duration::from_secs(env_parse(
                "MAILROOM_ANALYZER_TIMEOUT_SECS",
                defaults.timeout.as_secs(),
            )),
            max_attempts: env_parse("MAILROOM_MAX_ATTEMPTS", 3),
            backoff_base: Duration::from_millis(env_parse("MAILROOM_BACKOFF_BASE_MS", 500)),
        }
    }

    fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            base_delay: self.backoff_base,
            ..RetryPolicy::default()
        }
    }
}

fn env_parse<T: FromStr + Copy>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            warn!(key, raw, "unparseable value, using default");
            default
        }),
        Err(_) => default,
    }
}

/// Everything the handlers need, behind one `Arc`.
pub struct AppServices {
    pub store: Arc<dyn PackageStore>,
    pub ingestion: IngestionGateway,
    pub survey: SurveyGateway,
    pub projector: StatusProjector,
    workers: Mutex<Option<WorkerPoolHandle>>,
}

impl AppServices {
    /// Stop the worker pool and wait for in-flight jobs to finish.
    pub fn shutdown(&self) {
        if let Some(handle) = self.workers.lock().unwrap().take() {
            handle.shutdown();
        }
    }
}

/// Wire the full service graph and start the enrichment workers.
pub fn build_services(config: &AppConfig) -> anyhow::Result<AppServices> {
    let store: Arc<dyn PackageStore> = match &config.db_path {
        Some(path) => {
            info!(path, "using sqlite package store");
            Arc::new(SqlitePackageStore::open(path)?)
        }
        None => {
            warn!("MAILROOM_DB not set; package records will not survive a restart");
            InMemoryPackageStore::arc()
        }
    };

    // Artifact bytes stay in process memory until an object store backend
    // is configured.
    let upload = InMemoryUpload::arc();

    let queue = EnrichmentQueue::arc();
    let analyzer: Arc<dyn MailAnalyzer> = Arc::new(HttpAnalyzer::new(HttpAnalyzerConfig {
        endpoint: config.analyzer_url.clone(),
        timeout: config.analyzer_timeout,
    })?);

    // Rebuild jobs for packages that were mid-enrichment when the previous
    // process stopped, before any worker starts claiming.
    requeue_orphaned(&*store, &queue)?;

    let handle = WorkerPool::new(store.clone(), queue.clone(), analyzer).spawn(WorkerConfig {
        workers: config.workers,
        retry: config.retry_policy(),
        ..WorkerConfig::default()
    });

    Ok(AppServices {
        store: store.clone(),
        ingestion: IngestionGateway::new(store.clone(), upload, queue),
        survey: SurveyGateway::new(store.clone()),
        projector: StatusProjector::new(store),
        workers: Mutex::new(Some(handle)),
    })
}
