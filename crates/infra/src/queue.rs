//! Enrichment work queue and retry policy.
//!
//! The queue is delay-aware: a job becomes eligible at its backoff deadline
//! and jobs are served in eligible-time order, ties broken by original
//! enqueue order. At most one outstanding (enqueued or in-flight) job may
//! exist per package id; that exclusivity slot is the workflow's only
//! mutex-like primitive and is held until the job resolves terminally.
//!
//! Jobs are ephemeral: on restart they are rebuilt from Processing-state
//! packages by the recovery scan, so nothing here is persisted.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};

use mailroom_core::{JobId, PackageId, WorkflowError, WorkflowResult};

/// Retry policy for transient enrichment failures.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum attempts per job (the first attempt counts).
    pub max_attempts: u32,
    /// Base backoff delay.
    pub base_delay: Duration,
    /// Backoff ceiling.
    pub max_delay: Duration,
    /// Jitter factor in [0, 1].
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(60),
            jitter: 0.1,
        }
    }
}

impl RetryPolicy {
    /// Whether a job that just failed its `attempt`-th attempt gets another.
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }

    /// Backoff after a failed attempt: `base * 2^(attempt-1)`, jittered,
    /// capped at `max_delay`.
    pub fn delay_after(&self, failed_attempt: u32) -> Duration {
        if failed_attempt == 0 {
            return Duration::ZERO;
        }

        let base_ms = self.base_delay.as_millis() as f64;
        let max_ms = self.max_delay.as_millis() as f64;
        let exp = 2_f64.powi((failed_attempt - 1) as i32);
        let delay_ms = (base_ms * exp).min(max_ms);

        // Deterministic pseudo-jitter keyed on the attempt number; enough to
        // de-synchronize herds without pulling in an RNG.
        let jitter_range = delay_ms * self.jitter;
        let jitter = if jitter_range > 0.0 {
            let pseudo_random = ((failed_attempt as f64 * 17.0) % 100.0) / 100.0;
            jitter_range * (pseudo_random - 0.5) * 2.0
        } else {
            0.0
        };

        Duration::from_millis((delay_ms + jitter).max(0.0) as u64)
    }
}

/// An enrichment job: ephemeral queue entry referencing a package.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichmentJob {
    pub id: JobId,
    pub package_id: PackageId,
    /// OCR snapshot taken at enqueue time. Immutable, so later artifact
    /// edits never reach an in-flight job.
    pub payload: String,
    /// 1-based attempt counter.
    pub attempt: u32,
    pub enqueued_at: DateTime<Utc>,
    /// Not served before this instant (backoff deadline).
    pub eligible_at: DateTime<Utc>,
    seq: u64,
}

#[derive(Debug, Default)]
struct QueueInner {
    pending: Vec<EnrichmentJob>,
    outstanding: HashSet<PackageId>,
    next_seq: u64,
}

/// Work queue with per-package mutual exclusion.
#[derive(Debug, Default)]
pub struct EnrichmentQueue {
    inner: Mutex<QueueInner>,
}

impl EnrichmentQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Enqueue a first attempt for a package.
    ///
    /// Fails [`WorkflowError::DuplicateJob`] while the package already has an
    /// outstanding job; the caller should await that result instead.
    pub fn enqueue(&self, package_id: PackageId, payload: String) -> WorkflowResult<JobId> {
        self.push(package_id, payload, 1, Duration::ZERO, true)
    }

    /// Seed a job for a package recovered at startup, continuing its attempt
    /// counter from persisted state.
    pub fn resume(
        &self,
        package_id: PackageId,
        payload: String,
        attempt: u32,
    ) -> WorkflowResult<JobId> {
        self.push(package_id, payload, attempt.max(1), Duration::ZERO, true)
    }

    /// Re-enqueue an in-flight job after a transient failure, with a backoff
    /// delay. Keeps the package's exclusivity slot, so this never observes
    /// `DuplicateJob`.
    pub fn retry(&self, job: &EnrichmentJob, delay: Duration) -> JobId {
        // The slot is already held; push cannot fail.
        self.push(job.package_id, job.payload.clone(), job.attempt + 1, delay, false)
            .unwrap_or(job.id)
    }

    fn push(
        &self,
        package_id: PackageId,
        payload: String,
        attempt: u32,
        delay: Duration,
        require_free: bool,
    ) -> WorkflowResult<JobId> {
        let mut inner = self.inner.lock().unwrap();

        let newly_claimed = inner.outstanding.insert(package_id);
        if require_free && !newly_claimed {
            return Err(WorkflowError::DuplicateJob(package_id));
        }

        let now = Utc::now();
        let eligible_at = now
            + chrono::Duration::from_std(delay).unwrap_or_else(|_| chrono::Duration::zero());
        let seq = inner.next_seq;
        inner.next_seq += 1;

        let job = EnrichmentJob {
            id: JobId::new(),
            package_id,
            payload,
            attempt,
            enqueued_at: now,
            eligible_at,
            seq,
        };
        let id = job.id;
        inner.pending.push(job);
        Ok(id)
    }

    /// Claim the next eligible job, if any. The claimed package stays
    /// outstanding until [`EnrichmentQueue::settle`] (or a retry).
    pub fn claim(&self) -> Option<EnrichmentJob> {
        let mut inner = self.inner.lock().unwrap();
        let now = Utc::now();

        let idx = inner
            .pending
            .iter()
            .enumerate()
            .filter(|(_, job)| job.eligible_at <= now)
            .min_by_key(|(_, job)| (job.eligible_at, job.seq))
            .map(|(idx, _)| idx)?;

        Some(inner.pending.remove(idx))
    }

    /// Release a package's exclusivity slot after terminal resolution of its
    /// job (success, permanent failure, or exhaustion).
    pub fn settle(&self, package_id: PackageId) {
        let mut inner = self.inner.lock().unwrap();
        inner.outstanding.remove(&package_id);
    }

    /// Whether the package has an enqueued-or-in-flight job.
    pub fn is_outstanding(&self, package_id: PackageId) -> bool {
        self.inner.lock().unwrap().outstanding.contains(&package_id)
    }

    /// Number of jobs waiting (eligible or backing off); excludes in-flight.
    pub fn pending_len(&self) -> usize {
        self.inner.lock().unwrap().pending.len()
    }
}
