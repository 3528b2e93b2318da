//! Startup recovery scan.
//!
//! Queue entries are ephemeral, so after a restart every package persisted in
//! `Processing` has lost its job. This scan rebuilds those jobs from the
//! store, continuing each package's attempt counter where it left off.

use tracing::{info, warn};

use mailroom_core::{PackageState, WorkflowResult};

use crate::queue::EnrichmentQueue;
use crate::store::PackageStore;

/// Requeue enrichment for every `Processing` package without an outstanding
/// job. Returns the number of jobs seeded.
pub fn requeue_orphaned(
    store: &dyn PackageStore,
    queue: &EnrichmentQueue,
) -> WorkflowResult<usize> {
    let mut seeded = 0;

    for package in store.list_by_state(PackageState::Processing)? {
        if queue.is_outstanding(package.id) {
            continue;
        }
        let Some(payload) = package.ocr_text.clone() else {
            warn!(package_id = %package.id, "processing package has no recognized text, skipping recovery");
            continue;
        };

        // Continue the persisted attempt counter rather than restarting it,
        // so a crash cannot grant unlimited retries.
        match queue.resume(package.id, payload, package.retry_count + 1) {
            Ok(_) => seeded += 1,
            Err(e) => {
                warn!(package_id = %package.id, error = %e, "failed to requeue orphaned package")
            }
        }
    }

    if seeded > 0 {
        info!(count = seeded, "requeued orphaned enrichment jobs");
    }
    Ok(seeded)
}
