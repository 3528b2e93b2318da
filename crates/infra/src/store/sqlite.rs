//! SQLite-backed store.
//!
//! One row per package: the full record serialized as JSON, plus `state` and
//! `updated_at` columns the optimistic update predicates on. The pool is
//! driven by an owned runtime so the store keeps the synchronous
//! `PackageStore` contract.

use std::future::Future;
use std::sync::Arc;

use anyhow::Context;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};
use tokio::runtime::Runtime;

use mailroom_core::{
    MailPackage, PackageId, PackageMutation, PackageState, WorkflowError, WorkflowResult,
};

use super::PackageStore;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS packages (
    id         TEXT PRIMARY KEY,
    state      TEXT NOT NULL,
    record     TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
)
"#;

const STATE_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_packages_state ON packages(state)";

pub struct SqlitePackageStore {
    pool: SqlitePool,
    runtime: Arc<Runtime>,
}

impl SqlitePackageStore {
    /// Open (and bootstrap) a store at `path`. `sqlite:`-prefixed URLs are
    /// passed through; plain paths are wrapped with `mode=rwc`.
    pub fn open(path: &str) -> anyhow::Result<Self> {
        let runtime = Runtime::new().context("failed to start store runtime")?;

        let url = if path.starts_with("sqlite:") {
            path.to_string()
        } else {
            format!("sqlite://{path}?mode=rwc")
        };

        let pool = runtime
            .block_on(async {
                // A single connection keeps `sqlite::memory:` databases from
                // fragmenting across the pool.
                let pool = SqlitePoolOptions::new()
                    .max_connections(1)
                    .connect(&url)
                    .await?;
                sqlx::query(SCHEMA).execute(&pool).await?;
                sqlx::query(STATE_INDEX).execute(&pool).await?;
                Ok::<_, sqlx::Error>(pool)
            })
            .with_context(|| format!("failed to open package store at {url}"))?;

        Ok(Self {
            pool,
            runtime: Arc::new(runtime),
        })
    }

    /// Ephemeral store backed by an in-memory SQLite database.
    pub fn in_memory() -> anyhow::Result<Self> {
        Self::open("sqlite::memory:")
    }

    fn block_on<F: Future>(&self, fut: F) -> F::Output {
        self.runtime.block_on(fut)
    }

    fn decode(record: &str) -> WorkflowResult<MailPackage> {
        serde_json::from_str(record)
            .map_err(|e| WorkflowError::storage(format!("corrupt package record: {e}")))
    }
}

impl PackageStore for SqlitePackageStore {
    fn create(&self, images: Vec<String>) -> WorkflowResult<MailPackage> {
        let package = MailPackage::new(images);
        let record = serde_json::to_string(&package)
            .map_err(|e| WorkflowError::storage(e.to_string()))?;

        self.block_on(async {
            sqlx::query(
                "INSERT INTO packages (id, state, record, created_at, updated_at) \
                 VALUES (?, ?, ?, ?, ?)",
            )
            .bind(package.id.to_string())
            .bind(package.state.as_str())
            .bind(&record)
            .bind(package.created_at.to_rfc3339())
            .bind(package.updated_at.to_rfc3339())
            .execute(&self.pool)
            .await
        })
        .map_err(|e| WorkflowError::storage(e.to_string()))?;

        Ok(package)
    }

    fn get(&self, id: PackageId) -> WorkflowResult<MailPackage> {
        let row = self
            .block_on(async {
                sqlx::query("SELECT record FROM packages WHERE id = ?")
                    .bind(id.to_string())
                    .fetch_optional(&self.pool)
                    .await
            })
            .map_err(|e| WorkflowError::storage(e.to_string()))?;

        match row {
            Some(row) => Self::decode(row.get::<String, _>("record").as_str()),
            None => Err(WorkflowError::NotFound(id)),
        }
    }

    fn apply(
        &self,
        id: PackageId,
        expected: PackageState,
        mutation: PackageMutation,
    ) -> WorkflowResult<MailPackage> {
        // Compare-and-swap loop. The UPDATE predicates on the exact record
        // version that was read (via `updated_at`), not just the state, so
        // two same-state writers cannot silently overwrite each other; the
        // loser re-reads and retries while the state precondition still
        // holds.
        loop {
            let mut package = self.get(id)?;
            if package.state != expected {
                return Err(WorkflowError::PreconditionFailed {
                    expected,
                    actual: package.state,
                });
            }
            let read_version = package.updated_at.to_rfc3339();
            package.apply(mutation.clone())?;

            let record = serde_json::to_string(&package)
                .map_err(|e| WorkflowError::storage(e.to_string()))?;

            let result = self
                .block_on(async {
                    sqlx::query(
                        "UPDATE packages SET state = ?, record = ?, updated_at = ? \
                         WHERE id = ? AND state = ? AND updated_at = ?",
                    )
                    .bind(package.state.as_str())
                    .bind(&record)
                    .bind(package.updated_at.to_rfc3339())
                    .bind(id.to_string())
                    .bind(expected.as_str())
                    .bind(&read_version)
                    .execute(&self.pool)
                    .await
                })
                .map_err(|e| WorkflowError::storage(e.to_string()))?;

            if result.rows_affected() > 0 {
                return Ok(package);
            }
            // Lost the race between read and write; the next iteration
            // re-reads and fails with PreconditionFailed if the state moved.
        }
    }

    fn list_by_state(&self, state: PackageState) -> WorkflowResult<Vec<MailPackage>> {
        let rows = self
            .block_on(async {
                sqlx::query(
                    "SELECT record FROM packages WHERE state = ? ORDER BY created_at",
                )
                .bind(state.as_str())
                .fetch_all(&self.pool)
                .await
            })
            .map_err(|e| WorkflowError::storage(e.to_string()))?;

        rows.iter()
            .map(|row| Self::decode(row.get::<String, _>("record").as_str()))
            .collect()
    }

    fn list(&self) -> WorkflowResult<Vec<MailPackage>> {
        let rows = self
            .block_on(async {
                sqlx::query("SELECT record FROM packages ORDER BY created_at")
                    .fetch_all(&self.pool)
                    .await
            })
            .map_err(|e| WorkflowError::storage(e.to_string()))?;

        rows.iter()
            .map(|row| Self::decode(row.get::<String, _>("record").as_str()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_get_round_trip() {
        let store = SqlitePackageStore::in_memory().unwrap();
        let created = store.create(vec!["img-1".to_string()]).unwrap();

        let fetched = store.get(created.id).unwrap();
        assert_eq!(fetched, created);
    }

    #[test]
    fn conditional_update_applies_and_persists() {
        let store = SqlitePackageStore::in_memory().unwrap();
        let pkg = store.create(vec!["img-1".to_string()]).unwrap();

        let updated = store
            .apply(
                pkg.id,
                PackageState::Scanning,
                PackageMutation::BeginProcessing {
                    ocr_text: "text".to_string(),
                    ocr_ref: "blob".to_string(),
                },
            )
            .unwrap();
        assert_eq!(updated.state, PackageState::Processing);
        assert_eq!(store.get(pkg.id).unwrap().state, PackageState::Processing);
    }

    #[test]
    fn stale_expected_state_is_a_precondition_failure() {
        let store = SqlitePackageStore::in_memory().unwrap();
        let pkg = store.create(vec!["img-1".to_string()]).unwrap();

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

        let err = store
            .apply(
                pkg.id,
                PackageState::Scanning,
                PackageMutation::AppendImages(vec!["img-2".to_string()]),
            )
            .unwrap_err();
        assert!(matches!(err, WorkflowError::PreconditionFailed { .. }));
    }

    #[test]
    fn concurrent_same_state_appends_both_persist() {
        use std::sync::{Arc, Barrier};
        use std::thread;

        let store = Arc::new(SqlitePackageStore::in_memory().unwrap());

        // Same-state writers must serialize, not overwrite each other.
        for trial in 0..8 {
            let pkg = store.create(vec!["img-0".to_string()]).unwrap();
            let barrier = Arc::new(Barrier::new(2));

            let handles: Vec<_> = ["left", "right"]
                .into_iter()
                .map(|tag| {
                    let store = store.clone();
                    let barrier = barrier.clone();
                    let id = pkg.id;
                    thread::spawn(move || {
                        barrier.wait();
                        store.apply(
                            id,
                            PackageState::Scanning,
                            PackageMutation::AppendImages(vec![format!("img-{tag}")]),
                        )
                    })
                })
                .collect();

            for handle in handles {
                handle.join().unwrap().unwrap();
            }

            let images = store.get(pkg.id).unwrap().images;
            assert_eq!(images.len(), 3, "lost an append on trial {trial}: {images:?}");
        }
    }

    #[test]
    fn list_by_state_filters() {
        let store = SqlitePackageStore::in_memory().unwrap();
        let a = store.create(vec!["a".to_string()]).unwrap();
        let _b = store.create(vec!["b".to_string()]).unwrap();

        store
            .apply(
                a.id,
                PackageState::Scanning,
                PackageMutation::BeginProcessing {
                    ocr_text: "text".to_string(),
                    ocr_ref: "blob".to_string(),
                },
            )
            .unwrap();

        let processing = store.list_by_state(PackageState::Processing).unwrap();
        assert_eq!(processing.len(), 1);
        assert_eq!(processing[0].id, a.id);
        assert_eq!(store.list().unwrap().len(), 2);
    }
}
