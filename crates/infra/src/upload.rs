//! Artifact upload collaborator.
//!
//! The workflow never touches image bytes after ingestion; it only keeps the
//! storage references this collaborator hands back.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use mailroom_core::WorkflowResult;

/// Reference to a stored artifact.
pub type StorageRef = String;

/// Metadata attached to a stored artifact.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UploadMetadata {
    /// Package the artifact belongs to, when known at upload time.
    pub package_hint: Option<String>,
    pub filename: Option<String>,
}

/// Upload collaborator contract.
///
/// Failures surface as [`mailroom_core::WorkflowError::UploadFailed`]; the
/// ingestion gateway guarantees no store mutation happened before then, so
/// the whole submission is safe to retry.
pub trait ArtifactUpload: Send + Sync {
    fn store(
        &self,
        bytes: &[u8],
        content_type: &str,
        metadata: &UploadMetadata,
    ) -> WorkflowResult<StorageRef>;
}

#[derive(Debug)]
struct StoredBlob {
    content_type: String,
    bytes: Vec<u8>,
}

/// In-memory upload sink for tests and development.
#[derive(Debug, Default)]
pub struct InMemoryUpload {
    blobs: RwLock<HashMap<StorageRef, StoredBlob>>,
}

impl InMemoryUpload {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    pub fn len(&self) -> usize {
        self.blobs.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, storage_ref: &str) -> bool {
        self.blobs.read().unwrap().contains_key(storage_ref)
    }
}

impl ArtifactUpload for InMemoryUpload {
    fn store(
        &self,
        bytes: &[u8],
        content_type: &str,
        _metadata: &UploadMetadata,
    ) -> WorkflowResult<StorageRef> {
        let storage_ref = format!("blob-{}", Uuid::now_v7());
        let mut blobs = self.blobs.write().unwrap();
        blobs.insert(
            storage_ref.clone(),
            StoredBlob {
                content_type: content_type.to_string(),
                bytes: bytes.to_vec(),
            },
        );
        Ok(storage_ref)
    }
}
