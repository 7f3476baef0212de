use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use uuid::Uuid;

use outlay_blob::error::BlobError;
use outlay_blob::store::BlobStore;
use outlay_blob::types::{BlobHandle, DeleteOutcome, SignedUrl, UploadTarget};
use outlay_core::BlobId;

#[derive(Debug, Clone)]
struct StoredBlob {
    content_type: String,
    data: Bytes,
    created_at: DateTime<Utc>,
}

/// In-memory [`BlobStore`] backed by a [`DashMap`].
///
/// Uploads are simulated with [`upload`](MemoryBlobStore::upload) (push to a
/// previously minted target) or [`put_at`](MemoryBlobStore::put_at) (direct
/// insert with a chosen creation time, for aging blobs in sweep tests).
/// Deletes can be forced to fail transiently via
/// [`set_fail_deletes`](MemoryBlobStore::set_fail_deletes).
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: DashMap<String, StoredBlob>,
    fail_deletes: AtomicBool,
}

impl MemoryBlobStore {
    /// Create a new, empty in-memory blob store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate the client-side upload against a minted target.
    pub fn upload(&self, target: &UploadTarget, content_type: impl Into<String>, data: Bytes) {
        self.blobs.insert(
            target.blob_id.as_str().to_owned(),
            StoredBlob {
                content_type: content_type.into(),
                data,
                created_at: Utc::now(),
            },
        );
    }

    /// Insert a blob directly with a chosen creation time.
    pub fn put_at(
        &self,
        content_type: impl Into<String>,
        data: Bytes,
        created_at: DateTime<Utc>,
    ) -> BlobId {
        let id = BlobId::new(Uuid::new_v4().to_string());
        self.blobs.insert(
            id.as_str().to_owned(),
            StoredBlob {
                content_type: content_type.into(),
                data,
                created_at,
            },
        );
        id
    }

    /// Whether a blob is currently stored.
    #[must_use]
    pub fn contains(&self, blob_id: &BlobId) -> bool {
        self.blobs.contains_key(blob_id.as_str())
    }

    /// Number of stored blobs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }

    /// When `true`, every `delete` fails with [`BlobError::Unavailable`].
    pub fn set_fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    /// The stored content type for a blob, if present.
    #[must_use]
    pub fn content_type(&self, blob_id: &BlobId) -> Option<String> {
        self.blobs
            .get(blob_id.as_str())
            .map(|b| b.content_type.clone())
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn create_upload_target(&self) -> Result<UploadTarget, BlobError> {
        let blob_id = BlobId::new(Uuid::new_v4().to_string());
        Ok(UploadTarget {
            url: format!("memory://upload/{blob_id}"),
            blob_id,
        })
    }

    async fn signed_url(&self, blob_id: &BlobId) -> Result<Option<SignedUrl>, BlobError> {
        Ok(self.blobs.get(blob_id.as_str()).map(|blob| {
            // A stand-in signature; real backends embed expiry and HMAC.
            SignedUrl::new(format!(
                "memory://blobs/{blob_id}?sig={}",
                blob.data.len()
            ))
        }))
    }

    async fn delete(&self, blob_id: &BlobId) -> Result<DeleteOutcome, BlobError> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(BlobError::Unavailable("simulated outage".into()));
        }
        match self.blobs.remove(blob_id.as_str()) {
            Some(_) => Ok(DeleteOutcome::Deleted),
            None => Ok(DeleteOutcome::AlreadyAbsent),
        }
    }

    async fn list_older_than(
        &self,
        cutoff: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<BlobHandle>, BlobError> {
        let mut handles: Vec<BlobHandle> = self
            .blobs
            .iter()
            .filter(|entry| entry.value().created_at < cutoff)
            .map(|entry| BlobHandle {
                blob_id: BlobId::new(entry.key().clone()),
                created_at: entry.value().created_at,
            })
            .collect();
        handles.sort_by_key(|h| h.created_at);
        handles.truncate(limit);
        Ok(handles)
    }
}
