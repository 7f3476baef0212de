use async_trait::async_trait;
use chrono::{DateTime, Utc};

use outlay_core::BlobId;

use crate::error::BlobError;
use crate::types::{BlobHandle, DeleteOutcome, SignedUrl, UploadTarget};

/// Pluggable blob storage backend for receipt attachments.
///
/// Implementors provide the actual storage mechanism (e.g. S3, GCS, a
/// managed platform's file storage). The blob store has no ownership
/// concept of its own; ownership lives entirely in the document store's
/// ledger and expense collections.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Mint a one-time upload target.
    ///
    /// The client pushes bytes to the target exactly once and must then
    /// register the returned blob id with the ownership ledger.
    async fn create_upload_target(&self) -> Result<UploadTarget, BlobError>;

    /// Mint a time-limited signed URL for a blob.
    ///
    /// Returns `None` if the blob does not exist.
    async fn signed_url(&self, blob_id: &BlobId) -> Result<Option<SignedUrl>, BlobError>;

    /// Delete a blob.
    ///
    /// Deleting an absent blob is not an error; it reports
    /// [`DeleteOutcome::AlreadyAbsent`]. Transient backend failures surface
    /// as [`BlobError::Unavailable`].
    async fn delete(&self, blob_id: &BlobId) -> Result<DeleteOutcome, BlobError>;

    /// List blobs created strictly before `cutoff`, oldest first, at most
    /// `limit` of them. Used only by the orphan sweep's untracked pass.
    async fn list_older_than(
        &self,
        cutoff: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<BlobHandle>, BlobError>;
}
