use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use outlay_core::BlobId;

/// A one-time target the client pushes file bytes to.
///
/// The store assigns the blob id up front; the client uploads directly to
/// `url` and then registers `blob_id` with the ownership ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadTarget {
    /// One-time upload URL.
    pub url: String,
    /// The id the uploaded blob will be stored under.
    pub blob_id: BlobId,
}

/// A blob id paired with its creation time, as returned by age-bounded
/// listings. The sweep's second pass is the only consumer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlobHandle {
    pub blob_id: BlobId,
    pub created_at: DateTime<Utc>,
}

/// A time-limited signed URL minted by the blob store.
///
/// Returned verbatim to the caller; its lifetime is a blob store concern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SignedUrl(String);

impl SignedUrl {
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SignedUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Typed outcome of a blob deletion.
///
/// Distinguishing "deleted" from "was already gone" lets callers choose:
/// sweep and attachment-swap cleanup log and continue on either, while an
/// explicit user delete may want to report what actually happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// The blob existed and was removed.
    Deleted,
    /// The blob was already absent (e.g. reclaimed concurrently).
    AlreadyAbsent,
}
