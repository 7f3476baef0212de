use thiserror::Error;

use outlay_blob::BlobError;
use outlay_store::StoreError;

/// Errors surfaced by attachment operations.
#[derive(Debug, Error)]
pub enum AttachmentError {
    /// No user could be resolved from the request context.
    #[error("not authenticated")]
    Unauthenticated,

    /// Registration attempted by a user who is not the existing claimant,
    /// by either source of truth (ledger row or expense reference).
    #[error("file already claimed by another user")]
    OwnershipConflict,

    /// The blob does not exist or is not owned by the caller. The two cases
    /// are deliberately indistinguishable so that probing for other users'
    /// blob ids leaks nothing.
    #[error("attachment not found or not owned by current user")]
    NotFoundOrNotOwned,

    /// The blob store failed for a reason other than "already absent".
    /// Retryable by the caller.
    #[error("blob store unavailable: {0}")]
    BlobUnavailable(String),

    /// Document store failure.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<BlobError> for AttachmentError {
    fn from(err: BlobError) -> Self {
        match err {
            BlobError::Unavailable(msg) | BlobError::Storage(msg) => Self::BlobUnavailable(msg),
        }
    }
}
