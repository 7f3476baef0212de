use thiserror::Error;

use outlay_attachments::AttachmentError;
use outlay_store::StoreError;

/// Errors surfaced by expense mutations and queries.
#[derive(Debug, Error)]
pub enum ExpenseError {
    #[error("not authenticated")]
    Unauthenticated,

    /// The expense does not exist or belongs to another user; the two are
    /// indistinguishable on purpose.
    #[error("expense not found")]
    NotFound,

    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Attachment(#[from] AttachmentError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
