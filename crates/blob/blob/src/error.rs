use thiserror::Error;

/// Errors that can occur during blob storage operations.
///
/// "Already absent" is not an error: deletion reports it through
/// [`DeleteOutcome::AlreadyAbsent`](crate::types::DeleteOutcome) so that
/// best-effort cleanup paths can tell a tolerated no-op from a real failure.
#[derive(Debug, Error)]
pub enum BlobError {
    /// The backend failed transiently (network, throttling). Retryable.
    #[error("blob store unavailable: {0}")]
    Unavailable(String),

    /// A non-transient storage backend error.
    #[error("blob storage error: {0}")]
    Storage(String),
}
