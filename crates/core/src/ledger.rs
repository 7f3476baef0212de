use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{BlobId, UserId};

/// An ownership-ledger record mapping an uploaded blob to the user who
/// uploaded it.
///
/// The ledger is the source of truth for "who may act on this blob" until
/// the blob is attached to an expense; after that the expense's own
/// `attachment_id` field takes precedence and the ledger row becomes
/// disposable. Rows are immutable once created: they are only ever inserted
/// by registration and deleted by explicit cleanup or the orphan sweep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerRow {
    /// The blob this row claims.
    pub blob_id: BlobId,
    /// The user who uploaded the blob.
    pub user_id: UserId,
    /// When the claim was registered. Drives the sweep's retention cutoff.
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ledger_row_serde_roundtrip() {
        let row = LedgerRow {
            blob_id: BlobId::new("blob-1"),
            user_id: UserId::new("user-1"),
            created_at: Utc::now(),
        };
        let json = serde_json::to_string(&row).unwrap();
        let back: LedgerRow = serde_json::from_str(&json).unwrap();
        assert_eq!(back, row);
    }
}
