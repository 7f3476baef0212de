use async_trait::async_trait;
use chrono::{DateTime, Utc};

use outlay_core::{BlobId, Expense, ExpenseId, ExpensePatch, LedgerRow, NewExpense, UserId};

use crate::error::StoreError;

/// Result of an atomic blob-claim operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// No prior claim existed; a new ledger row was inserted.
    Claimed,
    /// The same user already holds the claim. Nothing was written.
    AlreadyOwned,
    /// A ledger row for this blob belongs to a different user.
    ConflictingLedgerOwner,
    /// No ledger row exists, but an expense owned by a different user
    /// already references the blob (legacy data written before the ledger).
    ConflictingExpenseOwner,
}

/// Read-only view over the ownership ledger and expense collections.
///
/// Operations that only ever look at data depend on this capability rather
/// than on the full [`DocumentStore`].
#[async_trait]
pub trait DocumentQuery: Send + Sync {
    /// All ledger rows for a blob, in insertion order.
    ///
    /// Normally 0 or 1 rows; callers must handle duplicates defensively and
    /// never grant access based on whichever row happens to come first.
    async fn ledger_rows_for_blob(&self, blob_id: &BlobId) -> Result<Vec<LedgerRow>, StoreError>;

    /// Ledger rows created strictly before `cutoff`, oldest first, at most
    /// `limit` of them. Backed by the ledger's creation-time index.
    async fn ledger_rows_older_than(
        &self,
        cutoff: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<LedgerRow>, StoreError>;

    /// The first expense owned by `user_id` whose attachment is `blob_id`.
    /// Backed by the composite (user, attachment) index.
    async fn expense_referencing(
        &self,
        user_id: &UserId,
        blob_id: &BlobId,
    ) -> Result<Option<Expense>, StoreError>;

    /// Whether any expense, regardless of owner, references `blob_id`.
    ///
    /// This is the reclamation safety check: a blob with any reference must
    /// never be deleted.
    async fn any_expense_references(&self, blob_id: &BlobId) -> Result<bool, StoreError>;

    /// Fetch a single expense by id.
    async fn get_expense(&self, id: &ExpenseId) -> Result<Option<Expense>, StoreError>;

    /// All expenses owned by `user_id`, in unspecified order.
    async fn expenses_for_user(&self, user_id: &UserId) -> Result<Vec<Expense>, StoreError>;
}

/// Full read-write capability over both collections.
///
/// Every method is atomic and serializable with respect to concurrent calls
/// touching the same documents; in particular [`claim_blob`] is the
/// transaction boundary for registration, the same way a conditional-write
/// primitive would be. Implementations must not rely on callers holding any
/// lock.
///
/// [`claim_blob`]: DocumentStore::claim_blob
#[async_trait]
pub trait DocumentStore: DocumentQuery {
    /// Atomically claim `blob_id` for `user_id`.
    ///
    /// The decision rule, evaluated in order inside one transaction:
    ///
    /// 1. Any existing ledger row with a different user → `ConflictingLedgerOwner`.
    /// 2. Existing ledger row(s) for the same user → `AlreadyOwned`, no write.
    /// 3. If `accept_legacy_reference` is set and an expense owned by a
    ///    different user references the blob → `ConflictingExpenseOwner`.
    /// 4. Otherwise insert `{blob_id, user_id, created_at: now}` → `Claimed`.
    ///
    /// Two concurrent claims for the same fresh blob by different users must
    /// resolve to exactly one `Claimed` and one conflict.
    async fn claim_blob(
        &self,
        blob_id: &BlobId,
        user_id: &UserId,
        now: DateTime<Utc>,
        accept_legacy_reference: bool,
    ) -> Result<ClaimOutcome, StoreError>;

    /// Delete every ledger row for `blob_id`. Returns the number removed.
    ///
    /// Idempotent: a missing row is not an error, and duplicate rows are all
    /// removed in one call.
    async fn delete_ledger_rows(&self, blob_id: &BlobId) -> Result<u64, StoreError>;

    /// Insert a new expense and return its assigned id.
    async fn insert_expense(&self, expense: NewExpense) -> Result<ExpenseId, StoreError>;

    /// Replace the editable fields of an existing expense.
    async fn patch_expense(&self, id: &ExpenseId, patch: ExpensePatch) -> Result<(), StoreError>;

    /// Delete an expense. Fails with [`StoreError::NotFound`] if absent.
    async fn delete_expense(&self, id: &ExpenseId) -> Result<(), StoreError>;
}
