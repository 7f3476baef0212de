use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use outlay_core::{BlobId, Expense, ExpenseId, ExpensePatch, LedgerRow, NewExpense, UserId};
use outlay_store::error::StoreError;
use outlay_store::store::{ClaimOutcome, DocumentQuery, DocumentStore};

#[derive(Debug, Default)]
struct Collections {
    /// Ledger rows in insertion order. May hold duplicates for the same blob
    /// when seeded via [`MemoryDocumentStore::insert_ledger_row_unchecked`];
    /// `claim_blob` itself never creates them.
    ledger: Vec<LedgerRow>,
    expenses: HashMap<ExpenseId, Expense>,
}

/// In-memory [`DocumentStore`] holding both collections behind one mutex.
///
/// The single lock is what provides the serializable per-call semantics the
/// service relies on: a claim's check-then-insert cannot interleave with a
/// concurrent claim for the same blob. The lock is never held across an
/// await.
#[derive(Debug, Default)]
pub struct MemoryDocumentStore {
    inner: Mutex<Collections>,
}

impl MemoryDocumentStore {
    /// Create a new, empty in-memory document store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a ledger row directly, bypassing the claim rule.
    ///
    /// Test seam for constructing duplicate or aged rows that the normal
    /// write path would refuse to create.
    pub fn insert_ledger_row_unchecked(&self, row: LedgerRow) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.ledger.push(row);
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Collections>, StoreError> {
        self.inner
            .lock()
            .map_err(|_| StoreError::Backend("document store lock poisoned".into()))
    }
}

fn any_reference(inner: &Collections, blob_id: &BlobId) -> Option<UserId> {
    inner
        .expenses
        .values()
        .find(|e| e.attachment_id.as_ref() == Some(blob_id))
        .map(|e| e.user_id.clone())
}

#[async_trait]
impl DocumentQuery for MemoryDocumentStore {
    async fn ledger_rows_for_blob(&self, blob_id: &BlobId) -> Result<Vec<LedgerRow>, StoreError> {
        let inner = self.lock()?;
        Ok(inner
            .ledger
            .iter()
            .filter(|r| &r.blob_id == blob_id)
            .cloned()
            .collect())
    }

    async fn ledger_rows_older_than(
        &self,
        cutoff: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<LedgerRow>, StoreError> {
        let inner = self.lock()?;
        let mut rows: Vec<LedgerRow> = inner
            .ledger
            .iter()
            .filter(|r| r.created_at < cutoff)
            .cloned()
            .collect();
        rows.sort_by_key(|r| r.created_at);
        rows.truncate(limit);
        Ok(rows)
    }

    async fn expense_referencing(
        &self,
        user_id: &UserId,
        blob_id: &BlobId,
    ) -> Result<Option<Expense>, StoreError> {
        let inner = self.lock()?;
        Ok(inner
            .expenses
            .values()
            .find(|e| &e.user_id == user_id && e.attachment_id.as_ref() == Some(blob_id))
            .cloned())
    }

    async fn any_expense_references(&self, blob_id: &BlobId) -> Result<bool, StoreError> {
        let inner = self.lock()?;
        Ok(any_reference(&inner, blob_id).is_some())
    }

    async fn get_expense(&self, id: &ExpenseId) -> Result<Option<Expense>, StoreError> {
        let inner = self.lock()?;
        Ok(inner.expenses.get(id).cloned())
    }

    async fn expenses_for_user(&self, user_id: &UserId) -> Result<Vec<Expense>, StoreError> {
        let inner = self.lock()?;
        Ok(inner
            .expenses
            .values()
            .filter(|e| &e.user_id == user_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn claim_blob(
        &self,
        blob_id: &BlobId,
        user_id: &UserId,
        now: DateTime<Utc>,
        accept_legacy_reference: bool,
    ) -> Result<ClaimOutcome, StoreError> {
        let mut inner = self.lock()?;

        let existing: Vec<&LedgerRow> =
            inner.ledger.iter().filter(|r| &r.blob_id == blob_id).collect();

        if existing.iter().any(|r| &r.user_id != user_id) {
            return Ok(ClaimOutcome::ConflictingLedgerOwner);
        }
        if !existing.is_empty() {
            return Ok(ClaimOutcome::AlreadyOwned);
        }

        if accept_legacy_reference
            && let Some(owner) = any_reference(&inner, blob_id)
            && &owner != user_id
        {
            return Ok(ClaimOutcome::ConflictingExpenseOwner);
        }

        inner.ledger.push(LedgerRow {
            blob_id: blob_id.clone(),
            user_id: user_id.clone(),
            created_at: now,
        });
        Ok(ClaimOutcome::Claimed)
    }

    async fn delete_ledger_rows(&self, blob_id: &BlobId) -> Result<u64, StoreError> {
        let mut inner = self.lock()?;
        let before = inner.ledger.len();
        inner.ledger.retain(|r| &r.blob_id != blob_id);
        Ok((before - inner.ledger.len()) as u64)
    }

    async fn insert_expense(&self, expense: NewExpense) -> Result<ExpenseId, StoreError> {
        let mut inner = self.lock()?;
        let id = ExpenseId::new(Uuid::new_v4().to_string());
        inner.expenses.insert(
            id.clone(),
            Expense {
                id: id.clone(),
                user_id: expense.user_id,
                date: expense.date,
                merchant: expense.merchant,
                amount_cents: expense.amount_cents,
                category_id: expense.category_id,
                attachment_id: expense.attachment_id,
                comment: expense.comment,
                created_at: expense.created_at,
            },
        );
        Ok(id)
    }

    async fn patch_expense(&self, id: &ExpenseId, patch: ExpensePatch) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        let expense = inner
            .expenses
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(format!("expense {id}")))?;
        expense.apply_patch(patch);
        Ok(())
    }

    async fn delete_expense(&self, id: &ExpenseId) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        inner
            .expenses
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(format!("expense {id}")))
    }
}
