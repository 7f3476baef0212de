use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{BlobId, CategoryId, ExpenseId, UserId};

/// A persisted expense record.
///
/// Only `user_id` and `attachment_id` matter to the attachment-ownership
/// core: an expense referencing a blob is the durable claim on it, and the
/// blob must never be reclaimed while the reference exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Expense {
    pub id: ExpenseId,
    pub user_id: UserId,
    /// Date the expense was incurred (not when it was recorded).
    pub date: NaiveDate,
    pub merchant: String,
    /// Amount in cents (e.g. 1250 = 12.50).
    pub amount_cents: i64,
    pub category_id: CategoryId,
    /// Receipt blob, if one is attached.
    pub attachment_id: Option<BlobId>,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Payload for inserting a new expense. The store assigns the id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewExpense {
    pub user_id: UserId,
    pub date: NaiveDate,
    pub merchant: String,
    pub amount_cents: i64,
    pub category_id: CategoryId,
    pub attachment_id: Option<BlobId>,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Full replacement of an expense's editable fields.
///
/// Updates always carry the complete editable field set (the owner and
/// creation time are immutable), so a patch with `attachment_id: None`
/// removes the attachment reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpensePatch {
    pub date: NaiveDate,
    pub merchant: String,
    pub amount_cents: i64,
    pub category_id: CategoryId,
    pub attachment_id: Option<BlobId>,
    pub comment: Option<String>,
}

impl Expense {
    /// Build the patch that keeps every editable field as-is.
    #[must_use]
    pub fn to_patch(&self) -> ExpensePatch {
        ExpensePatch {
            date: self.date,
            merchant: self.merchant.clone(),
            amount_cents: self.amount_cents,
            category_id: self.category_id.clone(),
            attachment_id: self.attachment_id.clone(),
            comment: self.comment.clone(),
        }
    }

    /// Apply a patch in place.
    pub fn apply_patch(&mut self, patch: ExpensePatch) {
        self.date = patch.date;
        self.merchant = patch.merchant;
        self.amount_cents = patch.amount_cents;
        self.category_id = patch.category_id;
        self.attachment_id = patch.attachment_id;
        self.comment = patch.comment;
    }
}
