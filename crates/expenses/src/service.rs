use std::sync::Arc;

use chrono::Utc;

use outlay_attachments::AttachmentService;
use outlay_core::{
    BlobId, CategoryId, Expense, ExpenseId, ExpensePatch, NewExpense, RequestContext, UserId,
    UserResolver,
};
use outlay_store::{DocumentQuery, DocumentStore};

use crate::error::ExpenseError;
use crate::validate::validate;

/// Caller-supplied expense fields, unvalidated.
///
/// The date arrives as the string the form submitted; validation parses and
/// normalizes everything before any write.
#[derive(Debug, Clone)]
pub struct ExpenseInput {
    /// `YYYY-MM-DD`.
    pub date: String,
    pub merchant: String,
    pub amount_cents: i64,
    pub category_id: CategoryId,
    pub attachment_id: Option<BlobId>,
    pub comment: Option<String>,
}

/// Expense mutations and queries.
///
/// The attachment hooks are the part that matters to the ownership core:
/// attaching a blob requires a ledger claim by the acting user, and any
/// mutation that drops a blob reference releases the blob (and its ledger
/// rows) immediately rather than leaving it for the sweep.
pub struct ExpenseService {
    docs: Arc<dyn DocumentStore>,
    attachments: Arc<AttachmentService>,
    auth: Arc<dyn UserResolver>,
}

impl ExpenseService {
    pub fn new(
        docs: Arc<dyn DocumentStore>,
        attachments: Arc<AttachmentService>,
        auth: Arc<dyn UserResolver>,
    ) -> Self {
        Self {
            docs,
            attachments,
            auth,
        }
    }

    async fn require_user(&self, ctx: &RequestContext) -> Result<UserId, ExpenseError> {
        self.auth
            .resolve_user(ctx)
            .await
            .ok_or(ExpenseError::Unauthenticated)
    }

    /// Fetch an expense the caller owns, or [`ExpenseError::NotFound`].
    async fn owned_expense(
        &self,
        user: &UserId,
        id: &ExpenseId,
    ) -> Result<Expense, ExpenseError> {
        match self.docs.get_expense(id).await? {
            Some(expense) if &expense.user_id == user => Ok(expense),
            _ => Err(ExpenseError::NotFound),
        }
    }

    /// Create a new expense.
    ///
    /// A supplied attachment must be a blob the caller registered.
    pub async fn create(
        &self,
        ctx: &RequestContext,
        input: ExpenseInput,
    ) -> Result<ExpenseId, ExpenseError> {
        let user = self.require_user(ctx).await?;
        let fields = validate(&input)?;

        if let Some(blob_id) = &input.attachment_id {
            self.attachments
                .verify_attachment_ownership(&user, blob_id)
                .await?;
        }

        let id = self
            .docs
            .insert_expense(NewExpense {
                user_id: user,
                date: fields.date,
                merchant: fields.merchant,
                amount_cents: input.amount_cents,
                category_id: input.category_id,
                attachment_id: input.attachment_id,
                comment: fields.comment,
                created_at: Utc::now(),
            })
            .await?;
        Ok(id)
    }

    /// Update an existing expense.
    ///
    /// A changed attachment is verified before the write; the replaced blob
    /// is released after the write commits, so there is no window in which a
    /// still-referenced blob has been deleted.
    pub async fn update(
        &self,
        ctx: &RequestContext,
        id: &ExpenseId,
        input: ExpenseInput,
    ) -> Result<(), ExpenseError> {
        let user = self.require_user(ctx).await?;
        let existing = self.owned_expense(&user, id).await?;
        let fields = validate(&input)?;

        if let Some(blob_id) = &input.attachment_id
            && input.attachment_id != existing.attachment_id
        {
            self.attachments
                .verify_attachment_ownership(&user, blob_id)
                .await?;
        }

        self.docs
            .patch_expense(
                id,
                ExpensePatch {
                    date: fields.date,
                    merchant: fields.merchant,
                    amount_cents: input.amount_cents,
                    category_id: input.category_id,
                    attachment_id: input.attachment_id.clone(),
                    comment: fields.comment,
                },
            )
            .await?;

        if let Some(old) = &existing.attachment_id
            && existing.attachment_id != input.attachment_id
        {
            self.attachments
                .release_if_replaced(old, input.attachment_id.as_ref())
                .await?;
        }

        Ok(())
    }

    /// Delete an expense and release its attachment, if any.
    pub async fn remove(&self, ctx: &RequestContext, id: &ExpenseId) -> Result<(), ExpenseError> {
        let user = self.require_user(ctx).await?;
        let expense = self.owned_expense(&user, id).await?;

        self.docs.delete_expense(id).await?;

        if let Some(blob_id) = &expense.attachment_id {
            self.attachments.release_if_replaced(blob_id, None).await?;
        }
        Ok(())
    }

    /// Remove the attachment from an expense, keeping the expense itself.
    pub async fn remove_attachment(
        &self,
        ctx: &RequestContext,
        id: &ExpenseId,
    ) -> Result<(), ExpenseError> {
        let user = self.require_user(ctx).await?;
        let expense = self.owned_expense(&user, id).await?;

        let Some(blob_id) = expense.attachment_id.clone() else {
            return Ok(());
        };

        let mut patch = expense.to_patch();
        patch.attachment_id = None;
        self.docs.patch_expense(id, patch).await?;
        self.attachments.release_if_replaced(&blob_id, None).await?;
        Ok(())
    }

    /// All of the caller's expenses, most recent date first (ties broken by
    /// creation time, newest first). An anonymous caller sees an empty list.
    pub async fn list(&self, ctx: &RequestContext) -> Result<Vec<Expense>, ExpenseError> {
        let Some(user) = self.auth.resolve_user(ctx).await else {
            return Ok(Vec::new());
        };

        let mut expenses = self.docs.expenses_for_user(&user).await?;
        expenses.sort_by(|a, b| {
            b.date
                .cmp(&a.date)
                .then_with(|| b.created_at.cmp(&a.created_at))
        });
        Ok(expenses)
    }

    /// A single expense, or `None` when missing, foreign, or anonymous.
    pub async fn get(
        &self,
        ctx: &RequestContext,
        id: &ExpenseId,
    ) -> Result<Option<Expense>, ExpenseError> {
        let Some(user) = self.auth.resolve_user(ctx).await else {
            return Ok(None);
        };
        Ok(self
            .docs
            .get_expense(id)
            .await?
            .filter(|e| e.user_id == user))
    }

    /// Unique merchant names across the caller's expenses, sorted.
    /// Autocomplete source for the expense form.
    pub async fn merchants(&self, ctx: &RequestContext) -> Result<Vec<String>, ExpenseError> {
        let Some(user) = self.auth.resolve_user(ctx).await else {
            return Ok(Vec::new());
        };

        let mut merchants: Vec<String> = self
            .docs
            .expenses_for_user(&user)
            .await?
            .into_iter()
            .map(|e| e.merchant)
            .collect();
        merchants.sort();
        merchants.dedup();
        Ok(merchants)
    }
}
