use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, warn};

use outlay_blob::{BlobStore, DeleteOutcome, SignedUrl, UploadTarget};
use outlay_core::{BlobId, RequestContext, UserId, UserResolver};
use outlay_store::{ClaimOutcome, DocumentQuery, DocumentStore};

use crate::config::AttachmentConfig;
use crate::error::AttachmentError;

/// Attachment ownership and access control.
///
/// Holds the injected document store, blob store, and user resolver; every
/// operation resolves the caller first and filters by the resolved user
/// before reading or mutating anything. The service keeps no state of its
/// own, so it can be shared freely behind an [`Arc`].
pub struct AttachmentService {
    docs: Arc<dyn DocumentStore>,
    blobs: Arc<dyn BlobStore>,
    auth: Arc<dyn UserResolver>,
    config: AttachmentConfig,
}

impl AttachmentService {
    pub fn new(
        docs: Arc<dyn DocumentStore>,
        blobs: Arc<dyn BlobStore>,
        auth: Arc<dyn UserResolver>,
        config: AttachmentConfig,
    ) -> Self {
        Self {
            docs,
            blobs,
            auth,
            config,
        }
    }

    pub(crate) fn docs(&self) -> &dyn DocumentStore {
        self.docs.as_ref()
    }

    pub(crate) fn blobs(&self) -> &dyn BlobStore {
        self.blobs.as_ref()
    }

    pub(crate) fn config(&self) -> &AttachmentConfig {
        &self.config
    }

    async fn require_user(&self, ctx: &RequestContext) -> Result<UserId, AttachmentError> {
        self.auth
            .resolve_user(ctx)
            .await
            .ok_or(AttachmentError::Unauthenticated)
    }

    /// Mint a one-time upload target for the caller.
    ///
    /// The client pushes the file bytes to the target, then calls
    /// [`register_upload`](Self::register_upload) with the blob id.
    pub async fn create_upload_url(
        &self,
        ctx: &RequestContext,
    ) -> Result<UploadTarget, AttachmentError> {
        self.require_user(ctx).await?;
        Ok(self.blobs.create_upload_target().await?)
    }

    /// Register ownership of a freshly uploaded blob.
    ///
    /// Idempotent: replaying the call for a blob the caller already owns
    /// succeeds without writing. A blob claimed by anyone else (via the
    /// ledger, or via a pre-ledger expense reference when the legacy
    /// fallback is enabled) fails with
    /// [`AttachmentError::OwnershipConflict`]. The check-then-insert runs
    /// atomically inside the document store, so two concurrent
    /// registrations for the same fresh blob resolve to exactly one owner.
    pub async fn register_upload(
        &self,
        ctx: &RequestContext,
        blob_id: &BlobId,
    ) -> Result<(), AttachmentError> {
        let user = self.require_user(ctx).await?;

        let outcome = self
            .docs
            .claim_blob(
                blob_id,
                &user,
                Utc::now(),
                self.config.accept_legacy_references,
            )
            .await?;

        match outcome {
            ClaimOutcome::Claimed | ClaimOutcome::AlreadyOwned => Ok(()),
            ClaimOutcome::ConflictingLedgerOwner | ClaimOutcome::ConflictingExpenseOwner => {
                Err(AttachmentError::OwnershipConflict)
            }
        }
    }

    /// Mint a download URL for a blob the caller may read.
    ///
    /// Fails closed: `Ok(None)` whether the blob is missing, unregistered,
    /// or owned by someone else — never a permission error. Ownership is
    /// satisfied by a ledger claim (preview before the expense is saved) or
    /// by an expense of the caller's referencing the blob.
    pub async fn resolve_download_url(
        &self,
        ctx: &RequestContext,
        blob_id: &BlobId,
    ) -> Result<Option<SignedUrl>, AttachmentError> {
        let Some(user) = self.auth.resolve_user(ctx).await else {
            return Ok(None);
        };

        // Collect all ledger rows so the check is deterministic even if
        // duplicate rows exist: every row must belong to the caller.
        let rows = self.docs.ledger_rows_for_blob(blob_id).await?;
        if !rows.is_empty() && rows.iter().all(|r| r.user_id == user) {
            return Ok(self.blobs.signed_url(blob_id).await?);
        }

        if self
            .docs
            .expense_referencing(&user, blob_id)
            .await?
            .is_some()
        {
            return Ok(self.blobs.signed_url(blob_id).await?);
        }

        Ok(None)
    }

    /// Delete a blob that is currently attached to one of the caller's
    /// expenses.
    ///
    /// The caller is responsible for clearing the expense's attachment field
    /// afterwards; this operation does not touch the expense itself. Blob
    /// store outages propagate as retryable failures; the follow-up ledger
    /// cleanup tolerates missing rows.
    pub async fn delete_attached_blob(
        &self,
        ctx: &RequestContext,
        blob_id: &BlobId,
    ) -> Result<(), AttachmentError> {
        let user = self.require_user(ctx).await?;

        if self
            .docs
            .expense_referencing(&user, blob_id)
            .await?
            .is_none()
        {
            return Err(AttachmentError::NotFoundOrNotOwned);
        }

        self.blobs.delete(blob_id).await?;
        self.docs.delete_ledger_rows(blob_id).await?;
        Ok(())
    }

    /// Verify that `blob_id` has ledger row(s) all owned by `user_id`.
    ///
    /// Called by expense mutations before committing a write that attaches
    /// the blob, so a user cannot attach a file uploaded by someone else or
    /// never registered.
    pub async fn verify_attachment_ownership(
        &self,
        user_id: &UserId,
        blob_id: &BlobId,
    ) -> Result<(), AttachmentError> {
        let rows = self.docs.ledger_rows_for_blob(blob_id).await?;
        if rows.is_empty() || !rows.iter().all(|r| &r.user_id == user_id) {
            return Err(AttachmentError::NotFoundOrNotOwned);
        }
        Ok(())
    }

    /// Release a blob whose expense reference was replaced or removed.
    ///
    /// The blob delete is best-effort: a concurrent reclamation or a
    /// transient outage must not fail the enclosing expense mutation, so
    /// both are logged and swallowed. The ledger-row removal is the part
    /// that must succeed (and tolerates rows already being gone).
    pub async fn release_if_replaced(
        &self,
        old_blob_id: &BlobId,
        new_blob_id: Option<&BlobId>,
    ) -> Result<(), AttachmentError> {
        if new_blob_id == Some(old_blob_id) {
            return Ok(());
        }

        match self.blobs.delete(old_blob_id).await {
            Ok(DeleteOutcome::Deleted) => {
                debug!(blob_id = %old_blob_id, "released replaced attachment blob");
            }
            Ok(DeleteOutcome::AlreadyAbsent) => {
                debug!(blob_id = %old_blob_id, "replaced attachment blob was already gone");
            }
            Err(err) => {
                warn!(
                    blob_id = %old_blob_id,
                    error = %err,
                    "failed to delete replaced attachment blob, removing ledger rows anyway"
                );
            }
        }

        self.docs.delete_ledger_rows(old_blob_id).await?;
        Ok(())
    }
}
