use std::sync::Arc;

use bytes::Bytes;
use chrono::{Duration, NaiveDate, Utc};

use outlay_attachments::{AttachmentConfig, AttachmentError, AttachmentService};
use outlay_blob_memory::MemoryBlobStore;
use outlay_core::{
    BlobId, CategoryId, NewExpense, RequestContext, StaticUserResolver, UserId,
};
use outlay_blob::BlobStore;
use outlay_store::{DocumentQuery, DocumentStore};
use outlay_store_memory::MemoryDocumentStore;

struct Harness {
    docs: Arc<MemoryDocumentStore>,
    blobs: Arc<MemoryBlobStore>,
    service: Arc<AttachmentService>,
}

fn harness() -> Harness {
    harness_with(AttachmentConfig::default())
}

fn harness_with(config: AttachmentConfig) -> Harness {
    let docs = Arc::new(MemoryDocumentStore::new());
    let blobs = Arc::new(MemoryBlobStore::new());
    let auth = Arc::new(
        StaticUserResolver::new()
            .with_user("tok-alice", "alice")
            .with_user("tok-bob", "bob"),
    );
    let service = Arc::new(AttachmentService::new(
        docs.clone(),
        blobs.clone(),
        auth,
        config,
    ));
    Harness {
        docs,
        blobs,
        service,
    }
}

fn alice() -> RequestContext {
    RequestContext::with_session("tok-alice")
}

fn bob() -> RequestContext {
    RequestContext::with_session("tok-bob")
}

fn expense_with_attachment(user: &str, blob: &BlobId) -> NewExpense {
    NewExpense {
        user_id: UserId::new(user),
        date: NaiveDate::from_ymd_opt(2026, 2, 1).unwrap(),
        merchant: "Hotel Continental".into(),
        amount_cents: 18_900,
        category_id: CategoryId::new("lodging"),
        attachment_id: Some(blob.clone()),
        comment: None,
        created_at: Utc::now(),
    }
}

/// Upload a blob as would happen client-side and return its id.
async fn upload(h: &Harness, ctx: &RequestContext) -> BlobId {
    let target = h.service.create_upload_url(ctx).await.unwrap();
    h.blobs.upload(&target, "image/png", Bytes::from_static(b"receipt"));
    target.blob_id
}

/// Upload a blob aged past the retention window, with no ledger row.
fn upload_untracked_aged(h: &Harness, hours: i64) -> BlobId {
    h.blobs.put_at(
        "image/png",
        Bytes::from_static(b"receipt"),
        Utc::now() - Duration::hours(hours),
    )
}

/// Register a blob with a back-dated ledger row.
async fn register_aged(h: &Harness, blob: &BlobId, user: &str, hours: i64) {
    h.docs
        .claim_blob(
            blob,
            &UserId::new(user),
            Utc::now() - Duration::hours(hours),
            true,
        )
        .await
        .unwrap();
}

// --- registration -----------------------------------------------------------

#[tokio::test]
async fn register_requires_authentication() {
    let h = harness();
    let blob = upload(&h, &alice()).await;
    let err = h
        .service
        .register_upload(&RequestContext::anonymous(), &blob)
        .await
        .unwrap_err();
    assert!(matches!(err, AttachmentError::Unauthenticated));
}

#[tokio::test]
async fn upload_url_requires_authentication() {
    let h = harness();
    let err = h
        .service
        .create_upload_url(&RequestContext::anonymous())
        .await
        .unwrap_err();
    assert!(matches!(err, AttachmentError::Unauthenticated));
}

#[tokio::test]
async fn register_is_idempotent_for_same_user() {
    let h = harness();
    let blob = upload(&h, &alice()).await;

    h.service.register_upload(&alice(), &blob).await.unwrap();
    h.service.register_upload(&alice(), &blob).await.unwrap();

    let rows = h.docs.ledger_rows_for_blob(&blob).await.unwrap();
    assert_eq!(rows.len(), 1);
}

#[tokio::test]
async fn register_rejects_second_user_and_keeps_original_claim() {
    let h = harness();
    let blob = upload(&h, &alice()).await;

    h.service.register_upload(&alice(), &blob).await.unwrap();
    let err = h.service.register_upload(&bob(), &blob).await.unwrap_err();
    assert!(matches!(err, AttachmentError::OwnershipConflict));

    let rows = h.docs.ledger_rows_for_blob(&blob).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].user_id, UserId::new("alice"));
}

#[tokio::test]
async fn concurrent_registrations_resolve_to_one_owner() {
    let h = harness();
    let blob = upload(&h, &alice()).await;

    let a = {
        let service = h.service.clone();
        let blob = blob.clone();
        tokio::spawn(async move { service.register_upload(&alice(), &blob).await })
    };
    let b = {
        let service = h.service.clone();
        let blob = blob.clone();
        tokio::spawn(async move { service.register_upload(&bob(), &blob).await })
    };

    let results = [a.await.unwrap(), b.await.unwrap()];
    let successes = results.iter().filter(|r| r.is_ok()).count();
    let conflicts = results
        .iter()
        .filter(|r| matches!(r, Err(AttachmentError::OwnershipConflict)))
        .count();
    assert_eq!((successes, conflicts), (1, 1));

    assert_eq!(h.docs.ledger_rows_for_blob(&blob).await.unwrap().len(), 1);
}

#[tokio::test]
async fn register_honors_legacy_expense_claims() {
    let h = harness();
    let blob = upload(&h, &alice()).await;
    // Pre-ledger data: an expense references the blob but no row exists.
    h.docs
        .insert_expense(expense_with_attachment("alice", &blob))
        .await
        .unwrap();

    let err = h.service.register_upload(&bob(), &blob).await.unwrap_err();
    assert!(matches!(err, AttachmentError::OwnershipConflict));

    // The expense owner can still register it.
    h.service.register_upload(&alice(), &blob).await.unwrap();
}

#[tokio::test]
async fn legacy_expense_check_can_be_disabled() {
    let h = harness_with(AttachmentConfig {
        accept_legacy_references: false,
        ..AttachmentConfig::default()
    });
    let blob = upload(&h, &alice()).await;
    h.docs
        .insert_expense(expense_with_attachment("alice", &blob))
        .await
        .unwrap();

    // Migration-only scaffolding off: the expense fallback is not consulted.
    h.service.register_upload(&bob(), &blob).await.unwrap();
}

// --- download URLs ----------------------------------------------------------

#[tokio::test]
async fn ledger_owner_can_resolve_download_url() {
    let h = harness();
    let blob = upload(&h, &alice()).await;
    h.service.register_upload(&alice(), &blob).await.unwrap();

    let url = h
        .service
        .resolve_download_url(&alice(), &blob)
        .await
        .unwrap();
    assert!(url.is_some());
}

#[tokio::test]
async fn expense_owner_can_resolve_download_url_without_ledger_row() {
    let h = harness();
    let blob = upload(&h, &alice()).await;
    h.docs
        .insert_expense(expense_with_attachment("alice", &blob))
        .await
        .unwrap();

    let url = h
        .service
        .resolve_download_url(&alice(), &blob)
        .await
        .unwrap();
    assert!(url.is_some());
}

#[tokio::test]
async fn other_users_get_not_found_never_permission_denied() {
    let h = harness();
    let blob = upload(&h, &alice()).await;
    h.service.register_upload(&alice(), &blob).await.unwrap();

    // Same shape of answer as a blob that does not exist at all.
    let url = h.service.resolve_download_url(&bob(), &blob).await.unwrap();
    assert!(url.is_none());
    let url = h
        .service
        .resolve_download_url(&bob(), &BlobId::new("no-such-blob"))
        .await
        .unwrap();
    assert!(url.is_none());
}

#[tokio::test]
async fn anonymous_download_resolves_to_none() {
    let h = harness();
    let blob = upload(&h, &alice()).await;
    h.service.register_upload(&alice(), &blob).await.unwrap();

    let url = h
        .service
        .resolve_download_url(&RequestContext::anonymous(), &blob)
        .await
        .unwrap();
    assert!(url.is_none());
}

// --- explicit delete --------------------------------------------------------

#[tokio::test]
async fn delete_requires_an_owned_expense_reference() {
    let h = harness();
    let blob = upload(&h, &alice()).await;
    h.service.register_upload(&alice(), &blob).await.unwrap();

    // Pending (ledger-only) blobs are not deletable through this path.
    let err = h
        .service
        .delete_attached_blob(&alice(), &blob)
        .await
        .unwrap_err();
    assert!(matches!(err, AttachmentError::NotFoundOrNotOwned));
}

#[tokio::test]
async fn delete_attached_blob_removes_blob_and_ledger_rows() {
    let h = harness();
    let blob = upload(&h, &alice()).await;
    h.service.register_upload(&alice(), &blob).await.unwrap();
    h.docs
        .insert_expense(expense_with_attachment("alice", &blob))
        .await
        .unwrap();

    h.service.delete_attached_blob(&alice(), &blob).await.unwrap();
    assert!(!h.blobs.contains(&blob));
    assert!(h.docs.ledger_rows_for_blob(&blob).await.unwrap().is_empty());
}

#[tokio::test]
async fn delete_attached_blob_is_denied_for_other_users() {
    let h = harness();
    let blob = upload(&h, &alice()).await;
    h.docs
        .insert_expense(expense_with_attachment("alice", &blob))
        .await
        .unwrap();

    let err = h
        .service
        .delete_attached_blob(&bob(), &blob)
        .await
        .unwrap_err();
    assert!(matches!(err, AttachmentError::NotFoundOrNotOwned));
    assert!(h.blobs.contains(&blob));
}

#[tokio::test]
async fn delete_attached_blob_propagates_transient_outage() {
    let h = harness();
    let blob = upload(&h, &alice()).await;
    h.docs
        .insert_expense(expense_with_attachment("alice", &blob))
        .await
        .unwrap();

    h.blobs.set_fail_deletes(true);
    let err = h
        .service
        .delete_attached_blob(&alice(), &blob)
        .await
        .unwrap_err();
    assert!(matches!(err, AttachmentError::BlobUnavailable(_)));
    assert!(h.blobs.contains(&blob), "blob untouched, caller may retry");
}

// --- ownership verification & release --------------------------------------

#[tokio::test]
async fn verify_rejects_unregistered_and_foreign_blobs() {
    let h = harness();
    let blob = upload(&h, &alice()).await;

    let err = h
        .service
        .verify_attachment_ownership(&UserId::new("alice"), &blob)
        .await
        .unwrap_err();
    assert!(matches!(err, AttachmentError::NotFoundOrNotOwned));

    h.service.register_upload(&alice(), &blob).await.unwrap();
    h.service
        .verify_attachment_ownership(&UserId::new("alice"), &blob)
        .await
        .unwrap();

    let err = h
        .service
        .verify_attachment_ownership(&UserId::new("bob"), &blob)
        .await
        .unwrap_err();
    assert!(matches!(err, AttachmentError::NotFoundOrNotOwned));
}

#[tokio::test]
async fn release_removes_old_blob_and_ledger_rows_immediately() {
    let h = harness();
    let old = upload(&h, &alice()).await;
    let new = upload(&h, &alice()).await;
    h.service.register_upload(&alice(), &old).await.unwrap();
    h.service.register_upload(&alice(), &new).await.unwrap();

    h.service.release_if_replaced(&old, Some(&new)).await.unwrap();

    assert!(!h.blobs.contains(&old));
    assert!(h.docs.ledger_rows_for_blob(&old).await.unwrap().is_empty());
    assert!(h.blobs.contains(&new));
    assert_eq!(h.docs.ledger_rows_for_blob(&new).await.unwrap().len(), 1);
}

#[tokio::test]
async fn release_with_unchanged_attachment_is_a_noop() {
    let h = harness();
    let blob = upload(&h, &alice()).await;
    h.service.register_upload(&alice(), &blob).await.unwrap();

    h.service.release_if_replaced(&blob, Some(&blob)).await.unwrap();

    assert!(h.blobs.contains(&blob));
    assert_eq!(h.docs.ledger_rows_for_blob(&blob).await.unwrap().len(), 1);
}

#[tokio::test]
async fn release_tolerates_blob_already_reclaimed() {
    let h = harness();
    let blob = upload(&h, &alice()).await;
    h.service.register_upload(&alice(), &blob).await.unwrap();

    // Simulate the sweep getting there first.
    h.blobs.delete(&blob).await.unwrap();

    h.service.release_if_replaced(&blob, None).await.unwrap();
    assert!(h.docs.ledger_rows_for_blob(&blob).await.unwrap().is_empty());
}

#[tokio::test]
async fn release_swallows_transient_blob_failure_but_cleans_ledger() {
    let h = harness();
    let blob = upload(&h, &alice()).await;
    h.service.register_upload(&alice(), &blob).await.unwrap();

    h.blobs.set_fail_deletes(true);
    h.service.release_if_replaced(&blob, None).await.unwrap();

    assert!(h.docs.ledger_rows_for_blob(&blob).await.unwrap().is_empty());
    // The orphaned blob is now untracked; the sweep reclaims it later.
    assert!(h.blobs.contains(&blob));
}

// --- orphan sweep -----------------------------------------------------------

#[tokio::test]
async fn sweep_deletes_only_the_row_when_blob_is_attached() {
    let h = harness();
    let blob = upload(&h, &alice()).await;
    register_aged(&h, &blob, "alice", 25).await;
    h.docs
        .insert_expense(expense_with_attachment("alice", &blob))
        .await
        .unwrap();

    let report = h.service.run_sweep().await.unwrap();

    assert_eq!(report.stale_rows_in_use, 1);
    assert_eq!(report.ledger_rows_deleted, 1);
    assert_eq!(report.blobs_deleted, 0);
    assert!(h.blobs.contains(&blob), "attached blob must survive");
    // Still retrievable through the expense.
    assert!(
        h.service
            .resolve_download_url(&alice(), &blob)
            .await
            .unwrap()
            .is_some()
    );
}

#[tokio::test]
async fn sweep_reclaims_aged_pending_blob() {
    let h = harness();
    let blob = upload(&h, &alice()).await;
    register_aged(&h, &blob, "alice", 25).await;

    let report = h.service.run_sweep().await.unwrap();

    assert_eq!(report.blobs_deleted, 1);
    assert_eq!(report.ledger_rows_deleted, 1);
    assert!(!h.blobs.contains(&blob));
    assert!(
        h.service
            .resolve_download_url(&alice(), &blob)
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn sweep_spares_pending_blob_inside_retention_window() {
    let h = harness();
    let blob = upload(&h, &alice()).await;
    h.service.register_upload(&alice(), &blob).await.unwrap();

    let report = h.service.run_sweep().await.unwrap();

    assert_eq!(report, outlay_attachments::SweepReport::default());
    assert!(h.blobs.contains(&blob));
}

#[tokio::test]
async fn sweep_reclaims_untracked_orphans() {
    let h = harness();
    // Upload completed but registration never did.
    let blob = upload_untracked_aged(&h, 25);

    let report = h.service.run_sweep().await.unwrap();

    assert_eq!(report.blobs_deleted, 1);
    assert!(!h.blobs.contains(&blob));
}

#[tokio::test]
async fn sweep_spares_untracked_blob_referenced_by_an_expense() {
    let h = harness();
    let blob = upload_untracked_aged(&h, 25);
    h.docs
        .insert_expense(expense_with_attachment("bob", &blob))
        .await
        .unwrap();

    let report = h.service.run_sweep().await.unwrap();

    assert_eq!(report.blobs_deleted, 0);
    assert!(h.blobs.contains(&blob));
}

#[tokio::test]
async fn sweep_drains_backlog_over_successive_invocations() {
    let h = harness_with(AttachmentConfig {
        sweep_batch_size: 100,
        ..AttachmentConfig::default()
    });
    for _ in 0..250 {
        upload_untracked_aged(&h, 25);
    }

    let mut total = 0;
    for _ in 0..3 {
        total += h.service.run_sweep().await.unwrap().blobs_deleted;
    }
    assert_eq!(total, 250);
    assert!(h.blobs.is_empty());
}

#[tokio::test]
async fn sweep_continues_past_transient_delete_failures() {
    let h = harness();
    let blob = upload_untracked_aged(&h, 25);
    register_aged(&h, &blob, "alice", 25).await;

    h.blobs.set_fail_deletes(true);
    let report = h.service.run_sweep().await.unwrap();

    assert!(report.errors >= 1);
    // The row goes regardless; the blob becomes untracked and a later
    // sweep picks it up once deletes work again.
    assert!(h.docs.ledger_rows_for_blob(&blob).await.unwrap().is_empty());

    h.blobs.set_fail_deletes(false);
    let report = h.service.run_sweep().await.unwrap();
    assert_eq!(report.blobs_deleted, 1);
    assert!(h.blobs.is_empty());
}

// --- full lifecycle ---------------------------------------------------------

#[tokio::test]
async fn attachment_swap_lifecycle() {
    let h = harness();
    let b1 = upload(&h, &alice()).await;
    let b2 = upload(&h, &alice()).await;
    h.service.register_upload(&alice(), &b1).await.unwrap();
    let id = h
        .docs
        .insert_expense(expense_with_attachment("alice", &b1))
        .await
        .unwrap();

    // Swap the attachment from b1 to b2, the way the expense service does:
    // verify the new blob, patch the expense, release the old blob.
    h.service.register_upload(&alice(), &b2).await.unwrap();
    h.service
        .verify_attachment_ownership(&UserId::new("alice"), &b2)
        .await
        .unwrap();
    let expense = h.docs.get_expense(&id).await.unwrap().unwrap();
    let mut patch = expense.to_patch();
    patch.attachment_id = Some(b2.clone());
    h.docs.patch_expense(&id, patch).await.unwrap();
    h.service.release_if_replaced(&b1, Some(&b2)).await.unwrap();

    assert!(!h.blobs.contains(&b1));
    assert!(h.docs.ledger_rows_for_blob(&b1).await.unwrap().is_empty());
    assert!(
        h.service
            .resolve_download_url(&alice(), &b1)
            .await
            .unwrap()
            .is_none()
    );
    assert!(
        h.service
            .resolve_download_url(&alice(), &b2)
            .await
            .unwrap()
            .is_some()
    );
}
