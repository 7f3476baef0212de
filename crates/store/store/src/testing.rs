use chrono::{Duration, NaiveDate, Utc};

use outlay_core::{BlobId, CategoryId, NewExpense, UserId};

use crate::error::StoreError;
use crate::store::{ClaimOutcome, DocumentQuery, DocumentStore};

fn new_expense(user: &str, attachment: Option<&str>) -> NewExpense {
    NewExpense {
        user_id: UserId::new(user),
        date: NaiveDate::from_ymd_opt(2026, 1, 15).expect("valid date"),
        merchant: "Test Merchant".into(),
        amount_cents: 999,
        category_id: CategoryId::new("misc"),
        attachment_id: attachment.map(BlobId::new),
        comment: None,
        created_at: Utc::now(),
    }
}

/// Run the full document store conformance test suite.
///
/// Call this from your backend's test module with a fresh store instance.
///
/// # Errors
///
/// Returns an error if any conformance test fails.
pub async fn run_docstore_conformance_tests(store: &dyn DocumentStore) -> Result<(), StoreError> {
    test_claim_fresh_blob(store).await?;
    test_claim_is_idempotent(store).await?;
    test_claim_conflicts_across_users(store).await?;
    test_claim_legacy_expense_conflict(store).await?;
    test_claim_legacy_expense_same_user(store).await?;
    test_claim_legacy_check_disabled(store).await?;
    test_delete_ledger_rows(store).await?;
    test_ledger_range_scan(store).await?;
    test_expense_reference_queries(store).await?;
    test_expense_crud(store).await?;
    Ok(())
}

async fn test_claim_fresh_blob(store: &dyn DocumentStore) -> Result<(), StoreError> {
    let blob = BlobId::new("conf-fresh");
    let user = UserId::new("u1");
    let outcome = store.claim_blob(&blob, &user, Utc::now(), true).await?;
    assert_eq!(
        outcome,
        ClaimOutcome::Claimed,
        "fresh blob should be claimable"
    );

    let rows = store.ledger_rows_for_blob(&blob).await?;
    assert_eq!(rows.len(), 1, "claim should insert exactly one row");
    assert_eq!(rows[0].user_id, user);
    Ok(())
}

async fn test_claim_is_idempotent(store: &dyn DocumentStore) -> Result<(), StoreError> {
    let blob = BlobId::new("conf-idem");
    let user = UserId::new("u1");
    store.claim_blob(&blob, &user, Utc::now(), true).await?;
    let outcome = store.claim_blob(&blob, &user, Utc::now(), true).await?;
    assert_eq!(
        outcome,
        ClaimOutcome::AlreadyOwned,
        "replayed claim by the same user should be a no-op"
    );

    let rows = store.ledger_rows_for_blob(&blob).await?;
    assert_eq!(rows.len(), 1, "replay must not create a second row");
    Ok(())
}

async fn test_claim_conflicts_across_users(store: &dyn DocumentStore) -> Result<(), StoreError> {
    let blob = BlobId::new("conf-conflict");
    store
        .claim_blob(&blob, &UserId::new("u1"), Utc::now(), true)
        .await?;
    let outcome = store
        .claim_blob(&blob, &UserId::new("u2"), Utc::now(), true)
        .await?;
    assert_eq!(
        outcome,
        ClaimOutcome::ConflictingLedgerOwner,
        "claim by a different user should conflict"
    );

    let rows = store.ledger_rows_for_blob(&blob).await?;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].user_id, UserId::new("u1"), "original claim remains");
    Ok(())
}

async fn test_claim_legacy_expense_conflict(store: &dyn DocumentStore) -> Result<(), StoreError> {
    // Expense references a blob that was never registered (legacy data).
    let blob = BlobId::new("conf-legacy");
    store
        .insert_expense(new_expense("u1", Some("conf-legacy")))
        .await?;

    let outcome = store
        .claim_blob(&blob, &UserId::new("u2"), Utc::now(), true)
        .await?;
    assert_eq!(
        outcome,
        ClaimOutcome::ConflictingExpenseOwner,
        "expense owned by another user should block the claim"
    );
    assert!(
        store.ledger_rows_for_blob(&blob).await?.is_empty(),
        "conflicting claim must not write a row"
    );
    Ok(())
}

async fn test_claim_legacy_expense_same_user(store: &dyn DocumentStore) -> Result<(), StoreError> {
    let blob = BlobId::new("conf-legacy-self");
    store
        .insert_expense(new_expense("u1", Some("conf-legacy-self")))
        .await?;

    let outcome = store
        .claim_blob(&blob, &UserId::new("u1"), Utc::now(), true)
        .await?;
    assert_eq!(
        outcome,
        ClaimOutcome::Claimed,
        "the expense owner may still register their own blob"
    );
    Ok(())
}

async fn test_claim_legacy_check_disabled(store: &dyn DocumentStore) -> Result<(), StoreError> {
    let blob = BlobId::new("conf-legacy-off");
    store
        .insert_expense(new_expense("u1", Some("conf-legacy-off")))
        .await?;

    // With the legacy fallback disabled the expense check is skipped.
    let outcome = store
        .claim_blob(&blob, &UserId::new("u2"), Utc::now(), false)
        .await?;
    assert_eq!(outcome, ClaimOutcome::Claimed);
    Ok(())
}

async fn test_delete_ledger_rows(store: &dyn DocumentStore) -> Result<(), StoreError> {
    let blob = BlobId::new("conf-delete");
    store
        .claim_blob(&blob, &UserId::new("u1"), Utc::now(), true)
        .await?;

    let removed = store.delete_ledger_rows(&blob).await?;
    assert_eq!(removed, 1);
    assert!(store.ledger_rows_for_blob(&blob).await?.is_empty());

    let removed = store.delete_ledger_rows(&blob).await?;
    assert_eq!(removed, 0, "second delete should be a tolerated no-op");
    Ok(())
}

async fn test_ledger_range_scan(store: &dyn DocumentStore) -> Result<(), StoreError> {
    let now = Utc::now();
    for (name, age_hours) in [("conf-scan-a", 72), ("conf-scan-b", 48), ("conf-scan-c", 1)] {
        store
            .claim_blob(
                &BlobId::new(name),
                &UserId::new("u1"),
                now - Duration::hours(age_hours),
                true,
            )
            .await?;
    }

    let cutoff = now - Duration::hours(24);
    let rows = store.ledger_rows_older_than(cutoff, 10).await?;
    let ids: Vec<&str> = rows.iter().map(|r| r.blob_id.as_str()).collect();
    assert_eq!(
        ids,
        vec!["conf-scan-a", "conf-scan-b"],
        "scan should return rows past the cutoff, oldest first"
    );

    let rows = store.ledger_rows_older_than(cutoff, 1).await?;
    assert_eq!(rows.len(), 1, "scan should honor the limit");
    assert_eq!(rows[0].blob_id.as_str(), "conf-scan-a");
    Ok(())
}

async fn test_expense_reference_queries(store: &dyn DocumentStore) -> Result<(), StoreError> {
    let blob = BlobId::new("conf-ref");
    store
        .insert_expense(new_expense("u1", Some("conf-ref")))
        .await?;

    assert!(store.any_expense_references(&blob).await?);
    assert!(
        store
            .expense_referencing(&UserId::new("u1"), &blob)
            .await?
            .is_some()
    );
    assert!(
        store
            .expense_referencing(&UserId::new("u2"), &blob)
            .await?
            .is_none(),
        "user-scoped lookup must not see another user's expense"
    );
    assert!(!store.any_expense_references(&BlobId::new("conf-ref-none")).await?);
    Ok(())
}

async fn test_expense_crud(store: &dyn DocumentStore) -> Result<(), StoreError> {
    let id = store.insert_expense(new_expense("u1", None)).await?;

    let expense = store.get_expense(&id).await?.expect("inserted expense");
    assert_eq!(expense.user_id, UserId::new("u1"));
    assert_eq!(expense.amount_cents, 999);

    let mut patch = expense.to_patch();
    patch.merchant = "Other Merchant".into();
    store.patch_expense(&id, patch).await?;
    let expense = store.get_expense(&id).await?.expect("patched expense");
    assert_eq!(expense.merchant, "Other Merchant");

    let mine = store.expenses_for_user(&UserId::new("u1")).await?;
    assert!(mine.iter().any(|e| e.id == id));

    store.delete_expense(&id).await?;
    assert!(store.get_expense(&id).await?.is_none());
    assert!(matches!(
        store.delete_expense(&id).await,
        Err(StoreError::NotFound(_))
    ));
    Ok(())
}
