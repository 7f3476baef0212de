use chrono::{TimeDelta, Utc};
use tracing::{debug, info, warn};

use outlay_blob::{BlobStore, DeleteOutcome};
use outlay_store::{DocumentQuery, DocumentStore};

use crate::error::AttachmentError;
use crate::service::AttachmentService;

/// Outcome of one sweep invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Blobs deleted from the blob store.
    pub blobs_deleted: u64,
    /// Ledger rows removed (both orphaned rows and stale rows whose blob is
    /// still in use).
    pub ledger_rows_deleted: u64,
    /// Ledger rows whose blob was referenced by an expense; the blob was
    /// left alone.
    pub stale_rows_in_use: u64,
    /// Individual blob deletions that failed transiently. The batch
    /// continues past them; the next invocation retries.
    pub errors: u64,
}

impl SweepReport {
    fn is_noop(&self) -> bool {
        *self == Self::default()
    }
}

impl AttachmentService {
    /// Reclaim storage for blobs that are no longer reachable from any
    /// expense and are older than the retention threshold.
    ///
    /// Two bounded passes per invocation:
    ///
    /// 1. **Tracked orphans** — ledger rows past the threshold. A row whose
    ///    blob is referenced by any expense is merely stale: only the row is
    ///    removed. An unreferenced row's blob is deleted along with the row.
    /// 2. **Untracked orphans** — blobs past the threshold with no ledger
    ///    row at all (the client uploaded but never completed registration).
    ///    Deleted unless some expense references them.
    ///
    /// A blob referenced by any expense, regardless of owner, is never
    /// deleted: both passes check the unscoped reference index before any
    /// blob delete. Each item is independently committed, so interrupting a
    /// sweep loses no more than the in-flight item and the next invocation
    /// resumes where this one stopped.
    pub async fn run_sweep(&self) -> Result<SweepReport, AttachmentError> {
        let retention = TimeDelta::from_std(self.config().retention).unwrap_or(TimeDelta::MAX);
        let cutoff = Utc::now() - retention;
        let batch_size = self.config().sweep_batch_size;
        let mut report = SweepReport::default();

        // Pass 1: tracked orphans, oldest first.
        let rows = self.docs().ledger_rows_older_than(cutoff, batch_size).await?;
        for row in rows {
            if self.docs().any_expense_references(&row.blob_id).await? {
                // Stale row, blob legitimately in use.
                let removed = self.docs().delete_ledger_rows(&row.blob_id).await?;
                report.ledger_rows_deleted += removed;
                if removed > 0 {
                    report.stale_rows_in_use += 1;
                }
                continue;
            }

            match self.blobs().delete(&row.blob_id).await {
                Ok(DeleteOutcome::Deleted) => report.blobs_deleted += 1,
                Ok(DeleteOutcome::AlreadyAbsent) => {
                    debug!(blob_id = %row.blob_id, "tracked orphan blob was already gone");
                }
                Err(err) => {
                    warn!(
                        blob_id = %row.blob_id,
                        error = %err,
                        "failed to delete tracked orphan blob, removing ledger rows anyway"
                    );
                    report.errors += 1;
                }
            }
            report.ledger_rows_deleted += self.docs().delete_ledger_rows(&row.blob_id).await?;
        }

        // Pass 2: untracked orphans. Catches uploads where registration
        // never completed (transient error, tab closed).
        let handles = self.blobs().list_older_than(cutoff, batch_size).await;
        let handles = match handles {
            Ok(handles) => handles,
            Err(err) => {
                warn!(error = %err, "failed to list blobs for untracked-orphan pass");
                report.errors += 1;
                return Ok(report);
            }
        };

        for handle in handles {
            // Tracked blobs are pass 1's jurisdiction.
            if !self
                .docs()
                .ledger_rows_for_blob(&handle.blob_id)
                .await?
                .is_empty()
            {
                continue;
            }
            // A legitimately attached blob whose ledger row was already
            // cleaned up.
            if self.docs().any_expense_references(&handle.blob_id).await? {
                continue;
            }

            match self.blobs().delete(&handle.blob_id).await {
                Ok(DeleteOutcome::Deleted) => report.blobs_deleted += 1,
                Ok(DeleteOutcome::AlreadyAbsent) => {}
                Err(err) => {
                    warn!(
                        blob_id = %handle.blob_id,
                        error = %err,
                        "failed to delete untracked orphan blob"
                    );
                    report.errors += 1;
                }
            }
        }

        if !report.is_noop() {
            info!(
                blobs_deleted = report.blobs_deleted,
                ledger_rows_deleted = report.ledger_rows_deleted,
                stale_rows_in_use = report.stale_rows_in_use,
                errors = report.errors,
                "orphan sweep complete"
            );
        }

        Ok(report)
    }
}
