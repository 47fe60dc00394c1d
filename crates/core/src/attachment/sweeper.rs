//! Background reaping of expired TEMP attachments.
//!
//! A run scans a bounded batch of expired TEMP rows, deletes their objects,
//! then soft-deletes the rows with a conditional update that only touches
//! rows that are still expired TEMP rows. A row confirmed in the meantime is
//! left alone. Rows whose object could not be deleted stay in place so the
//! next run retries them. An object that another live row still references
//! is kept while the expired row is reaped.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::service::AttachmentRepository;
use crate::storage::ObjectStorage;

/// Sweeper scheduling settings.
#[derive(Debug, Clone, Copy)]
pub struct SweeperConfig {
    /// Time between runs.
    pub interval: Duration,
    /// Maximum rows handled per run.
    pub batch_size: u64,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(300),
            batch_size: 500,
        }
    }
}

/// Outcome of a single sweep run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Expired TEMP rows found.
    pub scanned: usize,
    /// Objects deleted (absent objects included).
    pub objects_deleted: usize,
    /// Object deletes that failed; their rows were kept for the next run.
    pub storage_failures: usize,
    /// Objects kept because another live row references them.
    pub objects_shared: usize,
    /// Rows soft-deleted.
    pub rows_reaped: u64,
    /// Repository calls that failed.
    pub store_errors: usize,
}

impl SweepReport {
    /// Returns true if the run found nothing to do.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.scanned == 0 && self.store_errors == 0
    }
}

/// Periodically removes TEMP attachments that were never confirmed.
pub struct ExpirationSweeper<S: ObjectStorage, R: AttachmentRepository> {
    storage: Arc<S>,
    repo: Arc<R>,
    config: SweeperConfig,
}

impl<S: ObjectStorage, R: AttachmentRepository> ExpirationSweeper<S, R> {
    /// Create a sweeper sharing the service's storage and repository.
    #[must_use]
    pub fn new(storage: Arc<S>, repo: Arc<R>, config: SweeperConfig) -> Self {
        Self {
            storage,
            repo,
            config,
        }
    }

    /// Run forever on the configured interval.
    ///
    /// Failures are logged and never stop the loop.
    pub async fn run(self) {
        info!(
            interval_secs = self.config.interval.as_secs(),
            batch_size = self.config.batch_size,
            "expiration sweeper started"
        );

        let mut ticker = tokio::time::interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            self.sweep_once(Utc::now()).await;
        }
    }

    /// Perform one sweep as of `now`.
    pub async fn sweep_once(&self, now: DateTime<Utc>) -> SweepReport {
        let mut report = SweepReport::default();

        let candidates = match self
            .repo
            .find_expired_temp(now, self.config.batch_size)
            .await
        {
            Ok(candidates) => candidates,
            Err(e) => {
                error!(error = %e, "sweeper: failed to scan expired attachments");
                report.store_errors += 1;
                return report;
            }
        };

        if candidates.is_empty() {
            return report;
        }
        report.scanned = candidates.len();

        let mut reapable: Vec<Uuid> = Vec::with_capacity(candidates.len());
        for attachment in &candidates {
            match self.repo.find_by_storage_key(&attachment.storage_key).await {
                Ok(rows) if rows.iter().any(|a| a.id != attachment.id) => {
                    debug!(
                        attachment_id = %attachment.id,
                        storage_key = %attachment.storage_key,
                        "sweeper: object still referenced, keeping it"
                    );
                    report.objects_shared += 1;
                    reapable.push(attachment.id);
                    continue;
                }
                Ok(_) => {}
                Err(e) => {
                    error!(
                        attachment_id = %attachment.id,
                        error = %e,
                        "sweeper: failed to check object references"
                    );
                    report.store_errors += 1;
                    continue;
                }
            }

            match self.storage.delete(&attachment.storage_key).await {
                Ok(()) => {
                    report.objects_deleted += 1;
                    reapable.push(attachment.id);
                }
                Err(e) => {
                    warn!(
                        attachment_id = %attachment.id,
                        storage_key = %attachment.storage_key,
                        error = %e,
                        "sweeper: failed to delete object, will retry"
                    );
                    report.storage_failures += 1;
                }
            }
        }

        if !reapable.is_empty() {
            match self.repo.delete_expired_batch(&reapable, now).await {
                Ok(reaped) => report.rows_reaped = reaped,
                Err(e) => {
                    error!(error = %e, rows = reapable.len(), "sweeper: failed to reap rows");
                    report.store_errors += 1;
                }
            }
        }

        info!(
            scanned = report.scanned,
            objects_deleted = report.objects_deleted,
            storage_failures = report.storage_failures,
            objects_shared = report.objects_shared,
            rows_reaped = report.rows_reaped,
            "sweeper: run complete"
        );
        debug!(?report, "sweep report");

        report
    }
}
