//! Reconciliation sweep for transactions the gateway never confirmed.
//!
//! Runs on a fixed interval. The stale set is read as a snapshot; each
//! force-fail re-checks the status in its WHERE clause, so a callback that
//! lands between snapshot and update wins the row and the sweep just
//! reports it skipped. Overlapping sweeps are harmless for the same
//! reason.

use chrono::{Duration as ChronoDuration, Utc};
use sqlx::PgPool;
use tokio::time::{sleep, Duration};
use tracing::{error, info, warn};

use crate::db::queries;

/// Annotation distinguishing sweep-failed rows from rows the gateway
/// itself declined.
pub const STALE_ERROR_MESSAGE: &str =
    "gateway never confirmed the transaction within the staleness window";

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub examined: usize,
    pub swept: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Background sweep loop. Per-batch errors are logged and the loop keeps
/// going; there is no terminal condition short of process shutdown.
pub async fn run_sweeper(pool: PgPool, interval_secs: u64, stale_after_secs: i64) {
    info!(
        interval_secs,
        stale_after_secs, "reconciliation sweeper started"
    );

    loop {
        sleep(Duration::from_secs(interval_secs)).await;

        match sweep_batch(&pool, stale_after_secs).await {
            Ok(report) => {
                if report.examined > 0 {
                    info!(
                        examined = report.examined,
                        swept = report.swept,
                        skipped = report.skipped,
                        failed = report.failed,
                        "reconciliation sweep completed"
                    );
                }
            }
            Err(e) => error!("reconciliation sweep batch error: {}", e),
        }
    }
}

/// One sweep pass: force-fail every row still INITIATED or PROCESSING past
/// the staleness threshold. A failure on one row never aborts the rest of
/// the batch.
pub async fn sweep_batch(pool: &PgPool, stale_after_secs: i64) -> Result<SweepReport, sqlx::Error> {
    let cutoff = Utc::now() - ChronoDuration::seconds(stale_after_secs);
    let stale = queries::find_stale(pool, cutoff).await?;

    let mut report = SweepReport {
        examined: stale.len(),
        ..SweepReport::default()
    };

    for tx in stale {
        match queries::force_fail_stale(pool, &tx.txnid, STALE_ERROR_MESSAGE, Utc::now()).await {
            Ok(true) => {
                report.swept += 1;
                info!(txnid = %tx.txnid, created_at = %tx.created_at, "stale transaction marked failed");
            }
            Ok(false) => {
                // A callback resolved the row between snapshot and update.
                report.skipped += 1;
                info!(txnid = %tx.txnid, "stale transaction resolved by a late callback, skipped");
            }
            Err(e) => {
                report.failed += 1;
                warn!(txnid = %tx.txnid, "failed to sweep stale transaction: {}", e);
            }
        }
    }

    Ok(report)
}
