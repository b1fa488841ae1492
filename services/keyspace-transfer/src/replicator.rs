use futures_util::StreamExt;
use indicatif::ProgressBar;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, info, warn};

use svckit::database::{DatabaseConnection, QueryBuilder};
use svckit::errors::SyncError;
use svckit::metrics::{self, RowOutcome};
use svckit::types::{TableReport, TableSchema, TableStatus};

use crate::job::ReplicationJob;
use crate::signal::JobSignal;
use crate::write_pool::WritePool;

/// A table that stopped before its scan finished.
#[derive(Debug)]
pub struct TableFailure {
    pub report: TableReport,
    pub error: SyncError,
}

#[derive(Debug, Default)]
struct RowCounts {
    read: u64,
    skipped: u64,
    empty: u64,
    written: u64,
    failed: u64,
}

impl RowCounts {
    fn report(&self, table: &str, status: TableStatus) -> TableReport {
        TableReport {
            table: table.to_string(),
            rows_read: self.read,
            rows_skipped: self.skipped,
            rows_empty: self.empty,
            rows_written: self.written,
            rows_failed: self.failed,
            status,
        }
    }
}

type WriteResult = Result<(), SyncError>;

/// Streams one source table into the destination keyspace.
pub struct TableReplicator {
    job: Arc<ReplicationJob>,
    schema: Arc<TableSchema>,
    source: Arc<dyn DatabaseConnection>,
    target: Arc<dyn DatabaseConnection>,
    pool: WritePool,
    signal: Arc<JobSignal>,
    progress: ProgressBar,
    label: String,
}

impl TableReplicator {
    pub fn new(
        job: Arc<ReplicationJob>,
        schema: Arc<TableSchema>,
        source: Arc<dyn DatabaseConnection>,
        target: Arc<dyn DatabaseConnection>,
        pool: WritePool,
        signal: Arc<JobSignal>,
        progress: ProgressBar,
    ) -> Self {
        let label = format!("{}.{}", job.source_keyspace, schema.name);
        Self {
            job,
            schema,
            source,
            target,
            pool,
            signal,
            progress,
            label,
        }
    }

    pub async fn run(self) -> Result<TableReport, TableFailure> {
        info!("Starting table {}", self.label);
        self.progress.set_message(format!("{}: 0 rows", self.label));

        let mut counts = RowCounts::default();
        let start = Instant::now();

        match self.copy_rows(&mut counts).await {
            Ok(()) => {
                let status = if counts.failed > 0 {
                    TableStatus::FailedPartial {
                        failed_rows: counts.failed,
                    }
                } else {
                    TableStatus::Completed
                };

                info!(
                    "{}: {} rows written in {:?} ({} read, {} skipped, {} empty, {} failed)",
                    self.label,
                    counts.written,
                    start.elapsed(),
                    counts.read,
                    counts.skipped,
                    counts.empty,
                    counts.failed
                );
                self.progress
                    .finish_with_message(format!("{}: {} rows", self.label, counts.written));

                Ok(counts.report(&self.schema.name, status))
            }
            Err(error) => {
                if !matches!(error, SyncError::Aborted(_)) {
                    self.signal.abort(format!("{}: {}", self.label, error));
                }
                self.progress
                    .abandon_with_message(format!("{}: failed after {} rows", self.label, counts.written));

                let report = counts.report(
                    &self.schema.name,
                    TableStatus::FailedFatal {
                        reason: error.to_string(),
                    },
                );
                Err(TableFailure { report, error })
            }
        }
    }

    async fn copy_rows(&self, counts: &mut RowCounts) -> Result<(), SyncError> {
        let select = QueryBuilder::build_select_query(&self.job.source_keyspace, &self.schema.name);
        debug!("Scanning {}: {}", self.label, select);
        let mut rows = self.source.scan(&select).await?;

        // Dropping the set aborts whatever is still in flight.
        let mut writes: JoinSet<WriteResult> = JoinSet::new();

        while let Some(row) = rows.next().await {
            if self.signal.is_aborted() {
                return Err(SyncError::Aborted(self.signal.cause().unwrap_or_default()));
            }

            let row = row?;
            counts.read += 1;

            if counts.read <= self.job.skip_rows {
                counts.skipped += 1;
                metrics::record_row(&self.label, RowOutcome::Skipped);
                if counts.skipped % self.job.progress.skip_interval.max(1) == 0 {
                    info!("{}: {} skipped rows", self.label, counts.skipped);
                }
                continue;
            }

            let statement = QueryBuilder::build_insert(
                &self.job.target_keyspace,
                &self.schema,
                &row,
                self.job.blank_policy,
            )?;
            let Some(statement) = statement else {
                counts.empty += 1;
                metrics::record_row(&self.label, RowOutcome::Empty);
                continue;
            };

            while let Some(done) = writes.try_join_next() {
                self.settle(done, counts)?;
            }

            let permit = self.pool.acquire().await?;
            let target = self.target.clone();
            let label = self.label.clone();

            writes.spawn(async move {
                let start = Instant::now();
                let result = target.execute(statement.text()).await;
                metrics::record_operation(
                    "insert",
                    &label,
                    result.is_ok(),
                    start.elapsed().as_secs_f64(),
                );
                drop(permit);

                result.map_err(|e| SyncError::RowWriteError {
                    table: label,
                    statement: statement.text().to_string(),
                    reason: e.to_string(),
                })
            });
        }

        while let Some(done) = writes.join_next().await {
            self.settle(done, counts)?;
        }

        Ok(())
    }

    fn settle(
        &self,
        done: Result<WriteResult, JoinError>,
        counts: &mut RowCounts,
    ) -> Result<(), SyncError> {
        let result = done.map_err(|e| {
            SyncError::Aborted(format!("write task for {} did not finish: {}", self.label, e))
        })?;

        match result {
            Ok(()) => {
                counts.written += 1;
                metrics::record_row(&self.label, RowOutcome::Written);
                self.progress.inc(1);
                if counts.written % self.job.progress.write_interval.max(1) == 0 {
                    info!("{}: {} rows", self.label, counts.written);
                    self.progress
                        .set_message(format!("{}: {} rows", self.label, counts.written));
                }
                Ok(())
            }
            Err(e) if e.is_row_write() && self.job.skip_row_errors => {
                counts.failed += 1;
                metrics::record_row(&self.label, RowOutcome::Failed);
                warn!("Skipping row: {}", e);
                Ok(())
            }
            Err(e) => {
                counts.failed += 1;
                metrics::record_row(&self.label, RowOutcome::Failed);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{job, user_rows, users_table, MemoryConnection};
    use svckit::types::{ColumnValue, RowData};

    fn replicator(
        job: ReplicationJob,
        source: Arc<MemoryConnection>,
        target: Arc<MemoryConnection>,
        signal: Arc<JobSignal>,
    ) -> TableReplicator {
        let pool = WritePool::new(job.writer_concurrency);
        TableReplicator::new(
            Arc::new(job),
            Arc::new(users_table()),
            source,
            target,
            pool,
            signal,
            ProgressBar::hidden(),
        )
    }

    #[tokio::test]
    async fn test_copies_every_row() {
        let source = Arc::new(MemoryConnection::new().with_rows("users", user_rows(25)));
        let target = Arc::new(MemoryConnection::new());

        let report = replicator(job("ks", "ks2"), source, target.clone(), Arc::new(JobSignal::new()))
            .run()
            .await
            .unwrap();

        assert_eq!(report.rows_read, 25);
        assert_eq!(report.rows_written, 25);
        assert_eq!(report.status, TableStatus::Completed);

        let inserts = target.inserts();
        assert_eq!(inserts.len(), 25);
        assert!(inserts.contains(&"INSERT INTO ks2.users (id,name) VALUES (7,'user7')".to_string()));
    }

    #[tokio::test]
    async fn test_skip_rows_resumes_after_offset() {
        let source = Arc::new(MemoryConnection::new().with_rows("users", user_rows(200)));
        let target = Arc::new(MemoryConnection::new());
        let mut job = job("ks", "ks");
        job.skip_rows = 50;

        let report = replicator(job, source, target.clone(), Arc::new(JobSignal::new()))
            .run()
            .await
            .unwrap();

        assert_eq!(report.rows_read, 200);
        assert_eq!(report.rows_skipped, 50);
        assert_eq!(report.rows_written, 150);

        let inserts = target.inserts();
        assert_eq!(inserts.len(), 150);
        assert!(!inserts.iter().any(|s| s.contains("'user50'")));
        assert!(inserts.iter().any(|s| s.contains("'user51'")));
    }

    #[tokio::test]
    async fn test_skipped_row_errors_do_not_abort() {
        let source = Arc::new(MemoryConnection::new().with_rows("users", user_rows(10)));
        let target = Arc::new(MemoryConnection::new().rejecting("'user4'"));
        let signal = Arc::new(JobSignal::new());
        let mut job = job("ks", "ks");
        job.skip_row_errors = true;

        let report = replicator(job, source, target.clone(), signal.clone())
            .run()
            .await
            .unwrap();

        assert_eq!(report.rows_written, 9);
        assert_eq!(report.rows_failed, 1);
        assert_eq!(report.status, TableStatus::FailedPartial { failed_rows: 1 });
        assert_eq!(target.inserts().len(), 9);
        assert!(!signal.is_aborted());
    }

    #[tokio::test]
    async fn test_row_error_is_fatal_without_skip() {
        let source = Arc::new(MemoryConnection::new().with_rows("users", user_rows(10)));
        let target = Arc::new(MemoryConnection::new().rejecting("'user4'"));
        let signal = Arc::new(JobSignal::new());

        let failure = replicator(job("ks", "ks"), source, target, signal.clone())
            .run()
            .await
            .unwrap_err();

        assert!(failure.error.is_row_write());
        assert!(matches!(failure.report.status, TableStatus::FailedFatal { .. }));
        assert!(signal.is_aborted());
        assert!(signal.cause().unwrap().contains("ks.users"));
    }

    #[tokio::test]
    async fn test_blank_rows_issue_no_write() {
        let rows = vec![
            RowData::new()
                .with("id", ColumnValue::Int(0))
                .with("name", ColumnValue::Text(String::new())),
            RowData::new()
                .with("id", ColumnValue::Null)
                .with("name", ColumnValue::Null),
            RowData::new()
                .with("id", ColumnValue::Int(1))
                .with("name", ColumnValue::Null),
        ];
        let source = Arc::new(MemoryConnection::new().with_rows("users", rows));
        let target = Arc::new(MemoryConnection::new());

        let report = replicator(job("ks", "ks"), source, target.clone(), Arc::new(JobSignal::new()))
            .run()
            .await
            .unwrap();

        assert_eq!(report.rows_read, 3);
        assert_eq!(report.rows_empty, 2);
        assert_eq!(target.inserts(), vec!["INSERT INTO ks.users (id) VALUES (1)".to_string()]);
    }

    #[tokio::test]
    async fn test_encoding_error_is_fatal() {
        let rows = vec![RowData::new().with("id", ColumnValue::Text("one".to_string()))];
        let source = Arc::new(MemoryConnection::new().with_rows("users", rows));
        let target = Arc::new(MemoryConnection::new());
        let signal = Arc::new(JobSignal::new());
        let mut job = job("ks", "ks");
        job.skip_row_errors = true;

        let failure = replicator(job, source, target, signal.clone())
            .run()
            .await
            .unwrap_err();

        assert!(matches!(failure.error, SyncError::EncodingError(_)));
        assert!(signal.is_aborted());
    }

    #[tokio::test]
    async fn test_stops_when_job_is_aborted() {
        let source = Arc::new(MemoryConnection::new().with_rows("users", user_rows(5)));
        let target = Arc::new(MemoryConnection::new());
        let signal = Arc::new(JobSignal::new());
        signal.abort("ks.orders: write rejected");

        let failure = replicator(job("ks", "ks"), source, target.clone(), signal.clone())
            .run()
            .await
            .unwrap_err();

        assert!(matches!(failure.error, SyncError::Aborted(_)));
        assert!(target.inserts().is_empty());
        assert_eq!(signal.cause().as_deref(), Some("ks.orders: write rejected"));
    }
}
