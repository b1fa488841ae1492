use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use tracing::{error, info};

use svckit::database::{DatabaseConnection, QueryBuilder};
use svckit::errors::SyncError;
use svckit::metrics;
use svckit::types::{JobReport, KeyspaceMetadata, TableReport, TableSchema};

use crate::job::ReplicationJob;
use crate::replicator::TableReplicator;
use crate::signal::JobSignal;
use crate::write_pool::WritePool;

/// Creates the destination keyspace and tables, then runs one
/// [`TableReplicator`] per source table concurrently.
pub struct KeyspaceTransfer {
    job: Arc<ReplicationJob>,
    source: Arc<dyn DatabaseConnection>,
    target: Arc<dyn DatabaseConnection>,
    signal: Arc<JobSignal>,
    progress: MultiProgress,
}

impl KeyspaceTransfer {
    pub fn new(
        job: ReplicationJob,
        source: Arc<dyn DatabaseConnection>,
        target: Arc<dyn DatabaseConnection>,
    ) -> Self {
        Self {
            job: Arc::new(job),
            source,
            target,
            signal: Arc::new(JobSignal::new()),
            progress: MultiProgress::new(),
        }
    }

    pub fn with_progress(mut self, progress: MultiProgress) -> Self {
        self.progress = progress;
        self
    }

    pub async fn run(&self) -> Result<JobReport, SyncError> {
        let start = Instant::now();
        info!(
            "Transferring keyspace {} ({}) to {} ({})",
            self.job.source_keyspace,
            self.job.source.endpoint,
            self.job.target_keyspace,
            self.job.target.endpoint
        );

        let metadata = self
            .source
            .keyspace_metadata(&self.job.source_keyspace)
            .await?;
        let tables = self.select_tables(metadata)?;

        self.create_keyspace().await?;

        if self.job.skip_create_tables {
            info!("Skipping table creation on {}", self.job.target_keyspace);
        } else {
            for schema in &tables {
                self.create_table(schema).await?;
            }
        }

        let tables = self.replicate(tables).await?;
        let report = JobReport {
            source_keyspace: self.job.source_keyspace.clone(),
            target_keyspace: self.job.target_keyspace.clone(),
            tables,
        };

        info!(
            "Transferred {} rows across {} tables in {:?} ({} failed)",
            report.rows_written(),
            report.tables.len(),
            start.elapsed(),
            report.rows_failed()
        );

        Ok(report)
    }

    fn select_tables(&self, metadata: KeyspaceMetadata) -> Result<Vec<TableSchema>, SyncError> {
        let tables: Vec<TableSchema> = metadata
            .tables
            .into_iter()
            .filter(|t| self.job.includes_table(&t.name))
            .collect();

        if tables.is_empty() {
            let reason = match &self.job.table_filter {
                Some(filter) => format!(
                    "Table {} not found in keyspace {}",
                    filter, self.job.source_keyspace
                ),
                None => format!("Keyspace {} has no tables", self.job.source_keyspace),
            };
            return Err(SyncError::ConfigError(reason));
        }

        for schema in &tables {
            schema.validate()?;
        }

        info!(
            "Found {} tables to transfer in {}",
            tables.len(),
            self.job.source_keyspace
        );
        Ok(tables)
    }

    async fn create_keyspace(&self) -> Result<(), SyncError> {
        let statement =
            QueryBuilder::build_create_keyspace(&self.job.target_keyspace, &self.job.replication);
        self.apply_schema(statement.text(), "create_keyspace").await
    }

    async fn create_table(&self, schema: &TableSchema) -> Result<(), SyncError> {
        let statement = QueryBuilder::build_create_table(&self.job.target_keyspace, schema);
        self.apply_schema(statement.text(), "create_table").await
    }

    async fn apply_schema(&self, statement: &str, operation: &str) -> Result<(), SyncError> {
        info!("{}", statement);

        let start = Instant::now();
        let result = self.target.execute(statement).await;
        metrics::record_operation(
            operation,
            &self.job.target_keyspace,
            result.is_ok(),
            start.elapsed().as_secs_f64(),
        );

        result.map_err(|e| {
            error!("Schema statement rejected: {}", e);
            SyncError::SchemaCreationError {
                statement: statement.to_string(),
                reason: e.to_string(),
            }
        })
    }

    async fn replicate(&self, tables: Vec<TableSchema>) -> Result<Vec<TableReport>, SyncError> {
        let pool = WritePool::new(self.job.writer_concurrency);
        info!("Writing with up to {} concurrent statements", pool.size());

        let mut tasks = JoinSet::new();
        for schema in tables {
            let replicator = TableReplicator::new(
                self.job.clone(),
                Arc::new(schema),
                self.source.clone(),
                self.target.clone(),
                pool.clone(),
                self.signal.clone(),
                self.spinner(),
            );
            tasks.spawn(replicator.run());
        }

        let mut reports = Vec::with_capacity(tasks.len());
        let mut fatal: Option<SyncError> = None;

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(report)) => reports.push(report),
                Ok(Err(failure)) => {
                    error!(
                        "Table {} failed after {} rows: {}",
                        failure.report.table, failure.report.rows_written, failure.error
                    );
                    self.signal
                        .abort(format!("{}: {}", failure.report.table, failure.error));

                    // Report the root cause, not a table that stopped because of it.
                    let replace = match &fatal {
                        None => true,
                        Some(SyncError::Aborted(_)) => {
                            !matches!(failure.error, SyncError::Aborted(_))
                        }
                        Some(_) => false,
                    };
                    if replace {
                        fatal = Some(failure.error);
                    }
                }
                Err(e) => {
                    error!("Table task did not finish: {}", e);
                    self.signal.abort(e.to_string());
                    fatal.get_or_insert(SyncError::Aborted(e.to_string()));
                }
            }
        }

        if let Some(error) = fatal {
            return Err(error);
        }

        reports.sort_by(|a, b| a.table.cmp(&b.table));
        Ok(reports)
    }

    fn spinner(&self) -> ProgressBar {
        let bar = self.progress.add(ProgressBar::new_spinner());
        if let Ok(style) =
            ProgressStyle::default_spinner().template("{spinner:.cyan} [{elapsed_precise}] {msg}")
        {
            bar.set_style(style);
        }
        bar.enable_steady_tick(Duration::from_millis(120));
        bar
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{job, user_rows, users_table, MemoryConnection};
    use indicatif::ProgressDrawTarget;
    use svckit::cql_type::ScalarType;
    use svckit::types::{ColumnDescriptor, ColumnValue, RowData, TableStatus};

    fn orders_table() -> TableSchema {
        TableSchema::new(
            "orders",
            vec![
                ColumnDescriptor::partition_key("id", ScalarType::Int.into()),
                ColumnDescriptor::clustering("line", ScalarType::Int.into(), None),
                ColumnDescriptor::regular("total", ScalarType::Double.into()),
            ],
        )
    }

    fn order_rows(count: i32) -> Vec<RowData> {
        (1..=count)
            .map(|id| {
                RowData::new()
                    .with("id", ColumnValue::Int(id))
                    .with("line", ColumnValue::Int(1))
                    .with("total", ColumnValue::Double(9.5))
            })
            .collect()
    }

    fn source() -> Arc<MemoryConnection> {
        Arc::new(
            MemoryConnection::new()
                .with_keyspace("shop", vec![orders_table(), users_table()])
                .with_rows("users", user_rows(10))
                .with_rows("orders", order_rows(5)),
        )
    }

    fn transfer(
        job: ReplicationJob,
        source: Arc<MemoryConnection>,
        target: Arc<MemoryConnection>,
    ) -> KeyspaceTransfer {
        KeyspaceTransfer::new(job, source, target)
            .with_progress(MultiProgress::with_draw_target(ProgressDrawTarget::hidden()))
    }

    #[tokio::test]
    async fn test_full_keyspace_transfer() {
        let target = Arc::new(MemoryConnection::new());

        let report = transfer(job("shop", "shop_copy"), source(), target.clone())
            .run()
            .await
            .unwrap();

        assert_eq!(report.target_keyspace, "shop_copy");
        assert_eq!(report.tables.len(), 2);
        assert_eq!(report.tables[0].table, "orders");
        assert_eq!(report.tables[1].table, "users");
        assert_eq!(report.rows_written(), 15);
        assert!(report.tables.iter().all(|t| t.status == TableStatus::Completed));

        let executed = target.executed();
        assert_eq!(
            executed[0],
            "CREATE KEYSPACE IF NOT EXISTS shop_copy WITH REPLICATION = { 'class' : 'SimpleStrategy', 'replication_factor': 3 };"
        );
        assert_eq!(
            executed[1],
            "CREATE TABLE IF NOT EXISTS shop_copy.orders (id int,line int,total double, PRIMARY KEY ((id), line));"
        );
        assert_eq!(
            executed[2],
            "CREATE TABLE IF NOT EXISTS shop_copy.users (id int,name text, PRIMARY KEY ((id)));"
        );
        assert_eq!(target.inserts().len(), 15);
    }

    #[tokio::test]
    async fn test_table_filter() {
        let target = Arc::new(MemoryConnection::new());
        let mut job = job("shop", "shop");
        job.table_filter = Some("users".to_string());

        let report = transfer(job, source(), target.clone()).run().await.unwrap();

        assert_eq!(report.tables.len(), 1);
        assert_eq!(report.tables[0].table, "users");
        assert!(!target.executed().iter().any(|s| s.contains("orders")));
    }

    #[tokio::test]
    async fn test_unknown_table_filter() {
        let target = Arc::new(MemoryConnection::new());
        let mut job = job("shop", "shop");
        job.table_filter = Some("missing".to_string());

        let err = transfer(job, source(), target.clone()).run().await.unwrap_err();

        assert!(matches!(err, SyncError::ConfigError(_)));
        assert!(target.executed().is_empty());
    }

    #[tokio::test]
    async fn test_keyspace_without_tables() {
        let source = Arc::new(MemoryConnection::new().with_keyspace("empty", Vec::new()));
        let target = Arc::new(MemoryConnection::new());

        let err = transfer(job("empty", "empty"), source, target.clone())
            .run()
            .await
            .unwrap_err();

        assert!(matches!(err, SyncError::ConfigError(_)));
        assert!(target.executed().is_empty());
    }

    #[tokio::test]
    async fn test_skip_create_tables() {
        let target = Arc::new(MemoryConnection::new());
        let mut job = job("shop", "shop");
        job.skip_create_tables = true;

        transfer(job, source(), target.clone()).run().await.unwrap();

        let executed = target.executed();
        assert!(executed[0].starts_with("CREATE KEYSPACE"));
        assert!(!executed.iter().any(|s| s.starts_with("CREATE TABLE")));
        assert_eq!(target.inserts().len(), 15);
    }

    #[tokio::test]
    async fn test_rejected_table_ddl_is_fatal() {
        let target =
            Arc::new(MemoryConnection::new().rejecting("CREATE TABLE IF NOT EXISTS shop.users"));

        let err = transfer(job("shop", "shop"), source(), target.clone())
            .run()
            .await
            .unwrap_err();

        assert!(matches!(err, SyncError::SchemaCreationError { .. }));
        assert!(target.inserts().is_empty());
    }

    #[tokio::test]
    async fn test_row_error_aborts_job() {
        let target = Arc::new(MemoryConnection::new().rejecting("'user3'"));

        let err = transfer(job("shop", "shop"), source(), target)
            .run()
            .await
            .unwrap_err();

        assert!(err.is_row_write());
    }

    #[tokio::test]
    async fn test_row_errors_skipped_when_enabled() {
        let target = Arc::new(MemoryConnection::new().rejecting("'user3'"));
        let mut job = job("shop", "shop");
        job.skip_row_errors = true;
        job.skip_create_tables = true;

        let report = transfer(job, source(), target).run().await.unwrap();

        assert_eq!(report.rows_written(), 14);
        assert_eq!(report.rows_failed(), 1);
        assert_eq!(
            report.tables[1].status,
            TableStatus::FailedPartial { failed_rows: 1 }
        );
    }

    #[tokio::test]
    async fn test_write_pool_bounds_writes_across_tables() {
        let target = Arc::new(MemoryConnection::new().with_write_delay(Duration::from_millis(5)));
        let mut job = job("shop", "shop");
        job.writer_concurrency = 2;

        let report = transfer(job, source(), target.clone()).run().await.unwrap();

        assert_eq!(report.rows_written(), 15);
        assert!(target.peak_in_flight() <= 2);
        assert_eq!(target.peak_in_flight(), 2);
    }

    #[tokio::test]
    async fn test_single_writer_keeps_cursor_order() {
        let target = Arc::new(MemoryConnection::new().with_write_delay(Duration::from_millis(2)));
        let mut job = job("shop", "shop");
        job.writer_concurrency = 1;
        job.table_filter = Some("users".to_string());

        transfer(job, source(), target.clone()).run().await.unwrap();

        let expected: Vec<String> = (1..=10)
            .map(|id| format!("INSERT INTO shop.users (id,name) VALUES ({},'user{}')", id, id))
            .collect();
        assert_eq!(target.inserts(), expected);
        assert_eq!(target.peak_in_flight(), 1);
    }

    #[tokio::test]
    async fn test_missing_source_keyspace() {
        let target = Arc::new(MemoryConnection::new());

        let err = transfer(job("nope", "nope"), source(), target.clone())
            .run()
            .await
            .unwrap_err();

        assert!(matches!(err, SyncError::ConfigError(_)));
        assert!(target.executed().is_empty());
    }
}
