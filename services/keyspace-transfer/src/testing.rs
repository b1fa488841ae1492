//! In-memory cluster used by the transfer tests.

use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use svckit::config::{DatabaseConfig, ReplicationConfig};
use svckit::cql_type::ScalarType;
use svckit::database::{BlankPolicy, DatabaseConnection, RowStream};
use svckit::errors::SyncError;
use svckit::types::{ColumnDescriptor, ColumnValue, KeyspaceMetadata, RowData, TableSchema};

use crate::config::ProgressConfig;
use crate::job::ReplicationJob;

#[derive(Default)]
pub struct MemoryConnection {
    keyspaces: HashMap<String, KeyspaceMetadata>,
    rows: HashMap<String, Vec<RowData>>,
    rejects: Vec<String>,
    executed: Mutex<Vec<String>>,
    write_delay: Option<Duration>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl MemoryConnection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_keyspace(mut self, name: &str, tables: Vec<TableSchema>) -> Self {
        self.keyspaces.insert(
            name.to_string(),
            KeyspaceMetadata {
                name: name.to_string(),
                tables,
            },
        );
        self
    }

    pub fn with_rows(mut self, table: &str, rows: Vec<RowData>) -> Self {
        self.rows.insert(table.to_string(), rows);
        self
    }

    /// Fail every statement containing `needle`.
    pub fn rejecting(mut self, needle: &str) -> Self {
        self.rejects.push(needle.to_string());
        self
    }

    /// Hold every statement for `delay` before it completes.
    pub fn with_write_delay(mut self, delay: Duration) -> Self {
        self.write_delay = Some(delay);
        self
    }

    /// Most statements that were executing at the same time.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().clone()
    }

    pub fn inserts(&self) -> Vec<String> {
        self.executed()
            .into_iter()
            .filter(|s| s.starts_with("INSERT"))
            .collect()
    }
}

#[async_trait]
impl DatabaseConnection for MemoryConnection {
    async fn execute(&self, statement: &str) -> Result<(), SyncError> {
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(running, Ordering::SeqCst);

        if let Some(delay) = self.write_delay {
            tokio::time::sleep(delay).await;
        }

        let result = if self.rejects.iter().any(|r| statement.contains(r.as_str())) {
            Err(SyncError::DatabaseError(format!("rejected: {}", statement)))
        } else {
            self.executed.lock().push(statement.to_string());
            Ok(())
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn keyspace_metadata(&self, keyspace: &str) -> Result<KeyspaceMetadata, SyncError> {
        self.keyspaces
            .get(keyspace)
            .cloned()
            .ok_or_else(|| SyncError::ConfigError(format!("Keyspace {} does not exist", keyspace)))
    }

    async fn scan(&self, statement: &str) -> Result<RowStream, SyncError> {
        let table = statement
            .rsplit('.')
            .next()
            .unwrap_or_default()
            .trim_matches('"');
        let rows = self.rows.get(table).cloned().unwrap_or_default();
        Ok(stream::iter(rows.into_iter().map(Ok)).boxed())
    }
}

/// `users (id int PRIMARY KEY, name text)`
pub fn users_table() -> TableSchema {
    TableSchema::new(
        "users",
        vec![
            ColumnDescriptor::partition_key("id", ScalarType::Int.into()),
            ColumnDescriptor::regular("name", ScalarType::Text.into()),
        ],
    )
}

pub fn user_rows(count: i32) -> Vec<RowData> {
    (1..=count)
        .map(|id| {
            RowData::new()
                .with("id", ColumnValue::Int(id))
                .with("name", ColumnValue::Text(format!("user{}", id)))
        })
        .collect()
}

pub fn job(source_keyspace: &str, target_keyspace: &str) -> ReplicationJob {
    ReplicationJob {
        source: DatabaseConfig::default(),
        target: DatabaseConfig::default(),
        source_keyspace: source_keyspace.to_string(),
        target_keyspace: target_keyspace.to_string(),
        table_filter: None,
        skip_create_tables: false,
        skip_row_errors: false,
        skip_rows: 0,
        writer_concurrency: 4,
        blank_policy: BlankPolicy::Lenient,
        replication: ReplicationConfig::default(),
        progress: ProgressConfig::default(),
    }
}
