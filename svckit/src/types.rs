use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;
use uuid::Uuid;

use crate::cql_type::ColumnType;
use crate::errors::SyncError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnKind {
    PartitionKey,
    Clustering,
    Static,
    Regular,
}

impl ColumnKind {
    /// Map the `kind` column of `system_schema.columns`.
    pub fn from_schema(kind: &str) -> Option<Self> {
        match kind {
            "partition_key" => Some(ColumnKind::PartitionKey),
            "clustering" => Some(ColumnKind::Clustering),
            "static" => Some(ColumnKind::Static),
            "regular" => Some(ColumnKind::Regular),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClusteringOrder {
    Asc,
    Desc,
}

impl ClusteringOrder {
    /// `asc` / `desc` as reported by the cluster; `none` means no explicit order.
    pub fn from_schema(order: &str) -> Option<Self> {
        match order.to_ascii_lowercase().as_str() {
            "asc" => Some(ClusteringOrder::Asc),
            "desc" => Some(ClusteringOrder::Desc),
            _ => None,
        }
    }
}

impl fmt::Display for ClusteringOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClusteringOrder::Asc => f.write_str("ASC"),
            ClusteringOrder::Desc => f.write_str("DESC"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDescriptor {
    pub name: String,
    pub column_type: ColumnType,
    pub kind: ColumnKind,
    pub clustering_order: Option<ClusteringOrder>,
}

impl ColumnDescriptor {
    pub fn new(name: impl Into<String>, column_type: ColumnType, kind: ColumnKind) -> Self {
        Self {
            name: name.into(),
            column_type,
            kind,
            clustering_order: None,
        }
    }

    pub fn partition_key(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self::new(name, column_type, ColumnKind::PartitionKey)
    }

    pub fn clustering(
        name: impl Into<String>,
        column_type: ColumnType,
        order: Option<ClusteringOrder>,
    ) -> Self {
        Self {
            clustering_order: order,
            ..Self::new(name, column_type, ColumnKind::Clustering)
        }
    }

    pub fn regular(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self::new(name, column_type, ColumnKind::Regular)
    }
}

/// Schema of one table. Column order is the declared order and is preserved in DDL.
#[derive(Debug, Clone, PartialEq)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<ColumnDescriptor>,
    pub partition_key: Vec<String>,
    pub clustering_key: Vec<String>,
}

impl TableSchema {
    /// Build a schema whose key lists follow the order the key columns appear in `columns`.
    pub fn new(name: impl Into<String>, columns: Vec<ColumnDescriptor>) -> Self {
        let names_of = |kind: ColumnKind| {
            columns
                .iter()
                .filter(|c| c.kind == kind)
                .map(|c| c.name.clone())
                .collect::<Vec<_>>()
        };
        let partition_key = names_of(ColumnKind::PartitionKey);
        let clustering_key = names_of(ColumnKind::Clustering);

        Self {
            name: name.into(),
            columns,
            partition_key,
            clustering_key,
        }
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Every key column must exist, and there must be at least one partition column.
    pub fn validate(&self) -> Result<(), SyncError> {
        if self.partition_key.is_empty() {
            return Err(SyncError::SchemaError(format!(
                "table {} has no partition key",
                self.name
            )));
        }

        for key in self.partition_key.iter().chain(&self.clustering_key) {
            if self.column(key).is_none() {
                return Err(SyncError::SchemaError(format!(
                    "key column {} is not a column of table {}",
                    key, self.name
                )));
            }
        }

        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct KeyspaceMetadata {
    pub name: String,
    pub tables: Vec<TableSchema>,
}

impl KeyspaceMetadata {
    pub fn table(&self, name: &str) -> Option<&TableSchema> {
        self.tables.iter().find(|t| t.name == name)
    }
}

/// A dynamically typed cell value as read from the source cluster.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnValue {
    Null,
    Text(String),
    TinyInt(i8),
    SmallInt(i16),
    Int(i32),
    BigInt(i64),
    Counter(i64),
    Float(f32),
    Double(f64),
    Boolean(bool),
    /// Milliseconds since the Unix epoch.
    Timestamp(i64),
    Date(NaiveDate),
    /// Nanoseconds since midnight.
    Time(i64),
    Uuid(Uuid),
    Inet(IpAddr),
    Blob(Vec<u8>),
    List(Vec<ColumnValue>),
    Set(Vec<ColumnValue>),
    Map(Vec<(ColumnValue, ColumnValue)>),
    /// A driver value this tool cannot express as a literal.
    Unsupported(String),
}

impl ColumnValue {
    /// Short name of the runtime shape, for error messages.
    pub fn shape(&self) -> &'static str {
        match self {
            ColumnValue::Null => "null",
            ColumnValue::Text(_) => "text",
            ColumnValue::TinyInt(_) => "tinyint",
            ColumnValue::SmallInt(_) => "smallint",
            ColumnValue::Int(_) => "int",
            ColumnValue::BigInt(_) => "bigint",
            ColumnValue::Counter(_) => "counter",
            ColumnValue::Float(_) => "float",
            ColumnValue::Double(_) => "double",
            ColumnValue::Boolean(_) => "boolean",
            ColumnValue::Timestamp(_) => "timestamp",
            ColumnValue::Date(_) => "date",
            ColumnValue::Time(_) => "time",
            ColumnValue::Uuid(_) => "uuid",
            ColumnValue::Inet(_) => "inet",
            ColumnValue::Blob(_) => "blob",
            ColumnValue::List(_) => "list",
            ColumnValue::Set(_) => "set",
            ColumnValue::Map(_) => "map",
            ColumnValue::Unsupported(_) => "unsupported",
        }
    }
}

/// One source row, columns kept in result-set order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowData {
    pub columns: Vec<(String, ColumnValue)>,
}

impl RowData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: ColumnValue) -> Self {
        self.columns.push((name.into(), value));
        self
    }

    pub fn get(&self, name: &str) -> Option<&ColumnValue> {
        self.columns
            .iter()
            .find(|(column, _)| column == name)
            .map(|(_, value)| value)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

impl FromIterator<(String, ColumnValue)> for RowData {
    fn from_iter<I: IntoIterator<Item = (String, ColumnValue)>>(iter: I) -> Self {
        Self {
            columns: iter.into_iter().collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TableStatus {
    Completed,
    FailedPartial { failed_rows: u64 },
    FailedFatal { reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableReport {
    pub table: String,
    /// Every row read from the source, skipped or not.
    pub rows_read: u64,
    /// Rows below the resume offset.
    pub rows_skipped: u64,
    /// Rows whose every column was dropped, so no write was issued.
    pub rows_empty: u64,
    pub rows_written: u64,
    pub rows_failed: u64,
    pub status: TableStatus,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobReport {
    pub source_keyspace: String,
    pub target_keyspace: String,
    pub tables: Vec<TableReport>,
}

impl JobReport {
    pub fn rows_written(&self) -> u64 {
        self.tables.iter().map(|t| t.rows_written).sum()
    }

    pub fn rows_failed(&self) -> u64 {
        self.tables.iter().map(|t| t.rows_failed).sum()
    }
}
