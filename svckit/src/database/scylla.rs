use std::collections::{BTreeMap, BTreeSet};
use std::num::NonZeroUsize;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, TimeDelta};
use futures_util::stream::{BoxStream, StreamExt};
use scylla::frame::response::result::{CqlValue, Row};
use scylla::transport::execution_profile::ExecutionProfile;
use scylla::transport::session::PoolSize;
use scylla::{Session, SessionBuilder};
use tracing::{debug, error, info};

use crate::config::DatabaseConfig;
use crate::cql_type::ColumnType;
use crate::errors::SyncError;
use crate::metrics;
use crate::types::{
    ClusteringOrder, ColumnDescriptor, ColumnKind, ColumnValue, KeyspaceMetadata, RowData,
    TableSchema,
};

/// Forward-only stream of rows produced by a scan.
pub type RowStream = BoxStream<'static, Result<RowData, SyncError>>;

/// The operations the transfer needs from a cluster session.
#[async_trait]
pub trait DatabaseConnection: Send + Sync {
    /// Run a statement, discarding any result rows.
    async fn execute(&self, statement: &str) -> Result<(), SyncError>;

    /// Schema of every table in `keyspace`, sorted by table name.
    async fn keyspace_metadata(&self, keyspace: &str) -> Result<KeyspaceMetadata, SyncError>;

    /// Open a cursor over the rows returned by `statement`.
    async fn scan(&self, statement: &str) -> Result<RowStream, SyncError>;
}

/// ScyllaDB / Cassandra session wrapper
pub struct ScyllaConnection {
    session: Arc<Session>,
    config: DatabaseConfig,
}

impl ScyllaConnection {
    /// Open a session against a single contact point.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, SyncError> {
        let contact_point = config.endpoint.contact_point();
        info!("Connecting to cluster: {}", contact_point);

        let pool_size = NonZeroUsize::new(config.pool_size as usize).unwrap_or(NonZeroUsize::MIN);

        let profile = ExecutionProfile::builder()
            .consistency(config.consistency.into())
            .request_timeout(Some(config.request_timeout))
            .build();

        let mut session_builder = SessionBuilder::new()
            .known_node(&contact_point)
            .connection_timeout(config.connection_timeout)
            .pool_size(PoolSize::PerShard(pool_size))
            .default_execution_profile_handle(profile.into_handle());

        if let Some(credentials) = &config.credentials {
            session_builder = session_builder.user(&credentials.username, &credentials.password);
        }

        let session = session_builder.build().await.map_err(|e| {
            error!("Failed to connect to {}: {}", contact_point, e);
            SyncError::ConnectionError(format!("Failed to connect to {}: {}", contact_point, e))
        })?;

        metrics::ACTIVE_CONNECTIONS
            .with_label_values(&[contact_point.as_str()])
            .inc();
        info!("Connected to {} (consistency {:?})", contact_point, config.consistency);

        Ok(Self {
            session: Arc::new(session),
            config: config.clone(),
        })
    }

    pub fn get_session(&self) -> &Session {
        &self.session
    }

    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    async fn keyspace_exists(&self, keyspace: &str) -> Result<bool, SyncError> {
        let result = self
            .session
            .query_unpaged(
                "SELECT keyspace_name FROM system_schema.keyspaces WHERE keyspace_name = ?",
                (keyspace.to_string(),),
            )
            .await?;
        Ok(result.rows_num().unwrap_or(0) > 0)
    }
}

#[async_trait]
impl DatabaseConnection for ScyllaConnection {
    async fn execute(&self, statement: &str) -> Result<(), SyncError> {
        self.session.query_unpaged(statement, ()).await?;
        Ok(())
    }

    async fn keyspace_metadata(&self, keyspace: &str) -> Result<KeyspaceMetadata, SyncError> {
        if !self.keyspace_exists(keyspace).await? {
            return Err(SyncError::ConfigError(format!(
                "Keyspace {} does not exist on {}",
                keyspace, self.config.endpoint
            )));
        }

        let table_rows = self
            .session
            .query_unpaged(
                "SELECT table_name FROM system_schema.tables WHERE keyspace_name = ?",
                (keyspace.to_string(),),
            )
            .await?;
        let table_names = table_rows
            .rows_typed::<(String,)>()
            .map_err(|e| SyncError::DatabaseError(format!("Unexpected schema result: {}", e)))?
            .map(|row| row.map(|(name,)| name))
            .collect::<Result<BTreeSet<String>, _>>()
            .map_err(|e| SyncError::DatabaseError(format!("Malformed schema row: {}", e)))?;

        let result = self
            .session
            .query_unpaged(
                "SELECT table_name, column_name, kind, position, type, clustering_order \
                 FROM system_schema.columns WHERE keyspace_name = ?",
                (keyspace.to_string(),),
            )
            .await?;

        let rows = result
            .rows_typed::<(String, String, String, i32, String, String)>()
            .map_err(|e| SyncError::DatabaseError(format!("Unexpected schema result: {}", e)))?;

        let mut by_table: BTreeMap<String, Vec<SchemaColumn>> = BTreeMap::new();
        for row in rows {
            let (table, name, kind, position, type_text, clustering_order) = row
                .map_err(|e| SyncError::DatabaseError(format!("Malformed schema row: {}", e)))?;
            by_table.entry(table).or_default().push(SchemaColumn {
                name,
                kind,
                position,
                type_text,
                clustering_order,
            });
        }

        let tables = base_tables(by_table, &table_names)
            .into_iter()
            .map(|(table, columns)| table_schema(table, columns))
            .collect::<Result<Vec<_>, _>>()?;

        debug!("Read schema of {} tables from keyspace {}", tables.len(), keyspace);

        Ok(KeyspaceMetadata {
            name: keyspace.to_string(),
            tables,
        })
    }

    async fn scan(&self, statement: &str) -> Result<RowStream, SyncError> {
        let rows = self.session.query_iter(statement, ()).await?;
        let names: Vec<String> = rows
            .get_column_specs()
            .iter()
            .map(|spec| spec.name.clone())
            .collect();

        Ok(rows
            .map(move |row| {
                row.map(|row| row_data(&names, row))
                    .map_err(SyncError::from)
            })
            .boxed())
    }
}

/// One row of `system_schema.columns`.
#[derive(Debug, Clone)]
struct SchemaColumn {
    name: String,
    kind: String,
    position: i32,
    type_text: String,
    clustering_order: String,
}

/// `system_schema.columns` also lists materialized views and, on ScyllaDB,
/// the views backing secondary indexes. Keep only real tables.
fn base_tables(
    mut by_table: BTreeMap<String, Vec<SchemaColumn>>,
    table_names: &BTreeSet<String>,
) -> BTreeMap<String, Vec<SchemaColumn>> {
    by_table.retain(|table, _| {
        let keep = table_names.contains(table);
        if !keep {
            debug!("Ignoring view {}", table);
        }
        keep
    });
    by_table
}

/// Order columns as partition keys, clustering keys, then the rest by name.
fn table_schema(table: String, mut columns: Vec<SchemaColumn>) -> Result<TableSchema, SyncError> {
    let rank = |kind: ColumnKind| match kind {
        ColumnKind::PartitionKey => 0,
        ColumnKind::Clustering => 1,
        ColumnKind::Static | ColumnKind::Regular => 2,
    };

    let mut described = Vec::with_capacity(columns.len());
    for column in columns.drain(..) {
        let kind = ColumnKind::from_schema(&column.kind).ok_or_else(|| {
            SyncError::SchemaError(format!(
                "column {}.{} has unknown kind {}",
                table, column.name, column.kind
            ))
        })?;
        let clustering_order = match kind {
            ColumnKind::Clustering => ClusteringOrder::from_schema(&column.clustering_order),
            _ => None,
        };
        let descriptor = ColumnDescriptor {
            name: column.name,
            column_type: ColumnType::parse(&column.type_text),
            kind,
            clustering_order,
        };
        let position = match kind {
            ColumnKind::PartitionKey | ColumnKind::Clustering => column.position,
            _ => 0,
        };
        described.push((rank(kind), position, descriptor));
    }

    described.sort_by(|a, b| (a.0, a.1, &a.2.name).cmp(&(b.0, b.1, &b.2.name)));

    let schema = TableSchema::new(table, described.into_iter().map(|(_, _, d)| d).collect());
    schema.validate()?;
    Ok(schema)
}

fn row_data(names: &[String], row: Row) -> RowData {
    names
        .iter()
        .cloned()
        .zip(row.columns.into_iter().map(column_value))
        .collect()
}

fn column_value(value: Option<CqlValue>) -> ColumnValue {
    let Some(value) = value else {
        return ColumnValue::Null;
    };

    match value {
        CqlValue::Ascii(s) | CqlValue::Text(s) => ColumnValue::Text(s),
        CqlValue::TinyInt(v) => ColumnValue::TinyInt(v),
        CqlValue::SmallInt(v) => ColumnValue::SmallInt(v),
        CqlValue::Int(v) => ColumnValue::Int(v),
        CqlValue::BigInt(v) => ColumnValue::BigInt(v),
        CqlValue::Counter(c) => ColumnValue::Counter(c.0),
        CqlValue::Float(v) => ColumnValue::Float(v),
        CqlValue::Double(v) => ColumnValue::Double(v),
        CqlValue::Boolean(v) => ColumnValue::Boolean(v),
        CqlValue::Timestamp(ts) => ColumnValue::Timestamp(ts.0),
        CqlValue::Date(d) => date_value(d.0),
        CqlValue::Time(t) => ColumnValue::Time(t.0),
        CqlValue::Uuid(id) => ColumnValue::Uuid(id),
        CqlValue::Timeuuid(id) => ColumnValue::Uuid(id.into()),
        CqlValue::Inet(addr) => ColumnValue::Inet(addr),
        CqlValue::Blob(bytes) => ColumnValue::Blob(bytes),
        CqlValue::List(items) => {
            ColumnValue::List(items.into_iter().map(|v| column_value(Some(v))).collect())
        }
        CqlValue::Set(items) => {
            ColumnValue::Set(items.into_iter().map(|v| column_value(Some(v))).collect())
        }
        CqlValue::Map(entries) => ColumnValue::Map(
            entries
                .into_iter()
                .map(|(k, v)| (column_value(Some(k)), column_value(Some(v))))
                .collect(),
        ),
        CqlValue::Empty => ColumnValue::Null,
        CqlValue::Decimal(_) => ColumnValue::Unsupported("decimal".to_string()),
        CqlValue::Varint(_) => ColumnValue::Unsupported("varint".to_string()),
        CqlValue::Duration(_) => ColumnValue::Unsupported("duration".to_string()),
        CqlValue::Tuple(_) => ColumnValue::Unsupported("tuple".to_string()),
        CqlValue::UserDefinedType { type_name, .. } => {
            ColumnValue::Unsupported(format!("user-defined type {}", type_name))
        }
        #[allow(unreachable_patterns)]
        other => ColumnValue::Unsupported(format!("{:?}", other)),
    }
}

/// CQL dates count days from 2^31, which is the Unix epoch.
fn date_value(raw: u32) -> ColumnValue {
    let days = i64::from(raw) - (1i64 << 31);
    NaiveDate::from_ymd_opt(1970, 1, 1)
        .zip(TimeDelta::try_days(days))
        .and_then(|(epoch, delta)| epoch.checked_add_signed(delta))
        .map(ColumnValue::Date)
        .unwrap_or_else(|| ColumnValue::Unsupported(format!("date {} days from epoch", days)))
}
