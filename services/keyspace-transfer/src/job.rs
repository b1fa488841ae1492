use svckit::config::{DatabaseConfig, Endpoint, ReplicationConfig};
use svckit::database::BlankPolicy;
use svckit::errors::SyncError;

use crate::cli::TransferArgs;
use crate::config::{ProgressConfig, TransferConfig};

/// Everything a transfer needs, resolved from flags and config before any
/// connection is opened.
#[derive(Debug, Clone)]
pub struct ReplicationJob {
    pub source: DatabaseConfig,
    pub target: DatabaseConfig,
    pub source_keyspace: String,
    pub target_keyspace: String,
    pub table_filter: Option<String>,
    pub skip_create_tables: bool,
    pub skip_row_errors: bool,
    pub skip_rows: u64,
    pub writer_concurrency: usize,
    pub blank_policy: BlankPolicy,
    pub replication: ReplicationConfig,
    pub progress: ProgressConfig,
}

impl ReplicationJob {
    pub fn from_args(args: &TransferArgs, config: &TransferConfig) -> Result<Self, SyncError> {
        let source_endpoint = Endpoint::parse(&args.from_host)?;
        let target_endpoint = Endpoint::parse(&args.to_host)?;

        let source_keyspace = args
            .from_keyspace
            .as_deref()
            .map(str::trim)
            .filter(|ks| !ks.is_empty())
            .ok_or_else(|| {
                SyncError::ConfigError("A source keyspace is required (--from-keyspace)".to_string())
            })?
            .to_string();

        let target_keyspace = match args.to_keyspace.as_deref().map(str::trim) {
            Some("") => {
                return Err(SyncError::ConfigError(
                    "Destination keyspace must not be empty".to_string(),
                ))
            }
            Some(ks) => ks.to_string(),
            None => source_keyspace.clone(),
        };

        let table_filter = args
            .table
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string);

        let writer_concurrency = match args.writer_concurrency {
            Some(0) => {
                return Err(SyncError::ConfigError(
                    "--writer-concurrency must be at least 1".to_string(),
                ))
            }
            Some(n) => n,
            None => config.writer.pool_size(),
        };

        let blank_policy = if args.keep_zero_values {
            BlankPolicy::Strict
        } else {
            BlankPolicy::Lenient
        };

        let connection = &config.connection;
        Ok(Self {
            source: connection
                .database_config(source_endpoint, connection.source_credentials.clone()),
            target: connection
                .database_config(target_endpoint, connection.target_credentials.clone()),
            source_keyspace,
            target_keyspace,
            table_filter,
            skip_create_tables: args.skip_create_tables,
            skip_row_errors: args.skip_insert_row_errors,
            skip_rows: args.skip_rows,
            writer_concurrency,
            blank_policy,
            replication: config.replication.clone(),
            progress: config.progress,
        })
    }

    pub fn includes_table(&self, name: &str) -> bool {
        match &self.table_filter {
            Some(filter) => filter == name,
            None => true,
        }
    }
}
