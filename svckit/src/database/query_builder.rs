use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::ReplicationConfig;
use crate::errors::SyncError;
use crate::types::{ColumnKind, RowData, TableSchema};

use super::literal::{self, quote};

/// Literals treated as "no value" under [`BlankPolicy::Lenient`].
const ZERO_LITERALS: [&str; 2] = ["''", "0"];

/// Which encoded values are dropped from an INSERT besides nulls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlankPolicy {
    /// Drop empty strings and zeros too. A real zero is indistinguishable
    /// from "unset" and is not written.
    #[default]
    Lenient,
    /// Drop only values with no literal at all.
    Strict,
}

impl BlankPolicy {
    pub fn keeps(&self, literal: &str) -> bool {
        match self {
            BlankPolicy::Lenient => !ZERO_LITERALS.contains(&literal),
            BlankPolicy::Strict => true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    Schema,
    Data,
}

/// Statement text ready to send to the destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedStatement {
    kind: StatementKind,
    text: String,
}

impl GeneratedStatement {
    fn schema(text: String) -> Self {
        Self {
            kind: StatementKind::Schema,
            text,
        }
    }

    fn data(text: String) -> Self {
        Self {
            kind: StatementKind::Data,
            text,
        }
    }

    pub fn kind(&self) -> StatementKind {
        self.kind
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

impl fmt::Display for GeneratedStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

pub struct QueryBuilder;

impl QueryBuilder {
    /// Idempotent keyspace creation with the configured replication.
    pub fn build_create_keyspace(
        keyspace: &str,
        replication: &ReplicationConfig,
    ) -> GeneratedStatement {
        let mut options = vec![format!("'class' : {}", quote(&replication.class))];
        for (key, value) in &replication.options {
            let value = if value.parse::<u32>().is_ok() {
                value.clone()
            } else {
                quote(value)
            };
            options.push(format!("{}: {}", quote(key), value));
        }

        GeneratedStatement::schema(format!(
            "CREATE KEYSPACE IF NOT EXISTS {} WITH REPLICATION = {{ {} }};",
            quote_identifier(keyspace),
            options.join(", ")
        ))
    }

    /// `CREATE TABLE IF NOT EXISTS` reproducing column order, keys and clustering order.
    pub fn build_create_table(keyspace: &str, schema: &TableSchema) -> GeneratedStatement {
        let columns: Vec<String> = schema
            .columns
            .iter()
            .map(|c| {
                let definition = format!("{} {}", quote_identifier(&c.name), c.column_type);
                match c.kind {
                    ColumnKind::Static => format!("{} static", definition),
                    _ => definition,
                }
            })
            .collect();

        let ordered: Vec<String> = schema
            .columns
            .iter()
            .filter_map(|c| {
                c.clustering_order
                    .map(|order| format!("{} {}", quote_identifier(&c.name), order))
            })
            .collect();

        let partition = join_identifiers(&schema.partition_key);
        let clustering = join_identifiers(&schema.clustering_key);
        let table = format!("{}.{}", quote_identifier(keyspace), quote_identifier(&schema.name));

        let text = if schema.clustering_key.is_empty() {
            format!(
                "CREATE TABLE IF NOT EXISTS {} ({}, PRIMARY KEY (({})));",
                table,
                columns.join(","),
                partition
            )
        } else if ordered.is_empty() {
            format!(
                "CREATE TABLE IF NOT EXISTS {} ({}, PRIMARY KEY (({}), {}));",
                table,
                columns.join(","),
                partition,
                clustering
            )
        } else {
            format!(
                "CREATE TABLE IF NOT EXISTS {} ({}, PRIMARY KEY (({}), {})) WITH CLUSTERING ORDER BY ({});",
                table,
                columns.join(","),
                partition,
                clustering,
                ordered.join(",")
            )
        };

        GeneratedStatement::schema(text)
    }

    /// INSERT for one source row, or `None` when every column was dropped.
    pub fn build_insert(
        keyspace: &str,
        schema: &TableSchema,
        row: &RowData,
        policy: BlankPolicy,
    ) -> Result<Option<GeneratedStatement>, SyncError> {
        let mut names = Vec::with_capacity(row.len());
        let mut values = Vec::with_capacity(row.len());

        for (name, value) in &row.columns {
            let column = schema.column(name).ok_or_else(|| {
                SyncError::EncodingError(format!(
                    "column {} is not part of table {}",
                    name, schema.name
                ))
            })?;

            let Some(literal) = literal::encode(value, &column.column_type)? else {
                continue;
            };
            if !policy.keeps(&literal) {
                continue;
            }

            names.push(quote_identifier(name));
            values.push(literal);
        }

        if values.is_empty() {
            return Ok(None);
        }

        Ok(Some(GeneratedStatement::data(format!(
            "INSERT INTO {}.{} ({}) VALUES ({})",
            quote_identifier(keyspace),
            quote_identifier(&schema.name),
            names.join(","),
            values.join(",")
        ))))
    }

    /// Full-table scan without paging hints or filters.
    pub fn build_select_query(keyspace: &str, table: &str) -> String {
        format!(
            "SELECT * FROM {}.{}",
            quote_identifier(keyspace),
            quote_identifier(table)
        )
    }
}

/// Leave plain lower-case identifiers alone, double-quote anything else.
pub fn quote_identifier(name: &str) -> String {
    let mut chars = name.chars();
    let plain = matches!(chars.next(), Some(c) if c.is_ascii_lowercase() || c == '_')
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');

    if plain {
        name.to_string()
    } else {
        format!("\"{}\"", name.replace('"', "\"\""))
    }
}

fn join_identifiers(names: &[String]) -> String {
    names
        .iter()
        .map(|n| quote_identifier(n))
        .collect::<Vec<_>>()
        .join(",")
}
