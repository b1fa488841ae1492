//! Shared building blocks for moving CQL keyspaces between clusters:
//! schema and row types, CQL literal encoding, statement generation and
//! the driver-facing connection trait.

pub mod config;
pub mod cql_type;
pub mod database;
pub mod errors;
pub mod metrics;
pub mod types;
