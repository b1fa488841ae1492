use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "keyspace-transfer")]
#[command(about = "Stream a Cassandra/ScyllaDB keyspace into another cluster")]
#[command(long_about = "\
[Cluster I]---/transfer data/-->[Cluster II]

Recreates every table of a keyspace on the destination cluster and streams
all rows across as CQL INSERT statements. The destination may also be the
same cluster under another keyspace name.")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Copy table schemas and rows from one keyspace to another
    Transfer(TransferArgs),
    /// Print the version number
    Version,
}

#[derive(Args, Debug, Clone, Default)]
pub struct TransferArgs {
    /// Source cluster, e.g. cassandra1:9042
    #[arg(short = 'f', long = "from-host")]
    pub from_host: String,

    /// Destination cluster, e.g. cassandra2:9042
    #[arg(short = 't', long = "to-host")]
    pub to_host: String,

    /// Keyspace to read from
    #[arg(short = 'i', long = "from-keyspace")]
    pub from_keyspace: Option<String>,

    /// Keyspace to write to (defaults to --from-keyspace)
    #[arg(short = 'o', long = "to-keyspace")]
    pub to_keyspace: Option<String>,

    /// Only transfer this table
    #[arg(short = 'a', long = "table")]
    pub table: Option<String>,

    /// Count but do not write the first N rows of every table (resume offset)
    #[arg(long = "skip-rows", default_value_t = 0)]
    pub skip_rows: u64,

    /// Do not create tables on the destination
    #[arg(short = 's', long = "skip-create-tables")]
    pub skip_create_tables: bool,

    /// Log and skip rows the destination rejects instead of aborting
    #[arg(short = 'x', long = "skip-insert-row-errors")]
    pub skip_insert_row_errors: bool,

    /// Optional config file (yaml, toml or json)
    #[arg(short = 'c', long = "config")]
    pub config: Option<String>,

    /// Maximum outstanding writes to the destination
    #[arg(long = "writer-concurrency")]
    pub writer_concurrency: Option<usize>,

    /// Write zero numbers and empty strings instead of treating them as unset
    #[arg(long = "keep-zero-values")]
    pub keep_zero_values: bool,

    /// Write prometheus metrics to this file when the job ends
    #[arg(long = "metrics-output")]
    pub metrics_output: Option<PathBuf>,
}
