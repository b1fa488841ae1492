// services/keyspace-transfer/src/main.rs
//
// Keyspace-Transfer - copy a keyspace's schema and rows between clusters
//

mod cli;
mod config;
mod job;
mod replicator;
mod signal;
mod transfer;
mod write_pool;

#[cfg(test)]
mod testing;

use anyhow::{Context, Result};
use clap::Parser;
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use svckit::database::ScyllaConnection;
use svckit::metrics;

use cli::{Cli, Command, TransferArgs};
use job::ReplicationJob;
use transfer::KeyspaceTransfer;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Version => {
            println!("v{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Command::Transfer(args) => run_transfer(args).await,
    }
}

async fn run_transfer(args: TransferArgs) -> Result<()> {
    let config = config::load_config(args.config.as_deref())?;

    // RUST_LOG wins over the configured level
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.observability.log_level)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let job = ReplicationJob::from_args(&args, &config)?;
    info!("Source: {} keyspace {}", job.source.endpoint, job.source_keyspace);
    info!("Destination: {} keyspace {}", job.target.endpoint, job.target_keyspace);
    if let Some(table) = &job.table_filter {
        info!("Only table: {}", table);
    }
    if job.skip_rows > 0 {
        info!("Skipping the first {} rows of every table", job.skip_rows);
    }

    let source = Arc::new(ScyllaConnection::connect(&job.source).await?);
    let target = Arc::new(ScyllaConnection::connect(&job.target).await?);

    let result = KeyspaceTransfer::new(job, source, target).run().await;

    if let Some(path) = &args.metrics_output {
        write_metrics(path)?;
    }

    let report = result.map_err(|e| {
        error!("Transfer failed: {}", e);
        e
    })?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn write_metrics(path: &Path) -> Result<()> {
    let text = metrics::render()?;
    std::fs::write(path, text)
        .with_context(|| format!("Failed to write metrics to {}", path.display()))?;
    info!("Metrics written to {}", path.display());
    Ok(())
}
