mod batch;
mod cli;
mod config;
mod control;
mod db;
mod error;
mod ingest;
mod metrics;
mod operator;
mod queue;
mod stats;
mod supervisor;
mod symbols;
mod trade;

#[cfg(test)]
mod tests;

use clap::Parser;
use tracing_subscriber::EnvFilter;

fn main() -> error::AppResult<()> {
    let cli = cli::Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(cli.workers)
        .enable_all()
        .build()
        .map_err(error::AppError::ConfigIo)?;

    runtime.block_on(supervisor::run(cli))
}
