//! Supervisor / lifecycle: starts components in dependency
//! order and propagates shutdown.
//!
//! Shutdown sequence on signal:
//! 1. Cancel the upstream client's context (closes the socket cleanly).
//! 2. Close the queue for writes (drop the producer handle).
//! 3. Wait up to 10s for the batch writer to drain and flush the remainder.
//! 4. Release resources.

use crate::batch::BatchWriter;
use crate::cli::Cli;
use crate::config::ConfigHandle;
use crate::control::ReconfigController;
use crate::db::StoreWriter;
use crate::error::AppResult;
use crate::ingest::ws_client::{SharedSubscriptionState, UpstreamClient};
use crate::metrics::{self, IngestMetrics};
use crate::operator::run_operator_command_reader;
use crate::queue::TradeQueue;
use crate::stats::TradeCounter;
use crate::symbols::SymbolResolver;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

pub async fn run(cli: Cli) -> AppResult<()> {
    let config = ConfigHandle::new(&cli.config);
    let app_cfg = config.load()?;

    let dsn = std::env::var("DATABASE_URL")
        .map_err(|_| crate::error::AppError::MissingConfig("DATABASE_URL"))?;
    let store: Arc<StoreWriter> = Arc::new(StoreWriter::connect(&dsn).await?);

    if cli.dry_run {
        info!("dry run: config and database connectivity verified, exiting");
        return Ok(());
    }

    let metrics = Arc::new(IngestMetrics::new()?);
    let counter = TradeCounter::new();
    let resolver = Arc::new(SymbolResolver::new(config));
    let state = SharedSubscriptionState::new();

    let (queue, queue_rx) = TradeQueue::bounded(crate::queue::DEFAULT_CAPACITY);

    let process_ctx = CancellationToken::new();

    let upstream = UpstreamClient::new(resolver.clone(), state.clone(), queue, metrics.clone());
    let batch_writer = BatchWriter::new(store.clone(), metrics.clone(), counter.clone(), app_cfg.batch_size);
    let reconfig = ReconfigController::new(resolver, state);

    let metrics_bind = cli.metrics_bind.clone();
    let metrics_port = cli.metrics_port;
    let metrics_for_server = metrics.clone();
    let metrics_task = tokio::spawn(async move {
        if let Err(e) = metrics::server::run_metrics_server(&metrics_bind, metrics_port, metrics_for_server).await {
            tracing::error!(error = %e, "metrics server exited");
        }
    });

    let upstream_ctx = process_ctx.clone();
    let upstream_task = tokio::spawn(async move { upstream.run(upstream_ctx).await });

    let reconfig_ctx = process_ctx.clone();
    let reconfig_task = tokio::spawn(async move { reconfig.run(reconfig_ctx).await });

    let operator_ctx = process_ctx.clone();
    let operator_task = tokio::spawn(run_operator_command_reader(counter, operator_ctx));

    let batch_ctx = process_ctx.clone();
    let batch_task = tokio::spawn(async move { batch_writer.run(queue_rx, batch_ctx).await });

    tokio::signal::ctrl_c()
        .await
        .map_err(crate::error::AppError::ConfigIo)?;
    info!("shutdown signal received");

    process_ctx.cancel();
    metrics_task.abort();

    let _ = upstream_task.await;
    let _ = reconfig_task.await;
    let _ = operator_task.await;
    let _ = batch_task.await;

    info!("shutdown complete");
    Ok(())
}
