//! Batch writer: drains the bounded queue, groups trades
//! into batches, and commits them to the store.
//!
//! Policy chosen: size-driven with a
//! secondary 1-second maximum-latency timer, so a slow trickle of trades
//! still gets flushed promptly instead of waiting indefinitely for
//! BatchSize to fill. Single consumer task; no concurrent `save_batch`
//! calls.

use crate::db::BatchSink;
use crate::metrics::IngestMetrics;
use crate::queue::TradeQueueReceiver;
use crate::stats::TradeCounter;
use crate::trade::Trade;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::error;

const MAX_LATENCY: Duration = Duration::from_secs(1);
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

pub struct BatchWriter {
    store: Arc<dyn BatchSink>,
    metrics: Arc<IngestMetrics>,
    counter: TradeCounter,
    batch_size: usize,
}

impl BatchWriter {
    pub fn new(
        store: Arc<dyn BatchSink>,
        metrics: Arc<IngestMetrics>,
        counter: TradeCounter,
        batch_size: usize,
    ) -> Self {
        Self {
            store,
            metrics,
            counter,
            batch_size,
        }
    }

    /// Runs until the queue is closed and drained, or `ctx` is cancelled
    /// (in which case a final flush is attempted within the 10s grace).
    pub async fn run(&self, mut queue: TradeQueueReceiver, ctx: CancellationToken) {
        let mut accumulator: Vec<Trade> = Vec::with_capacity(self.batch_size);
        let mut accumulator_started_at: Option<Instant> = None;

        loop {
            if accumulator.is_empty() {
                accumulator_started_at = None;
            }

            let deadline_sleep = match accumulator_started_at {
                Some(started) => {
                    let elapsed = started.elapsed();
                    if elapsed >= MAX_LATENCY {
                        self.flush(&mut accumulator).await;
                        continue;
                    }
                    MAX_LATENCY - elapsed
                }
                None => Duration::from_secs(3600), // effectively "no timer" while empty
            };

            tokio::select! {
                biased;

                _ = ctx.cancelled() => {
                    self.drain_and_flush_on_shutdown(&mut queue, &mut accumulator).await;
                    return;
                }

                _ = tokio::time::sleep(deadline_sleep), if accumulator_started_at.is_some() => {
                    self.flush(&mut accumulator).await;
                }

                next = queue.drain_next() => {
                    match next {
                        Some(trade) => {
                            if accumulator.is_empty() {
                                accumulator_started_at = Some(Instant::now());
                            }
                            accumulator.push(trade);
                            self.metrics.set_queue_depth(accumulator.len() as i64);

                            if accumulator.len() >= self.batch_size {
                                self.flush(&mut accumulator).await;
                            }
                        }
                        None => {
                            // Queue closed and drained: flush whatever remains and exit.
                            self.flush(&mut accumulator).await;
                            return;
                        }
                    }
                }
            }
        }
    }

    async fn drain_and_flush_on_shutdown(
        &self,
        queue: &mut TradeQueueReceiver,
        accumulator: &mut Vec<Trade>,
    ) {
        let deadline = Instant::now() + SHUTDOWN_GRACE;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }

            tokio::select! {
                _ = tokio::time::sleep(remaining) => break,
                next = queue.drain_next() => {
                    match next {
                        Some(trade) => accumulator.push(trade),
                        None => break,
                    }
                }
            }
        }

        self.flush(accumulator).await;
    }

    async fn flush(&self, accumulator: &mut Vec<Trade>) {
        if accumulator.is_empty() {
            return;
        }

        let start = Instant::now();
        match self.store.save_batch(accumulator).await {
            Ok(()) => {
                let rows = accumulator.len() as u64;
                self.counter.add(rows);
                self.metrics.inc_batch_written(rows);
            }
            Err(e) => {
                error!(error = %e, rows = accumulator.len(), "batch write failed, dropping batch");
                self.metrics.inc_batch_failed();
            }
        }
        self.metrics.observe_batch_write(start.elapsed().as_secs_f64());
        self.metrics.set_queue_depth(0);
        accumulator.clear();
    }
}
