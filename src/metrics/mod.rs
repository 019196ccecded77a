//! Observability: counters and histograms for the ingest pipeline,
//! registered on a `prometheus` registry and served as plain text by
//! [`server::run_metrics_server`].
//!
//! This observes the pipeline; it does not compute trade aggregates or
//! order-book/aggregate state, which are out of scope entirely.

pub mod server;

use crate::error::AppResult;
use prometheus::{Histogram, HistogramOpts, IntCounter, IntGauge, Opts, Registry};

#[derive(Clone)]
pub struct IngestMetrics {
    registry: Registry,

    pub frames_in_total: IntCounter,
    pub trades_processed_total: IntCounter,
    pub trades_rejected_total: IntCounter,
    pub reconnects_total: IntCounter,
    pub batches_written_total: IntCounter,
    pub batches_failed_total: IntCounter,
    pub trades_persisted_total: IntCounter,
    pub queue_depth: IntGauge,
    pub batch_write_seconds: Histogram,
}

impl IngestMetrics {
    pub fn new() -> AppResult<Self> {
        let registry = Registry::new();

        let frames_in_total = IntCounter::with_opts(Opts::new(
            "ingest_frames_in_total",
            "WebSocket frames received from the upstream feed",
        ))?;
        let trades_processed_total = IntCounter::with_opts(Opts::new(
            "ingest_trades_processed_total",
            "Trade messages that passed parsing/validation and were enqueued",
        ))?;
        let trades_rejected_total = IntCounter::with_opts(Opts::new(
            "ingest_trades_rejected_total",
            "Inbound messages discarded by the parser (malformed or invalid symbol)",
        ))?;
        let reconnects_total = IntCounter::with_opts(Opts::new(
            "ingest_reconnects_total",
            "Upstream reconnect attempts following an error or heartbeat timeout",
        ))?;
        let batches_written_total = IntCounter::with_opts(Opts::new(
            "ingest_batches_written_total",
            "Batches successfully committed to the store",
        ))?;
        let batches_failed_total = IntCounter::with_opts(Opts::new(
            "ingest_batches_failed_total",
            "Batches dropped after a failed store commit",
        ))?;
        let trades_persisted_total = IntCounter::with_opts(Opts::new(
            "ingest_trades_persisted_total",
            "Trades included in successfully committed batches",
        ))?;
        let queue_depth = IntGauge::with_opts(Opts::new(
            "ingest_queue_depth",
            "Approximate number of trades currently buffered in the bounded queue",
        ))?;
        let batch_write_seconds = Histogram::with_opts(HistogramOpts::new(
            "ingest_batch_write_seconds",
            "Wall time spent committing one batch to the store",
        ))?;

        registry.register(Box::new(frames_in_total.clone()))?;
        registry.register(Box::new(trades_processed_total.clone()))?;
        registry.register(Box::new(trades_rejected_total.clone()))?;
        registry.register(Box::new(reconnects_total.clone()))?;
        registry.register(Box::new(batches_written_total.clone()))?;
        registry.register(Box::new(batches_failed_total.clone()))?;
        registry.register(Box::new(trades_persisted_total.clone()))?;
        registry.register(Box::new(queue_depth.clone()))?;
        registry.register(Box::new(batch_write_seconds.clone()))?;

        Ok(Self {
            registry,
            frames_in_total,
            trades_processed_total,
            trades_rejected_total,
            reconnects_total,
            batches_written_total,
            batches_failed_total,
            trades_persisted_total,
            queue_depth,
            batch_write_seconds,
        })
    }

    pub fn encode_text(&self) -> AppResult<String> {
        use prometheus::{Encoder, TextEncoder};
        let mf = self.registry.gather();
        let mut buf = Vec::new();
        TextEncoder::new().encode(&mf, &mut buf)?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    #[inline]
    pub fn inc_in(&self) {
        self.frames_in_total.inc();
    }

    #[inline]
    pub fn inc_processed(&self) {
        self.trades_processed_total.inc();
    }

    #[inline]
    pub fn inc_rejected(&self) {
        self.trades_rejected_total.inc();
    }

    #[inline]
    pub fn inc_reconnect(&self) {
        self.reconnects_total.inc();
    }

    #[inline]
    pub fn inc_batch_written(&self, rows: u64) {
        self.batches_written_total.inc();
        self.trades_persisted_total.inc_by(rows);
    }

    #[inline]
    pub fn inc_batch_failed(&self) {
        self.batches_failed_total.inc();
    }

    #[inline]
    pub fn set_queue_depth(&self, depth: i64) {
        self.queue_depth.set(depth);
    }

    #[inline]
    pub fn observe_batch_write(&self, secs: f64) {
        self.batch_write_seconds.observe(secs);
    }
}
