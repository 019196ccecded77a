//! Multi-component scenario tests: compiled into the binary under
//! `#[cfg(test)]` rather than as a separate `tests/` integration crate,
//! since this binary carries no library target for an external test
//! crate to link against.

use crate::batch::BatchWriter;
use crate::db::BatchSink;
use crate::error::AppResult;
use crate::ingest::parser::parse_trade_message;
use crate::metrics::IngestMetrics;
use crate::queue::TradeQueue;
use crate::stats::TradeCounter;
use crate::trade::Trade;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use tokio_util::sync::CancellationToken;

#[derive(Default)]
struct RecordingStore {
    batches: std::sync::Mutex<Vec<Vec<Trade>>>,
    failures_remaining: AtomicU32,
}

#[async_trait::async_trait]
impl BatchSink for RecordingStore {
    async fn save_batch(&self, trades: &[Trade]) -> AppResult<()> {
        if self.failures_remaining.load(Ordering::SeqCst) > 0 {
            self.failures_remaining.fetch_sub(1, Ordering::SeqCst);
            return Err(crate::error::AppError::Internal("injected failure".into()));
        }
        self.batches.lock().unwrap().push(trades.to_vec());
        Ok(())
    }
}

fn make_writer(store: Arc<RecordingStore>, batch_size: usize) -> (BatchWriter, TradeCounter) {
    let metrics = Arc::new(IngestMetrics::new().unwrap());
    let counter = TradeCounter::new();
    (
        BatchWriter::new(store, metrics, counter.clone(), batch_size),
        counter,
    )
}

/// End-to-end: decode raw upstream frames, enqueue, and drain them through
/// the batch writer into a fake store, checking row count and ordering
/// survive both hops.
#[tokio::test]
async fn decoded_frames_flow_through_queue_into_committed_batches() {
    let store = Arc::new(RecordingStore::default());
    let (bw, counter) = make_writer(store.clone(), 3);
    let (queue, rx) = TradeQueue::bounded(16);

    let frames = [
        r#"{"e":"trade","s":"BTCUSDT","p":"100.5","q":"0.1","t":1,"T":1700000000000}"#,
        r#"{"e":"depthUpdate","s":"BTCUSDT"}"#, // rejected, never reaches the queue
        r#"{"e":"trade","s":"ETHUSDT","p":"20.25","q":"4","t":2,"T":1700000001000}"#,
        r#"{"e":"trade","s":"SOLUSDT","p":"1.5","q":"9","t":3,"T":1700000002000}"#,
    ];

    for raw in frames {
        if let Some(trade) = parse_trade_message(raw) {
            queue.offer(trade).await.unwrap();
        }
    }
    drop(queue);

    bw.run(rx, CancellationToken::new()).await;

    let committed = store.batches.lock().unwrap();
    assert_eq!(committed.len(), 1);
    assert_eq!(committed[0].len(), 3);
    assert_eq!(counter.get(), 3);
}

/// A store failure on one batch is dropped without wedging the pipeline;
/// a subsequent batch still commits and the counter reflects only the
/// successful rows.
#[tokio::test]
async fn store_failure_is_isolated_to_its_own_batch() {
    let store = Arc::new(RecordingStore::default());
    store.failures_remaining.store(1, Ordering::SeqCst);
    let (bw, counter) = make_writer(store.clone(), 2);
    let (queue, rx) = TradeQueue::bounded(16);

    for i in 0..4 {
        let raw = format!(
            r#"{{"e":"trade","s":"BTCUSDT","p":"1","q":"1","t":{i},"T":1700000000000}}"#
        );
        queue.offer(parse_trade_message(&raw).unwrap()).await.unwrap();
    }
    drop(queue);

    bw.run(rx, CancellationToken::new()).await;

    let committed = store.batches.lock().unwrap();
    assert_eq!(committed.len(), 1, "first batch's failure must not block the second");
    assert_eq!(counter.get(), 2);
}

/// Shutdown mid-stream drains the remainder of the queue within the grace
/// period and commits it as a final partial batch.
#[tokio::test]
async fn shutdown_commits_a_final_partial_batch() {
    let store = Arc::new(RecordingStore::default());
    let (bw, counter) = make_writer(store.clone(), 10);
    let (queue, rx) = TradeQueue::bounded(16);

    for i in 0..5 {
        let raw = format!(
            r#"{{"e":"trade","s":"BTCUSDT","p":"1","q":"1","t":{i},"T":1700000000000}}"#
        );
        queue.offer(parse_trade_message(&raw).unwrap()).await.unwrap();
    }
    drop(queue);

    let ctx = CancellationToken::new();
    ctx.cancel();
    bw.run(rx, ctx).await;

    assert_eq!(counter.get(), 5);
    assert_eq!(store.batches.lock().unwrap()[0].len(), 5);
}
