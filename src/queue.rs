use crate::error::{AppError, AppResult};
use crate::trade::Trade;
use tokio::sync::mpsc;

/// Fixed-capacity, single-reader, multi-writer FIFO of [`Trade`] coupling
/// the upstream client to the batch writer.
///
/// `offer` suspends the caller while the queue is full; `drain_next`
/// suspends while it's empty. FIFO order holds per producer; order across
/// producers is not guaranteed — a plain bounded
/// `tokio::sync::mpsc` channel gives both properties for free.
#[derive(Debug, Clone)]
pub struct TradeQueue {
    tx: mpsc::Sender<Trade>,
}

#[derive(Debug)]
pub struct TradeQueueReceiver {
    rx: mpsc::Receiver<Trade>,
}

pub const DEFAULT_CAPACITY: usize = 50_000;

impl TradeQueue {
    /// Create a queue of the given capacity, returning the producer handle
    /// and the single-reader handle.
    pub fn bounded(capacity: usize) -> (Self, TradeQueueReceiver) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, TradeQueueReceiver { rx })
    }

    /// Suspends the caller when full; completes once space is available or
    /// the queue has been closed (receiver dropped). A cancellation
    /// observed here during shutdown is not an error.
    pub async fn offer(&self, trade: Trade) -> AppResult<()> {
        match self.tx.send(trade).await {
            Ok(()) => Ok(()),
            Err(_closed) => Err(AppError::Shutdown),
        }
    }

    /// Prevents further offers from this handle from succeeding once all
    /// clones are dropped. There is no explicit `close()` call: the queue
    /// closes for writes when its last `TradeQueue` clone is dropped,
    /// which the supervisor (component G) triggers by dropping its clone
    /// during shutdown.
    pub fn capacity(&self) -> usize {
        self.tx.max_capacity()
    }
}

impl TradeQueueReceiver {
    /// Suspends until at least one item is available, or returns `None`
    /// once the queue has been closed for writes and fully drained.
    pub async fn drain_next(&mut self) -> Option<Trade> {
        self.rx.recv().await
    }

    /// Drains up to `max` items without suspending past what's already
    /// buffered; used by the batch writer's max-latency flush path.
    pub fn try_drain(&mut self, max: usize) -> Vec<Trade> {
        let mut out = Vec::with_capacity(max.min(64));
        while out.len() < max {
            match self.rx.try_recv() {
                Ok(t) => out.push(t),
                Err(_) => break,
            }
        }
        out
    }
}
