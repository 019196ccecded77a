//! Upstream client: owns the live subscription, reconnects
//! on error/timeout/reconfiguration, and decodes trade events into the
//! bounded queue.

use crate::error::AppResult;
use crate::ingest::parser::parse_trade_message;
use crate::metrics::IngestMetrics;
use crate::queue::TradeQueue;
use crate::symbols::SymbolResolver;
use futures_util::{SinkExt, StreamExt};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::time::Instant;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::tungstenite::protocol::frame::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use arc_swap::ArcSwap;

const STREAM_BASE_URL: &str = "wss://stream.binance.com:9443/ws";
const HEARTBEAT_TIMEOUT: Duration = Duration::from_secs(60);
const RECONNECT_BACKOFF: Duration = Duration::from_secs(5);

/// Shared state the reconfiguration controller writes and the
/// upstream client reads: the authoritative symbol set (atomic
/// pointer-swap), the reconnect flag, and the live per-connection
/// cancellation token, so a detected change can cancel the connection the
/// client is actually using right now rather than a stale one.
#[derive(Clone)]
pub struct SharedSubscriptionState {
    pub current: Arc<ArcSwap<BTreeSet<String>>>,
    pub reconnect_flag: Arc<AtomicBool>,
    pub conn_token: Arc<std::sync::Mutex<CancellationToken>>,
}

impl SharedSubscriptionState {
    pub fn new() -> Self {
        Self {
            current: Arc::new(ArcSwap::from_pointee(BTreeSet::new())),
            reconnect_flag: Arc::new(AtomicBool::new(false)),
            conn_token: Arc::new(std::sync::Mutex::new(CancellationToken::new())),
        }
    }
}

impl Default for SharedSubscriptionState {
    fn default() -> Self {
        Self::new()
    }
}

pub struct UpstreamClient {
    resolver: Arc<SymbolResolver>,
    state: SharedSubscriptionState,
    queue: TradeQueue,
    metrics: Arc<IngestMetrics>,
}

/// Why the receive loop returned, driving the outer reconnect algorithm.
enum LoopExit {
    Reconnect,
    RemoteOrError,
    CtxCancelled,
}

impl UpstreamClient {
    pub fn new(
        resolver: Arc<SymbolResolver>,
        state: SharedSubscriptionState,
        queue: TradeQueue,
        metrics: Arc<IngestMetrics>,
    ) -> Self {
        Self {
            resolver,
            state,
            queue,
            metrics,
        }
    }

    /// Runs until `ctx` is cancelled.
    pub async fn run(&self, ctx: CancellationToken) -> AppResult<()> {
        loop {
            if ctx.is_cancelled() {
                return Ok(());
            }

            let current = self.resolver.resolve().await?;
            self.state.current.store(Arc::new(current.clone()));

            let url = build_subscription_url(&current);
            info!(url = %url, symbols = current.len(), "ws connecting");

            let (ws_stream, _resp) = match connect_async(&url).await {
                Ok(pair) => pair,
                Err(e) => {
                    error!(error = %e, "ws connect failed");
                    tokio::time::sleep(RECONNECT_BACKOFF).await;
                    self.metrics.inc_reconnect();
                    continue;
                }
            };

            self.state.reconnect_flag.store(false, Ordering::SeqCst);
            let conn_token = ctx.child_token();
            *self.state.conn_token.lock().unwrap() = conn_token.clone();

            let (mut write, mut read) = ws_stream.split();

            let exit = self
                .receive_loop(&mut read, &ctx, &conn_token)
                .await;

            match exit {
                LoopExit::CtxCancelled => {
                    let _ = write
                        .send(Message::Close(Some(CloseFrame {
                            code: CloseCode::Normal,
                            reason: "shutdown".into(),
                        })))
                        .await;
                    return Ok(());
                }
                LoopExit::Reconnect => {
                    let _ = write
                        .send(Message::Close(Some(CloseFrame {
                            code: CloseCode::Normal,
                            reason: "Shutdown".into(),
                        })))
                        .await;
                    // loop back to step 2: re-resolve symbols immediately.
                }
                LoopExit::RemoteOrError => {
                    let _ = write.close().await;
                    warn!("ws disconnected, reconnecting in 5s");
                    tokio::time::sleep(RECONNECT_BACKOFF).await;
                    self.metrics.inc_reconnect();
                }
            }
        }
    }

    async fn receive_loop<S>(
        &self,
        read: &mut S,
        ctx: &CancellationToken,
        conn_token: &CancellationToken,
    ) -> LoopExit
    where
        S: futures_util::Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>>
            + Unpin,
    {
        let mut last_msg_at = Instant::now();

        loop {
            if self.state.reconnect_flag.load(Ordering::SeqCst) {
                return LoopExit::Reconnect;
            }

            if last_msg_at.elapsed() > HEARTBEAT_TIMEOUT {
                warn!("heartbeat timeout, treating connection as dead");
                return LoopExit::RemoteOrError;
            }

            let heartbeat_deadline = last_msg_at + HEARTBEAT_TIMEOUT;

            tokio::select! {
                biased;

                _ = ctx.cancelled() => return LoopExit::CtxCancelled,
                _ = conn_token.cancelled() => return LoopExit::Reconnect,
                _ = tokio::time::sleep_until(heartbeat_deadline) => {
                    warn!("heartbeat timeout, treating connection as dead");
                    return LoopExit::RemoteOrError;
                }

                msg = read.next() => {
                    let Some(msg) = msg else {
                        return LoopExit::RemoteOrError;
                    };

                    let msg = match msg {
                        Ok(m) => m,
                        Err(e) => {
                            error!(error = %e, "ws read error");
                            return LoopExit::RemoteOrError;
                        }
                    };

                    last_msg_at = Instant::now();
                    self.metrics.inc_in();

                    match msg {
                        Message::Text(text) => {
                            match parse_trade_message(&text) {
                                Some(trade) => {
                                    self.metrics.inc_processed();
                                    if let Err(e) = self.queue.offer(trade).await {
                                        if !e.is_shutdown() {
                                            error!(error = %e, "failed to enqueue trade");
                                        }
                                        return LoopExit::CtxCancelled;
                                    }
                                }
                                None => {
                                    self.metrics.inc_rejected();
                                    warn!("rejected malformed/invalid trade message");
                                }
                            }
                        }
                        Message::Binary(_) => {
                            // Binary frames are logged and ignored.
                            warn!("ignoring unexpected binary frame");
                        }
                        Message::Close(frame) => {
                            info!(?frame, "remote closed connection");
                            return LoopExit::RemoteOrError;
                        }
                        Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {
                            // tungstenite answers pings internally via the sink;
                            // we only needed to observe liveness here.
                        }
                    }
                }
            }
        }
    }
}

/// `wss://stream.binance.com:9443/ws/{sym1}@trade/{sym2}@trade/…`
fn build_subscription_url(symbols: &BTreeSet<String>) -> String {
    let segments: Vec<String> = symbols
        .iter()
        .map(|s| format!("{}@trade", s.to_lowercase()))
        .collect();
    format!("{STREAM_BASE_URL}/{}", segments.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_url_with_lowercased_symbols_joined_as_path_segments() {
        let symbols = BTreeSet::from(["BTCUSDT".to_string(), "ETHUSDT".to_string()]);
        let url = build_subscription_url(&symbols);
        assert_eq!(
            url,
            "wss://stream.binance.com:9443/ws/btcusdt@trade/ethusdt@trade"
        );
    }

    #[test]
    fn reconfiguration_adds_a_third_stream_segment() {
        let symbols = BTreeSet::from([
            "BTCUSDT".to_string(),
            "ETHUSDT".to_string(),
            "SOLUSDT".to_string(),
        ]);
        let url = build_subscription_url(&symbols);
        assert_eq!(url.matches("@trade").count(), 3);
    }
}
