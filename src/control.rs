//! Reconfiguration controller.
//!
//! Polls the external config for symbol-set changes (no file-watch crate
//! is in the dependency stack, so an edge-triggered poll loop stands in
//! for a push subscription). On a set-equality change it updates the
//! shared current-set variable, flips the reconnect flag, and cancels the
//! upstream client's per-connection token so the receive loop exits
//! promptly.

use crate::ingest::ws_client::SharedSubscriptionState;
use crate::symbols::SymbolResolver;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Matches the upstream client's reconnect back-off cadence: the client
/// picks up the new set on its next iteration.
const POLL_INTERVAL: Duration = Duration::from_secs(5);

pub struct ReconfigController {
    resolver: Arc<SymbolResolver>,
    state: SharedSubscriptionState,
}

impl ReconfigController {
    pub fn new(resolver: Arc<SymbolResolver>, state: SharedSubscriptionState) -> Self {
        Self { resolver, state }
    }

    /// Runs until `ctx` is cancelled. On a detected change, cancels
    /// whichever per-connection token the upstream client currently has
    /// live in [`SharedSubscriptionState::conn_token`].
    pub async fn run(&self, ctx: CancellationToken) {
        let mut ticker = tokio::time::interval(POLL_INTERVAL);
        ticker.tick().await; // first tick fires immediately; skip it

        loop {
            tokio::select! {
                _ = ctx.cancelled() => return,
                _ = ticker.tick() => {
                    if let Err(e) = self.check_once().await {
                        tracing::warn!(error = %e, "reconfiguration check failed");
                    }
                }
            }
        }
    }

    async fn check_once(&self) -> crate::error::AppResult<()> {
        let new_set = self.resolver.resolve().await?;
        let current = self.state.current.load();

        let changed = new_set.len() != current.len()
            || !new_set.iter().all(|s| current.contains(s));

        if changed {
            info!(
                old_count = current.len(),
                new_count = new_set.len(),
                "symbol set changed, triggering resubscribe"
            );
            self.state.current.store(Arc::new(new_set));
            self.state.reconnect_flag.store(true, Ordering::SeqCst);
            self.state.conn_token.lock().unwrap().cancel();
        }

        Ok(())
    }
}
