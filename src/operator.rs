//! Operator command reader: polls standard input every
//! 100 ms; on the space key, logs the current counter value.
//!
//! Stdin isn't natively async, so the blocking read is isolated on a
//! `spawn_blocking` task and its lines are relayed over a channel the
//! async poll loop drains on the 100 ms cadence. A raw-mode single-key
//! read would observe the space key sooner, but would need a raw-mode TTY
//! crate; line-buffered stdin is the portable option without one.

use crate::stats::TradeCounter;
use std::io::BufRead;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::info;

pub async fn run_operator_command_reader(counter: TradeCounter, ctx: CancellationToken) {
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();

    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            match line {
                Ok(l) => {
                    if tx.send(l).is_err() {
                        break;
                    }
                }
                Err(_) => break,
            }
        }
    });

    let mut ticker = tokio::time::interval(Duration::from_millis(100));

    loop {
        tokio::select! {
            _ = ctx.cancelled() => return,
            _ = ticker.tick() => {
                while let Ok(line) = rx.try_recv() {
                    if line.contains(' ') || line.trim().is_empty() {
                        info!(trades_persisted = counter.get(), "operator counter query");
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn shuts_down_promptly_on_cancellation() {
        let ctx = CancellationToken::new();
        let counter = TradeCounter::new();
        let ctx2 = ctx.clone();

        let handle = tokio::spawn(async move { run_operator_command_reader(counter, ctx2).await });

        ctx.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("operator reader should stop within 1s of cancellation")
            .unwrap();
    }
}
