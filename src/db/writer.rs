//! Store writer.
//!
//! One operation: `save_batch`. Opens one connection, begins one
//! transaction, issues a single `INSERT ... ON CONFLICT DO NOTHING` that
//! expands parallel arrays into rows via `sqlx::QueryBuilder`.
//! Commits on success; rolls back and returns the error otherwise.

use crate::error::{AppError, AppResult};
use crate::trade::Trade;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, QueryBuilder};
use std::time::{Duration, Instant};
use tracing::{error, info};

/// The sink interface the batch writer depends on: anything that can
/// commit a slice of trades atomically can stand in for [`StoreWriter`],
/// including a direct (per-row, effectively `batch_size == 1`) writer or
/// a test double.
#[async_trait::async_trait]
pub trait BatchSink: Send + Sync {
    async fn save_batch(&self, trades: &[Trade]) -> AppResult<()>;
}

#[async_trait::async_trait]
impl BatchSink for StoreWriter {
    async fn save_batch(&self, trades: &[Trade]) -> AppResult<()> {
        StoreWriter::save_batch(self, trades).await
    }
}

const SCHEMA_DDL: &str = r#"
CREATE TABLE IF NOT EXISTS trades (
    symbol TEXT NOT NULL,
    price DECIMAL NOT NULL,
    quantity DECIMAL NOT NULL,
    trade_id BIGINT NOT NULL,
    utime TIMESTAMPTZ NOT NULL,
    PRIMARY KEY (symbol, trade_id)
)
"#;

#[derive(Clone)]
pub struct StoreWriter {
    pool: PgPool,
}

impl StoreWriter {
    pub async fn connect(dsn: &str) -> AppResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(dsn)
            .await?;
        let writer = Self { pool };
        writer.ensure_schema().await?;
        Ok(writer)
    }

    async fn ensure_schema(&self) -> AppResult<()> {
        sqlx::query(SCHEMA_DDL).execute(&self.pool).await?;
        Ok(())
    }

    /// Persists `trades` in one transaction. Empty input is a no-op.
    /// Every symbol must already be alphanumeric/non-empty — this is a
    /// precondition, not re-validated here (the parser and resolver own
    /// that check.
    pub async fn save_batch(&self, trades: &[Trade]) -> AppResult<()> {
        if trades.is_empty() {
            return Ok(());
        }

        let start = Instant::now();
        let mut tx = self.pool.begin().await?;

        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(
            "INSERT INTO trades (symbol, trade_id, price, quantity, utime) ",
        );

        qb.push_values(trades.iter(), |mut b, trade| {
            b.push_bind(&trade.symbol)
                .push_bind(trade.trade_id)
                .push_bind(trade.price)
                .push_bind(trade.quantity)
                .push_bind(trade.trade_time);
        });

        qb.push(" ON CONFLICT (symbol, trade_id) DO NOTHING");

        let result = qb.build().execute(&mut *tx).await;

        match result {
            Ok(_) => {
                tx.commit().await?;
                info!(
                    rows = trades.len(),
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "batch committed"
                );
                Ok(())
            }
            Err(e) => {
                // tx rolls back on drop
                error!(error = %e, rows = trades.len(), "batch commit failed, rolling back");
                Err(AppError::Sqlx(e))
            }
        }
    }

    /// Retries `save_batch` up to `retries` times with linear backoff
    /// before giving up. Default wiring uses `retries = 0` (discard on
    /// first failure by default); raising this is an
    /// explicit operator choice, not an inferred one.
    pub async fn save_batch_with_retry(
        &self,
        trades: &[Trade],
        retries: usize,
        backoff: Duration,
    ) -> AppResult<()> {
        let mut attempt = 0usize;
        loop {
            match self.save_batch(trades).await {
                Ok(()) => return Ok(()),
                Err(_) if attempt < retries => {
                    attempt += 1;
                    tokio::time::sleep(backoff).await;
                    continue;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
