//! On-disk JSON configuration: symbol list, store DSN, batch size.
//!
//! The file is hot-reloadable — the reconfiguration controller polls it
//! for changes. Cleanup of invalid symbol entries rewrites only the
//! `Symbols` array in place, preserving the rest of the document via
//! `serde_json::Value` surgery rather than round-tripping through a typed
//! struct (which would lose unknown fields and key order).

use crate::error::{AppError, AppResult};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Once;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(rename = "Symbols")]
    pub symbols: Vec<String>,

    #[serde(rename = "Postgres")]
    pub postgres: String,

    #[serde(rename = "BatchSize")]
    pub batch_size: usize,
}

impl Config {
    fn validate(&self) -> AppResult<()> {
        if self.batch_size == 0 {
            return Err(AppError::InvalidConfig(
                "BatchSize must be > 0".to_string(),
            ));
        }
        if self.postgres.trim().is_empty() {
            return Err(AppError::MissingConfig("Postgres"));
        }
        Ok(())
    }
}

/// Loads and hot-reloads the JSON config file at a fixed path.
#[derive(Debug, Clone)]
pub struct ConfigHandle {
    path: PathBuf,
}

static CLEANUP_ONCE: Once = Once::new();

impl ConfigHandle {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads and parses the config file from disk.
    pub fn load(&self) -> AppResult<Config> {
        let raw = std::fs::read_to_string(&self.path)?;
        let cfg: Config = serde_json::from_str(&raw).map_err(AppError::ConfigJson)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// One-shot removal of symbol entries that fail format validation from
    /// the on-disk file, gated so it only ever runs once per process
    /// lifetime. No-op on the second and subsequent calls.
    pub fn cleanup_invalid_symbols_once(&self, min_len: usize, max_len: usize) -> AppResult<()> {
        let mut result = Ok(());
        CLEANUP_ONCE.call_once(|| {
            result = self.cleanup_invalid_symbols(min_len, max_len);
        });
        result
    }

    fn cleanup_invalid_symbols(&self, min_len: usize, max_len: usize) -> AppResult<()> {
        let raw = std::fs::read_to_string(&self.path)?;
        let mut doc: serde_json::Value = serde_json::from_str(&raw).map_err(AppError::ConfigJson)?;

        let Some(symbols) = doc.get_mut("Symbols").and_then(|v| v.as_array_mut()) else {
            return Ok(());
        };

        let before = symbols.len();
        symbols.retain(|v| {
            v.as_str()
                .is_some_and(|s| crate::trade::is_valid_symbol(s, min_len, max_len))
        });

        if symbols.len() != before {
            let rewritten = serde_json::to_string_pretty(&doc)?;
            std::fs::write(&self.path, rewritten)?;
        }

        Ok(())
    }
}
