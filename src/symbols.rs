//! Symbol validator / config resolver.
//!
//! `resolve()` extracts the symbol array from the external config and
//! returns the subset that is both format-valid and recognized by the
//! exchange's reference-data endpoint, caching the recognized-set lookup
//! for 10 minutes keyed by the sorted input set. If the endpoint can't be
//! reached, resolution degrades to the format-valid subset.

use crate::config::ConfigHandle;
use crate::error::AppResult;
use crate::trade::is_valid_symbol;
use std::collections::{BTreeSet, HashSet};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::warn;

const MIN_LEN: usize = 4;
const MAX_LEN: usize = 12;
const CACHE_TTL: Duration = Duration::from_secs(10 * 60);

pub const REFERENCE_ENDPOINT: &str = "https://api.binance.com/api/v3/exchangeInfo";

struct CacheEntry {
    key: Vec<String>,
    recognized: HashSet<String>,
    fetched_at: Instant,
}

pub struct SymbolResolver {
    config: ConfigHandle,
    http: reqwest::Client,
    endpoint: String,
    cache: Mutex<Option<CacheEntry>>,
}

impl SymbolResolver {
    pub fn new(config: ConfigHandle) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
            endpoint: REFERENCE_ENDPOINT.to_string(),
            cache: Mutex::new(None),
        }
    }

    #[cfg(test)]
    pub fn with_endpoint(config: ConfigHandle, endpoint: impl Into<String>) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
            endpoint: endpoint.into(),
            cache: Mutex::new(None),
        }
    }

    /// Resolves the currently authoritative symbol set: format-valid and
    /// (when reachable) recognized by the reference endpoint.
    ///
    /// Performs the one-shot on-disk cleanup as a side effect of the first
    /// call.
    pub async fn resolve(&self) -> AppResult<BTreeSet<String>> {
        let cfg = self.config.load()?;
        self.config
            .cleanup_invalid_symbols_once(MIN_LEN, MAX_LEN)?;

        let format_valid: BTreeSet<String> = cfg
            .symbols
            .iter()
            .map(|s| s.to_uppercase())
            .filter(|s| is_valid_symbol(s, MIN_LEN, MAX_LEN))
            .collect();

        match self.recognized_set(&format_valid).await {
            Ok(recognized) => Ok(format_valid
                .into_iter()
                .filter(|s| recognized.contains(s))
                .collect()),
            Err(e) => {
                warn!(error = %e, "reference endpoint unreachable, degrading to format-valid subset");
                Ok(format_valid)
            }
        }
    }

    async fn recognized_set(&self, requested: &BTreeSet<String>) -> AppResult<HashSet<String>> {
        let key: Vec<String> = requested.iter().cloned().collect();

        {
            let guard = self.cache.lock().unwrap();
            if let Some(entry) = guard.as_ref() {
                if entry.key == key && entry.fetched_at.elapsed() < CACHE_TTL {
                    return Ok(entry.recognized.clone());
                }
            }
        }

        let recognized = self.fetch_recognized_set().await?;

        let mut guard = self.cache.lock().unwrap();
        *guard = Some(CacheEntry {
            key,
            recognized: recognized.clone(),
            fetched_at: Instant::now(),
        });

        Ok(recognized)
    }

    async fn fetch_recognized_set(&self) -> AppResult<HashSet<String>> {
        #[derive(serde::Deserialize)]
        struct ExchangeInfo {
            symbols: Vec<SymbolEntry>,
        }
        #[derive(serde::Deserialize)]
        struct SymbolEntry {
            symbol: String,
        }

        let resp = self.http.get(&self.endpoint).send().await?;
        let info: ExchangeInfo = resp.json().await?;
        Ok(info.symbols.into_iter().map(|s| s.symbol).collect())
    }
}
