//! Conversion pipeline: cache-aside rate resolution, decimal arithmetic and
//! history recording.
//!
//! Rate tables are fetched with a single-flight policy. While one fetch is in
//! progress every other caller that misses the cache awaits that same fetch
//! and receives its result, so a cold cache costs exactly one provider call no
//! matter how many conversions arrive together. A caller that gives up only
//! drops its own wait; the fetch keeps running for whoever is still waiting.

use crate::core::cache::{RATE_TABLE_TTL, RateCache};
use crate::core::error::{ConvertError, HistoryPersistenceFailed};
use crate::core::history::{ConversionRecord, HistoryEntry, HistoryError, HistoryStore};
use crate::core::rates::{ProviderError, RateProvider, RateTable};
use crate::providers::util::with_retry;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, warn};

type SharedFetch = Shared<BoxFuture<'static, Result<RateTable, ProviderError>>>;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Freshness window for a fetched rate table.
    pub rate_ttl: Duration,
    /// Extra provider attempts after a failed fetch.
    pub fetch_retries: usize,
    pub retry_delay: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            rate_ttl: RATE_TABLE_TTL,
            fetch_retries: 0,
            retry_delay: Duration::from_millis(500),
        }
    }
}

/// Outcome of a successful conversion.
///
/// The converted amount is always valid. `persisted` reports separately
/// whether the history record made it into the store.
#[derive(Debug)]
pub struct Conversion {
    pub record: ConversionRecord,
    pub persisted: Result<HistoryEntry, HistoryPersistenceFailed>,
}

impl Conversion {
    pub fn converted_amount(&self) -> Decimal {
        self.record.converted_amount
    }

    pub fn history_id(&self) -> Option<u64> {
        self.persisted.as_ref().ok().map(|entry| entry.id)
    }

    pub fn persistence_error(&self) -> Option<&HistoryPersistenceFailed> {
        self.persisted.as_ref().err()
    }
}

#[derive(Debug, Default)]
struct Counters {
    provider_fetches: AtomicU64,
    cache_hits: AtomicU64,
    persistence_failures: AtomicU64,
}

/// Snapshot of engine counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineStats {
    /// Provider calls made, retries included.
    pub provider_fetches: u64,
    pub cache_hits: u64,
    pub persistence_failures: u64,
}

pub struct ConversionEngine {
    provider: Arc<dyn RateProvider>,
    cache: Arc<RateCache>,
    history: Arc<dyn HistoryStore>,
    config: EngineConfig,
    in_flight: Arc<Mutex<Option<SharedFetch>>>,
    counters: Arc<Counters>,
}

impl ConversionEngine {
    pub fn new(
        provider: Arc<dyn RateProvider>,
        cache: Arc<RateCache>,
        history: Arc<dyn HistoryStore>,
        config: EngineConfig,
    ) -> Self {
        Self {
            provider,
            cache,
            history,
            config,
            in_flight: Arc::new(Mutex::new(None)),
            counters: Arc::new(Counters::default()),
        }
    }

    /// Converts `amount` from `base` to `target` and records the conversion.
    #[instrument(skip_all, fields(base = %base, target = %target, amount = %amount))]
    pub async fn convert(
        &self,
        base: &str,
        target: &str,
        amount: Decimal,
    ) -> Result<Conversion, ConvertError> {
        if base.trim().is_empty() {
            return Err(ConvertError::InvalidArgument(
                "base currency must be provided".to_string(),
            ));
        }
        if target.trim().is_empty() {
            return Err(ConvertError::InvalidArgument(
                "target currency must be provided".to_string(),
            ));
        }

        let table = self
            .resolve_rates()
            .await
            .map_err(ConvertError::RateUnavailable)?;

        let converted_amount = convert_amount(&table, base, target, amount)?;

        let record = ConversionRecord::new(base, target, amount, converted_amount);
        let persisted = match self.history.append(record.clone()).await {
            Ok(entry) => Ok(entry),
            Err(e) => {
                self.counters
                    .persistence_failures
                    .fetch_add(1, Ordering::Relaxed);
                error!(error = %e, "Failed to persist conversion history");
                Err(HistoryPersistenceFailed(e))
            }
        };

        info!(%converted_amount, "Conversion completed");
        Ok(Conversion { record, persisted })
    }

    pub async fn list_history(&self) -> Result<Vec<HistoryEntry>, HistoryError> {
        self.history.list().await
    }

    pub fn stats(&self) -> EngineStats {
        EngineStats {
            provider_fetches: self.counters.provider_fetches.load(Ordering::Relaxed),
            cache_hits: self.counters.cache_hits.load(Ordering::Relaxed),
            persistence_failures: self.counters.persistence_failures.load(Ordering::Relaxed),
        }
    }

    async fn resolve_rates(&self) -> Result<RateTable, ProviderError> {
        if let Some(table) = self.cached_rates().await {
            return Ok(table);
        }

        let fetch = {
            let mut in_flight = self.in_flight.lock().await;
            // A fetch may have completed since the first lookup
            if let Some(table) = self.cached_rates().await {
                return Ok(table);
            }
            match in_flight.as_ref() {
                Some(fetch) => {
                    debug!("Joining in-flight rate fetch");
                    fetch.clone()
                }
                None => {
                    debug!("Starting rate fetch");
                    let fetch = self.start_fetch();
                    *in_flight = Some(fetch.clone());
                    fetch
                }
            }
        };

        fetch.await
    }

    async fn cached_rates(&self) -> Option<RateTable> {
        let table = self.cache.get().await?;
        self.counters.cache_hits.fetch_add(1, Ordering::Relaxed);
        Some(table)
    }

    /// Builds the shared fetch. It publishes a fetched table to the cache
    /// before clearing the in-flight slot, so a caller holding the slot lock
    /// sees either the slot or the cached table.
    fn start_fetch(&self) -> SharedFetch {
        let provider = Arc::clone(&self.provider);
        let cache = Arc::clone(&self.cache);
        let in_flight = Arc::clone(&self.in_flight);
        let counters = Arc::clone(&self.counters);
        let config = self.config.clone();

        async move {
            let provider = &provider;
            let counters = &counters;
            let result = with_retry(
                move || {
                    counters.provider_fetches.fetch_add(1, Ordering::Relaxed);
                    provider.fetch()
                },
                config.fetch_retries,
                config.retry_delay,
            )
            .await;

            match &result {
                Ok(table) => {
                    debug!(rates = table.len(), provider = provider.name(), "Fetched rate table");
                    cache.set(table.clone(), config.rate_ttl).await;
                }
                Err(e) => warn!(error = %e, provider = provider.name(), "Rate fetch failed"),
            }

            in_flight.lock().await.take();
            result
        }
        .boxed()
        .shared()
    }
}

/// `amount * table[target] / table[base]`, failing with every code the table
/// lacks.
///
/// The product is formed before the division so exact results stay exact. The
/// precomputed ratio is only used when that product does not fit a `Decimal`.
pub fn convert_amount(
    table: &RateTable,
    base: &str,
    target: &str,
    amount: Decimal,
) -> Result<Decimal, ConvertError> {
    let (base_rate, target_rate) = match (table.rate(base), table.rate(target)) {
        (Some(b), Some(t)) => (b, t),
        (b, t) => {
            let mut codes = Vec::new();
            if b.is_none() {
                codes.push(base.to_string());
            }
            if t.is_none() && target != base {
                codes.push(target.to_string());
            }
            return Err(ConvertError::UnknownCurrency { codes });
        }
    };

    // Rates are positive, so division only fails on overflow
    amount
        .checked_mul(target_rate)
        .and_then(|product| product.checked_div(base_rate))
        .or_else(|| {
            target_rate
                .checked_div(base_rate)
                .and_then(|rate| amount.checked_mul(rate))
        })
        .ok_or_else(|| ConvertError::ArithmeticOverflow {
            base: base.to_string(),
            target: target.to_string(),
            amount,
        })
}
