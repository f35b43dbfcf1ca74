use crate::core::rates::RateTable;
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Freshness window applied to a newly fetched rate table.
pub const RATE_TABLE_TTL: Duration = Duration::from_secs(15 * 60);

/// A rate table together with the instant it stops being readable.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    table: RateTable,
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn new(table: RateTable, ttl: Duration) -> Self {
        // `None` only when now + ttl is not representable
        let expires_at = Instant::now().checked_add(ttl);
        Self { table, expires_at }
    }

    fn is_valid_at(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|expiry| now < expiry)
    }
}

/// Rate table as written to a persistent tier, stamped with wall-clock expiry
/// so it stays meaningful across process restarts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateSnapshot {
    pub table: RateTable,
    pub expires_at: Option<SystemTime>,
}

impl RateSnapshot {
    /// Time left before expiry, `None` once expired.
    fn remaining(&self, now: SystemTime) -> Option<Duration> {
        match self.expires_at {
            Some(expiry) => expiry.duration_since(now).ok().filter(|d| !d.is_zero()),
            None => Some(Duration::MAX),
        }
    }
}

/// Durable home for the current rate table, shared between runs.
#[async_trait]
pub trait RateSnapshotStore: Send + Sync {
    async fn load(&self) -> Result<Option<RateSnapshot>>;
    async fn save(&self, snapshot: &RateSnapshot) -> Result<()>;
    async fn clear(&self) -> Result<()>;
}

/// Holds the single current rate table.
///
/// Reads never observe an expired table: an entry past its expiration is
/// evicted and reported as a miss. With a persistent tier attached, a miss in
/// memory falls through to the stored snapshot, and every `set` is written
/// through to it. Persistent tier failures are logged and treated as misses.
#[derive(Default)]
pub struct RateCache {
    entry: RwLock<Option<CacheEntry>>,
    persistent: Option<Arc<dyn RateSnapshotStore>>,
}

impl RateCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_persistence(store: Arc<dyn RateSnapshotStore>) -> Self {
        Self {
            entry: RwLock::new(None),
            persistent: Some(store),
        }
    }

    pub async fn get(&self) -> Option<RateTable> {
        if let Some(table) = self.get_in_memory().await {
            return Some(table);
        }

        let snapshot = self.load_snapshot().await?;
        let remaining = snapshot.remaining(SystemTime::now())?;

        let mut entry = self.entry.write().await;
        if let Some(e) = entry.as_ref().filter(|e| e.is_valid_at(Instant::now())) {
            return Some(e.table.clone());
        }
        debug!(rates = snapshot.table.len(), "Rate cache HIT (persisted)");
        *entry = Some(CacheEntry::new(snapshot.table.clone(), remaining));
        Some(snapshot.table)
    }

    async fn load_snapshot(&self) -> Option<RateSnapshot> {
        let store = self.persistent.as_ref()?;
        let snapshot = match store.load().await {
            Ok(snapshot) => snapshot?,
            Err(e) => {
                warn!(error = %e, "Failed to read persisted rate table");
                return None;
            }
        };

        if snapshot.remaining(SystemTime::now()).is_none() {
            debug!("Persisted rate table expired, evicting");
            if let Err(e) = store.clear().await {
                warn!(error = %e, "Failed to evict persisted rate table");
            }
            return None;
        }
        Some(snapshot)
    }

    async fn get_in_memory(&self) -> Option<RateTable> {
        {
            let entry = self.entry.read().await;
            match entry.as_ref() {
                Some(e) if e.is_valid_at(Instant::now()) => {
                    debug!("Rate cache HIT");
                    return Some(e.table.clone());
                }
                Some(_) => {}
                None => {
                    debug!("Rate cache MISS");
                    return None;
                }
            }
        }

        let mut entry = self.entry.write().await;
        // A writer may have replaced the entry between the two locks
        match entry.as_ref() {
            Some(e) if e.is_valid_at(Instant::now()) => {
                debug!("Rate cache HIT");
                Some(e.table.clone())
            }
            Some(_) => {
                debug!("Rate cache entry expired, evicting");
                *entry = None;
                None
            }
            None => {
                debug!("Rate cache MISS");
                None
            }
        }
    }

    /// Replaces whatever is cached, expired or not.
    pub async fn set(&self, table: RateTable, ttl: Duration) {
        {
            let mut entry = self.entry.write().await;
            debug!(rates = table.len(), ttl_secs = ttl.as_secs(), "Rate cache SET");
            *entry = Some(CacheEntry::new(table.clone(), ttl));
        }

        if let Some(store) = &self.persistent {
            let snapshot = RateSnapshot {
                table,
                expires_at: SystemTime::now().checked_add(ttl),
            };
            if let Err(e) = store.save(&snapshot).await {
                warn!(error = %e, "Failed to persist rate table");
            }
        }
    }

    pub async fn invalidate(&self) {
        {
            let mut entry = self.entry.write().await;
            *entry = None;
        }
        if let Some(store) = &self.persistent {
            if let Err(e) = store.clear().await {
                warn!(error = %e, "Failed to clear persisted rate table");
            }
        }
        debug!("Rate cache INVALIDATE");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::collections::HashMap;
    use tokio::time::advance;

    fn table(code: &str) -> RateTable {
        RateTable::new(HashMap::from([(code.to_string(), dec!(1.5))])).unwrap()
    }

    #[tokio::test]
    async fn test_cache_get_set() {
        let cache = RateCache::new();

        // Initially, cache is empty
        assert!(cache.get().await.is_none());

        cache.set(table("EUR"), RATE_TABLE_TTL).await;
        assert_eq!(cache.get().await, Some(table("EUR")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cache_ttl_expiration() {
        let cache = RateCache::new();
        cache.set(table("EUR"), Duration::from_secs(60)).await;

        advance(Duration::from_secs(59)).await;
        assert!(cache.get().await.is_some());

        // Valid strictly before the expiration instant
        advance(Duration::from_secs(1)).await;
        assert!(cache.get().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_replaces_expired_and_live_entries() {
        let cache = RateCache::new();
        cache.set(table("EUR"), Duration::from_secs(10)).await;
        cache.set(table("GBP"), Duration::from_secs(10)).await;
        assert_eq!(cache.get().await, Some(table("GBP")));

        advance(Duration::from_secs(11)).await;
        cache.set(table("JPY"), Duration::from_secs(10)).await;
        assert_eq!(cache.get().await, Some(table("JPY")));
    }

    #[tokio::test]
    async fn test_cache_invalidate() {
        let cache = RateCache::new();
        cache.set(table("EUR"), RATE_TABLE_TTL).await;

        cache.invalidate().await;
        assert!(cache.get().await.is_none());
    }

    #[derive(Default)]
    struct SnapshotSlot {
        snapshot: std::sync::Mutex<Option<RateSnapshot>>,
        fail: bool,
    }

    #[async_trait]
    impl RateSnapshotStore for SnapshotSlot {
        async fn load(&self) -> Result<Option<RateSnapshot>> {
            if self.fail {
                anyhow::bail!("unreadable");
            }
            Ok(self.snapshot.lock().unwrap().clone())
        }

        async fn save(&self, snapshot: &RateSnapshot) -> Result<()> {
            if self.fail {
                anyhow::bail!("read-only");
            }
            *self.snapshot.lock().unwrap() = Some(snapshot.clone());
            Ok(())
        }

        async fn clear(&self) -> Result<()> {
            *self.snapshot.lock().unwrap() = None;
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_set_writes_through_to_persistent_tier() {
        let slot = Arc::new(SnapshotSlot::default());
        let cache = RateCache::with_persistence(slot.clone());
        cache.set(table("EUR"), RATE_TABLE_TTL).await;

        let stored = slot.snapshot.lock().unwrap().clone().unwrap();
        assert_eq!(stored.table, table("EUR"));
        assert!(stored.expires_at.unwrap() > SystemTime::now());

        // A fresh cache over the same tier sees the table
        let restarted = RateCache::with_persistence(slot.clone());
        assert_eq!(restarted.get().await, Some(table("EUR")));

        restarted.invalidate().await;
        assert!(slot.snapshot.lock().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_expired_snapshot_is_a_miss() {
        let slot = Arc::new(SnapshotSlot::default());
        *slot.snapshot.lock().unwrap() = Some(RateSnapshot {
            table: table("EUR"),
            expires_at: Some(SystemTime::now() - Duration::from_secs(1)),
        });

        let cache = RateCache::with_persistence(slot.clone());
        assert!(cache.get().await.is_none());
        assert!(slot.snapshot.lock().unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_loaded_snapshot_keeps_remaining_ttl() {
        let slot = Arc::new(SnapshotSlot::default());
        *slot.snapshot.lock().unwrap() = Some(RateSnapshot {
            table: table("EUR"),
            expires_at: Some(SystemTime::now() + Duration::from_secs(60)),
        });

        let cache = RateCache::with_persistence(slot.clone());
        assert!(cache.get().await.is_some());

        // Served from memory after the first read, expiring with the snapshot
        slot.snapshot.lock().unwrap().take();
        advance(Duration::from_secs(30)).await;
        assert!(cache.get().await.is_some());
        advance(Duration::from_secs(31)).await;
        assert!(cache.get().await.is_none());
    }

    #[tokio::test]
    async fn test_persistent_tier_failures_degrade_to_memory() {
        let cache = RateCache::with_persistence(Arc::new(SnapshotSlot {
            fail: true,
            ..SnapshotSlot::default()
        }));

        assert!(cache.get().await.is_none());
        cache.set(table("EUR"), RATE_TABLE_TTL).await;
        assert_eq!(cache.get().await, Some(table("EUR")));
    }
}
