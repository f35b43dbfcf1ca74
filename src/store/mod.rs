pub mod disk;
pub mod memory;
pub mod rates;

use crate::core::cache::RateCache;
use crate::core::config::{AppConfig, StorageBackend};
use crate::core::history::HistoryStore;
use anyhow::Result;
use disk::DiskHistoryStore;
use memory::MemoryHistoryStore;
use rates::DiskRateStore;
use std::sync::Arc;
use tracing::debug;

/// Opens the history store selected in the configuration.
pub fn open_history_store(config: &AppConfig) -> Result<Arc<dyn HistoryStore>> {
    match config.history.backend {
        StorageBackend::Disk => {
            let path = config.history_path()?;
            Ok(Arc::new(DiskHistoryStore::open(&path)?))
        }
        StorageBackend::Memory => {
            debug!("Using in-memory history store");
            Ok(Arc::new(MemoryHistoryStore::new()))
        }
    }
}

/// Builds the rate cache, backed by disk unless the config asks for memory.
pub fn open_rate_cache(config: &AppConfig) -> Result<Arc<RateCache>> {
    match config.cache.backend {
        StorageBackend::Disk => {
            let path = config.rate_cache_path()?;
            let store = DiskRateStore::open(&path)?;
            Ok(Arc::new(RateCache::with_persistence(Arc::new(store))))
        }
        StorageBackend::Memory => {
            debug!("Using in-memory rate cache");
            Ok(Arc::new(RateCache::new()))
        }
    }
}
