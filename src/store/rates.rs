use crate::core::cache::{RateSnapshot, RateSnapshotStore};
use anyhow::{Context, Result};
use async_trait::async_trait;
use fjall::{Keyspace, PartitionCreateOptions, PartitionHandle, PersistMode};
use std::path::Path;
use tracing::debug;

const RATES_PARTITION: &str = "rates";
const CURRENT_KEY: &[u8] = b"current";

/// Keeps the latest rate table on disk so separate runs of the CLI share it.
pub struct DiskRateStore {
    keyspace: Keyspace,
    rates: PartitionHandle,
}

impl DiskRateStore {
    pub fn open(path: &Path) -> Result<Self> {
        std::fs::create_dir_all(path)
            .with_context(|| format!("Failed to create rate cache directory: {}", path.display()))?;

        let keyspace = fjall::Config::new(path)
            .open()
            .with_context(|| format!("Failed to open rate cache at {}", path.display()))?;
        let rates = keyspace.open_partition(RATES_PARTITION, PartitionCreateOptions::default())?;
        debug!("Opened rate cache at {}", path.display());

        Ok(Self { keyspace, rates })
    }
}

#[async_trait]
impl RateSnapshotStore for DiskRateStore {
    async fn load(&self) -> Result<Option<RateSnapshot>> {
        match self.rates.get(CURRENT_KEY)? {
            Some(value) => {
                let snapshot = serde_json::from_slice(&value)
                    .context("Failed to decode persisted rate table")?;
                Ok(Some(snapshot))
            }
            None => Ok(None),
        }
    }

    async fn save(&self, snapshot: &RateSnapshot) -> Result<()> {
        self.rates
            .insert(CURRENT_KEY, serde_json::to_vec(snapshot)?)?;
        self.keyspace.persist(PersistMode::SyncAll)?;
        debug!(rates = snapshot.table.len(), "Rate table persisted");
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.rates.remove(CURRENT_KEY)?;
        self.keyspace.persist(PersistMode::SyncAll)?;
        Ok(())
    }
}
