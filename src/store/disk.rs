use crate::core::history::{ConversionRecord, HistoryEntry, HistoryError, HistoryStore};
use anyhow::{Context, Result};
use async_trait::async_trait;
use fjall::{Keyspace, PartitionCreateOptions, PartitionHandle, PersistMode};
use std::path::Path;
use tokio::sync::Mutex;
use tracing::debug;

const RECORDS_PARTITION: &str = "conversions";
const META_PARTITION: &str = "meta";
const NEXT_ID_KEY: &[u8] = b"next_id";

fn storage_error(e: impl std::fmt::Display) -> HistoryError {
    HistoryError::Storage(e.to_string())
}

fn decode_id(bytes: &[u8]) -> Result<u64, HistoryError> {
    let raw: [u8; 8] = bytes
        .try_into()
        .map_err(|_| storage_error(format!("invalid record key of {} bytes", bytes.len())))?;
    Ok(u64::from_be_bytes(raw))
}

/// History store persisted in a fjall keyspace.
///
/// Records are keyed by big-endian identifiers so iteration order is id order.
/// The next identifier lives in a separate partition and is committed in the
/// same batch as the record, so identifiers survive removals and restarts.
pub struct DiskHistoryStore {
    keyspace: Keyspace,
    records: PartitionHandle,
    meta: PartitionHandle,
    write_lock: Mutex<()>,
}

impl DiskHistoryStore {
    pub fn open(path: &Path) -> Result<Self> {
        std::fs::create_dir_all(path)
            .with_context(|| format!("Failed to create history directory: {}", path.display()))?;

        let keyspace = fjall::Config::new(path)
            .open()
            .with_context(|| format!("Failed to open history store at {}", path.display()))?;
        let records = keyspace.open_partition(RECORDS_PARTITION, PartitionCreateOptions::default())?;
        let meta = keyspace.open_partition(META_PARTITION, PartitionCreateOptions::default())?;
        debug!("Opened history store at {}", path.display());

        Ok(Self {
            keyspace,
            records,
            meta,
            write_lock: Mutex::new(()),
        })
    }

    fn next_id(&self) -> Result<u64, HistoryError> {
        match self.meta.get(NEXT_ID_KEY).map_err(storage_error)? {
            Some(value) => decode_id(&value),
            None => Ok(1),
        }
    }

    fn read_record(value: &[u8]) -> Result<ConversionRecord, HistoryError> {
        serde_json::from_slice(value).map_err(storage_error)
    }

    fn write_record(
        &self,
        id: u64,
        record: &ConversionRecord,
        next_id: Option<u64>,
    ) -> Result<(), HistoryError> {
        let value = serde_json::to_vec(record).map_err(storage_error)?;

        let mut batch = self.keyspace.batch();
        batch.insert(&self.records, id.to_be_bytes().to_vec(), value);
        if let Some(next_id) = next_id {
            batch.insert(&self.meta, NEXT_ID_KEY.to_vec(), next_id.to_be_bytes().to_vec());
        }
        batch.commit().map_err(storage_error)?;
        self.keyspace
            .persist(PersistMode::SyncAll)
            .map_err(storage_error)
    }
}

#[async_trait]
impl HistoryStore for DiskHistoryStore {
    async fn append(&self, record: ConversionRecord) -> Result<HistoryEntry, HistoryError> {
        let _guard = self.write_lock.lock().await;
        let id = self.next_id()?;
        self.write_record(id, &record, Some(id + 1))?;
        debug!("History APPEND id: {}", id);
        Ok(HistoryEntry { id, record })
    }

    async fn list(&self) -> Result<Vec<HistoryEntry>, HistoryError> {
        self.records
            .iter()
            .map(|item| {
                let (key, value) = item.map_err(storage_error)?;
                Ok(HistoryEntry {
                    id: decode_id(&key)?,
                    record: Self::read_record(&value)?,
                })
            })
            .collect()
    }

    async fn find(&self, id: u64) -> Result<Option<HistoryEntry>, HistoryError> {
        match self.records.get(id.to_be_bytes()).map_err(storage_error)? {
            Some(value) => Ok(Some(HistoryEntry {
                id,
                record: Self::read_record(&value)?,
            })),
            None => Ok(None),
        }
    }

    async fn update(
        &self,
        id: u64,
        record: ConversionRecord,
    ) -> Result<HistoryEntry, HistoryError> {
        let _guard = self.write_lock.lock().await;
        if !self
            .records
            .contains_key(id.to_be_bytes())
            .map_err(storage_error)?
        {
            return Err(HistoryError::NotFound(id));
        }
        self.write_record(id, &record, None)?;
        debug!("History UPDATE id: {}", id);
        Ok(HistoryEntry { id, record })
    }

    async fn remove(&self, id: u64) -> Result<(), HistoryError> {
        let _guard = self.write_lock.lock().await;
        if !self
            .records
            .contains_key(id.to_be_bytes())
            .map_err(storage_error)?
        {
            return Err(HistoryError::NotFound(id));
        }
        self.records
            .remove(id.to_be_bytes().to_vec())
            .map_err(storage_error)?;
        self.keyspace
            .persist(PersistMode::SyncAll)
            .map_err(storage_error)?;
        debug!("History REMOVE id: {}", id);
        Ok(())
    }
}
