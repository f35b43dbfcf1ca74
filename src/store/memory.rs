use crate::core::history::{ConversionRecord, HistoryEntry, HistoryError, HistoryStore};
use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::Mutex;
use tracing::debug;

struct MemoryState {
    next_id: u64,
    records: BTreeMap<u64, ConversionRecord>,
}

/// In-memory history store. Contents are lost when the process exits.
pub struct MemoryHistoryStore {
    inner: Mutex<MemoryState>,
}

impl MemoryHistoryStore {
    /// Creates an empty store whose first identifier is 1
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(MemoryState {
                next_id: 1,
                records: BTreeMap::new(),
            }),
        }
    }
}

impl Default for MemoryHistoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HistoryStore for MemoryHistoryStore {
    async fn append(&self, record: ConversionRecord) -> Result<HistoryEntry, HistoryError> {
        let mut state = self.inner.lock().await;
        let id = state.next_id;
        state.next_id += 1;
        state.records.insert(id, record.clone());
        debug!("History APPEND id: {}", id);
        Ok(HistoryEntry { id, record })
    }

    async fn list(&self) -> Result<Vec<HistoryEntry>, HistoryError> {
        let state = self.inner.lock().await;
        Ok(state
            .records
            .iter()
            .map(|(id, record)| HistoryEntry {
                id: *id,
                record: record.clone(),
            })
            .collect())
    }

    async fn find(&self, id: u64) -> Result<Option<HistoryEntry>, HistoryError> {
        let state = self.inner.lock().await;
        Ok(state.records.get(&id).map(|record| HistoryEntry {
            id,
            record: record.clone(),
        }))
    }

    async fn update(
        &self,
        id: u64,
        record: ConversionRecord,
    ) -> Result<HistoryEntry, HistoryError> {
        let mut state = self.inner.lock().await;
        let slot = state.records.get_mut(&id).ok_or(HistoryError::NotFound(id))?;
        *slot = record.clone();
        debug!("History UPDATE id: {}", id);
        Ok(HistoryEntry { id, record })
    }

    async fn remove(&self, id: u64) -> Result<(), HistoryError> {
        let mut state = self.inner.lock().await;
        if state.records.remove(&id).is_none() {
            return Err(HistoryError::NotFound(id));
        }
        debug!("History REMOVE id: {}", id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn record(target: &str) -> ConversionRecord {
        ConversionRecord::new("USD", target, dec!(100), dec!(85.00))
    }

    #[tokio::test]
    async fn test_append_assigns_increasing_ids() {
        let store = MemoryHistoryStore::new();

        let first = store.append(record("EUR")).await.unwrap();
        let second = store.append(record("GBP")).await.unwrap();
        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);

        let all = store.list().await.unwrap();
        assert_eq!(all, vec![first, second]);
    }

    #[tokio::test]
    async fn test_find_update_remove() {
        let store = MemoryHistoryStore::new();
        let entry = store.append(record("EUR")).await.unwrap();

        assert_eq!(store.find(entry.id).await.unwrap(), Some(entry.clone()));
        assert!(store.find(99).await.unwrap().is_none());

        let updated = store.update(entry.id, record("JPY")).await.unwrap();
        assert_eq!(updated.record.target_currency, "JPY");
        assert_eq!(
            store.find(entry.id).await.unwrap().unwrap().record.target_currency,
            "JPY"
        );

        store.remove(entry.id).await.unwrap();
        assert!(store.find(entry.id).await.unwrap().is_none());
        assert!(matches!(
            store.remove(entry.id).await,
            Err(HistoryError::NotFound(1))
        ));
        assert!(matches!(
            store.update(7, record("EUR")).await,
            Err(HistoryError::NotFound(7))
        ));
    }

    #[tokio::test]
    async fn test_ids_are_not_reused_after_remove() {
        let store = MemoryHistoryStore::new();
        let first = store.append(record("EUR")).await.unwrap();
        store.remove(first.id).await.unwrap();

        let second = store.append(record("EUR")).await.unwrap();
        assert_eq!(second.id, 2);
    }
}
