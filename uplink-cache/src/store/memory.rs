//! In-memory record store.
//!
//! A process-local table behind the same [`RecordStore`] contract as the
//! LMDB backend. Rows are keyed by the encoded record key, so iteration
//! order matches the on-disk backend exactly.

use std::collections::BTreeMap;
use std::sync::RwLock;

use async_trait::async_trait;
use uplink_core::{StoreError, StoreResult, Timestamp, UploadRecord, UploadType};

use super::codec::RecordKey;
use super::RecordStore;

/// In-memory record store backed by a `BTreeMap`.
#[derive(Default)]
pub struct MemoryRecordStore {
    rows: RwLock<BTreeMap<Vec<u8>, UploadRecord>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn get(&self, id: &str, upload_type: UploadType) -> StoreResult<Option<UploadRecord>> {
        let rows = self
            .rows
            .read()
            .map_err(|_| StoreError::Transaction("lock poisoned".to_string()))?;
        Ok(rows.get(&RecordKey::new(id, upload_type).encode()).cloned())
    }

    async fn get_all(&self) -> StoreResult<Vec<UploadRecord>> {
        let rows = self
            .rows
            .read()
            .map_err(|_| StoreError::Transaction("lock poisoned".to_string()))?;
        Ok(rows.values().cloned().collect())
    }

    async fn upsert(&self, record: UploadRecord) -> StoreResult<()> {
        let key = RecordKey::new(&record.id, record.upload_type).encode();
        let mut rows = self
            .rows
            .write()
            .map_err(|_| StoreError::Transaction("lock poisoned".to_string()))?;

        match rows.get_mut(&key) {
            // Existing row: keep created_at and attempt_count, swap payload.
            Some(existing) => existing.payload = record.payload,
            None => {
                rows.insert(key, record);
            }
        }
        Ok(())
    }

    async fn delete(&self, id: &str, upload_type: UploadType) -> StoreResult<()> {
        let mut rows = self
            .rows
            .write()
            .map_err(|_| StoreError::Transaction("lock poisoned".to_string()))?;
        rows.remove(&RecordKey::new(id, upload_type).encode());
        Ok(())
    }

    async fn delete_older_than(&self, cutoff: Timestamp) -> StoreResult<u64> {
        let mut rows = self
            .rows
            .write()
            .map_err(|_| StoreError::Transaction("lock poisoned".to_string()))?;

        let before = rows.len();
        rows.retain(|_, record| record.created_at >= cutoff);
        Ok((before - rows.len()) as u64)
    }

    async fn set_attempt_count(
        &self,
        id: &str,
        upload_type: UploadType,
        count: u32,
    ) -> StoreResult<()> {
        let mut rows = self
            .rows
            .write()
            .map_err(|_| StoreError::Transaction("lock poisoned".to_string()))?;

        // Absent rows are left absent: this never creates a record.
        if let Some(record) = rows.get_mut(&RecordKey::new(id, upload_type).encode()) {
            record.attempt_count = count;
        }
        Ok(())
    }

    async fn count(&self) -> StoreResult<usize> {
        let rows = self
            .rows
            .read()
            .map_err(|_| StoreError::Transaction("lock poisoned".to_string()))?;
        Ok(rows.len())
    }
}
