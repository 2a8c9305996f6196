//! LMDB-backed record store.
//!
//! Uses the heed crate (Rust bindings for LMDB) to persist upload records
//! in a memory-mapped key-value store that survives process restarts.
//!
//! Every mutation runs in its own write transaction, so a failed write
//! commits nothing: readers never observe a half-written row.

use std::path::Path;

use async_trait::async_trait;
use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions};
use uplink_core::{StoreError, StoreResult, Timestamp, UploadRecord, UploadType};

use super::codec::{self, RecordKey};
use super::RecordStore;

/// Size of the LMDB memory map. Payloads are capped upstream by the
/// producers, so a fixed map comfortably covers any configured count limit.
const MAP_SIZE_BYTES: usize = 64 * 1024 * 1024;

/// LMDB-backed record store.
pub struct LmdbRecordStore {
    /// The LMDB environment.
    env: Env,
    /// The main database (single unnamed database).
    db: Database<Bytes, Bytes>,
}

impl LmdbRecordStore {
    /// Open (or create) the store at the given directory.
    ///
    /// With `reset_cache` set, any rows already stored at that directory
    /// are cleared before the store is returned.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created, the LMDB
    /// environment cannot be opened, or the database cannot be created.
    pub fn open<P: AsRef<Path>>(path: P, reset_cache: bool) -> StoreResult<Self> {
        let path = path.as_ref();
        std::fs::create_dir_all(path)?;

        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(MAP_SIZE_BYTES)
                .max_dbs(1)
                .open(path)
        }
        .map_err(|e| StoreError::EnvOpen(e.to_string()))?;

        let mut wtxn = env
            .write_txn()
            .map_err(|e| StoreError::Transaction(e.to_string()))?;

        let db: Database<Bytes, Bytes> = env
            .create_database(&mut wtxn, None)
            .map_err(|e| StoreError::DbOpen(e.to_string()))?;

        // heed keeps opened environments in a process-global registry, so
        // this open may hand back a live env for a previously opened path.
        // Deleting files on disk would not empty such an env; clearing the
        // table inside the transaction does, in every case.
        if reset_cache {
            db.clear(&mut wtxn)
                .map_err(|e| StoreError::Transaction(e.to_string()))?;
        }

        wtxn.commit()
            .map_err(|e| StoreError::Transaction(e.to_string()))?;

        Ok(Self { env, db })
    }

    /// Fetch the raw value bytes for a key, if present.
    fn get_raw(&self, encoded_key: &[u8]) -> StoreResult<Option<Vec<u8>>> {
        let rtxn = self
            .env
            .read_txn()
            .map_err(|e| StoreError::Transaction(e.to_string()))?;

        match self.db.get(&rtxn, encoded_key) {
            Ok(Some(bytes)) => Ok(Some(bytes.to_vec())),
            Ok(None) => Ok(None),
            Err(e) => Err(StoreError::Transaction(e.to_string())),
        }
    }

    /// Write a single key/value pair in its own transaction.
    fn put_raw(&self, encoded_key: &[u8], value: &[u8]) -> StoreResult<()> {
        let mut wtxn = self
            .env
            .write_txn()
            .map_err(|e| StoreError::Transaction(e.to_string()))?;

        self.db
            .put(&mut wtxn, encoded_key, value)
            .map_err(|e| StoreError::Transaction(e.to_string()))?;

        wtxn.commit()
            .map_err(|e| StoreError::Transaction(e.to_string()))
    }

    /// Collect the encoded keys of rows older than the cutoff.
    fn collect_keys_older_than(&self, cutoff: Timestamp) -> StoreResult<Vec<Vec<u8>>> {
        let cutoff_millis = cutoff.timestamp_millis();

        let rtxn = self
            .env
            .read_txn()
            .map_err(|e| StoreError::Transaction(e.to_string()))?;

        let mut keys = Vec::new();
        let iter = self
            .db
            .iter(&rtxn)
            .map_err(|e| StoreError::Transaction(e.to_string()))?;

        for result in iter {
            match result {
                Ok((key, value)) => {
                    if value.len() < 8 {
                        continue;
                    }
                    let millis_bytes: [u8; 8] = match value[0..8].try_into() {
                        Ok(bytes) => bytes,
                        Err(_) => continue,
                    };
                    if i64::from_le_bytes(millis_bytes) < cutoff_millis {
                        keys.push(key.to_vec());
                    }
                }
                Err(_) => continue,
            }
        }

        Ok(keys)
    }
}

#[async_trait]
impl RecordStore for LmdbRecordStore {
    async fn get(&self, id: &str, upload_type: UploadType) -> StoreResult<Option<UploadRecord>> {
        let key = RecordKey::new(id, upload_type);
        match self.get_raw(&key.encode())? {
            Some(value) => Ok(Some(codec::decode_record(&key, &value)?)),
            None => Ok(None),
        }
    }

    async fn get_all(&self) -> StoreResult<Vec<UploadRecord>> {
        let rtxn = self
            .env
            .read_txn()
            .map_err(|e| StoreError::Transaction(e.to_string()))?;

        let mut records = Vec::new();
        let iter = self
            .db
            .iter(&rtxn)
            .map_err(|e| StoreError::Transaction(e.to_string()))?;

        for result in iter {
            let (key_bytes, value) =
                result.map_err(|e| StoreError::Transaction(e.to_string()))?;

            let Some(key) = RecordKey::decode(key_bytes) else {
                tracing::debug!("skipping row with undecodable key");
                continue;
            };
            match codec::decode_record(&key, value) {
                Ok(record) => records.push(record),
                Err(e) => {
                    tracing::warn!(error = %e, id = %key.id, "skipping undecodable record");
                }
            }
        }

        Ok(records)
    }

    async fn upsert(&self, record: UploadRecord) -> StoreResult<()> {
        let key = RecordKey::new(&record.id, record.upload_type);
        let encoded_key = key.encode();

        // Existing row: keep its created_at and attempt_count, swap payload.
        let value = match self.get_raw(&encoded_key)? {
            Some(existing) => codec::patch_payload(&existing, &record.payload)?,
            None => codec::encode_value(&record),
        };

        self.put_raw(&encoded_key, &value)
    }

    async fn delete(&self, id: &str, upload_type: UploadType) -> StoreResult<()> {
        let encoded_key = RecordKey::new(id, upload_type).encode();

        let mut wtxn = self
            .env
            .write_txn()
            .map_err(|e| StoreError::Transaction(e.to_string()))?;

        self.db
            .delete(&mut wtxn, &encoded_key)
            .map_err(|e| StoreError::Transaction(e.to_string()))?;

        wtxn.commit()
            .map_err(|e| StoreError::Transaction(e.to_string()))
    }

    async fn delete_older_than(&self, cutoff: Timestamp) -> StoreResult<u64> {
        let keys_to_delete = self.collect_keys_older_than(cutoff)?;

        let mut wtxn = self
            .env
            .write_txn()
            .map_err(|e| StoreError::Transaction(e.to_string()))?;

        let mut deleted = 0u64;
        for key in &keys_to_delete {
            if self
                .db
                .delete(&mut wtxn, key)
                .map_err(|e| StoreError::Transaction(e.to_string()))?
            {
                deleted += 1;
            }
        }

        wtxn.commit()
            .map_err(|e| StoreError::Transaction(e.to_string()))?;

        Ok(deleted)
    }

    async fn set_attempt_count(
        &self,
        id: &str,
        upload_type: UploadType,
        count: u32,
    ) -> StoreResult<()> {
        let encoded_key = RecordKey::new(id, upload_type).encode();

        // Absent rows are left absent: this never creates a record.
        let Some(existing) = self.get_raw(&encoded_key)? else {
            return Ok(());
        };

        let patched = codec::patch_attempt_count(&existing, count)?;
        self.put_raw(&encoded_key, &patched)
    }

    async fn count(&self) -> StoreResult<usize> {
        let rtxn = self
            .env
            .read_txn()
            .map_err(|e| StoreError::Transaction(e.to_string()))?;

        let len = self
            .db
            .len(&rtxn)
            .map_err(|e| StoreError::Transaction(e.to_string()))?;

        Ok(len as usize)
    }

    fn close(self: Box<Self>) {
        let this = *self;
        // Dropping the env alone leaves it in heed's process-global
        // registry; prepare_for_closing evicts it. The wait resolves as
        // soon as this last reference is gone - no transactions are open
        // once the worker stops.
        this.env.prepare_for_closing().wait();
    }
}
