//! The upload cache facade.
//!
//! [`UploadCache`] is the only entry point producers and the drain loop
//! use. Handles are cheap clones of a channel sender; the store itself
//! lives inside a single worker task (see [`crate::worker`]), which
//! serializes every operation.

use tokio::sync::{mpsc, oneshot};
use uplink_core::{StoreError, StoreResult, UploadRecord, UploadType};

use crate::options::{Backing, CacheOptions};
use crate::store::{LmdbRecordStore, MemoryRecordStore, RecordStore};
use crate::worker::{self, CacheCommand};

/// Capacity of the command channel feeding the worker. Producers block
/// (asynchronously) once this many commands are in flight.
const COMMAND_BUFFER: usize = 64;

/// Durable cache of pending upload payloads.
///
/// Cloning is cheap and every clone talks to the same worker. `save` and
/// friends resolve with the operation's final outcome, not "enqueued".
/// Runtime store failures degrade to benign results; only construction
/// can fail.
///
/// Must be created inside a tokio runtime, since it spawns the worker task.
#[derive(Clone)]
pub struct UploadCache {
    tx: mpsc::Sender<CacheCommand>,
}

impl UploadCache {
    /// Open the configured backing and spawn the cache worker.
    ///
    /// # Errors
    ///
    /// Returns an error if an on-disk backing cannot be opened. The cache
    /// is not created in that case.
    pub fn new(options: CacheOptions) -> StoreResult<Self> {
        let store: Box<dyn RecordStore> = match options.backing() {
            Backing::InMemory => Box::new(MemoryRecordStore::new()),
            Backing::OnDisk { base_dir, name } => Box::new(LmdbRecordStore::open(
                base_dir.join(name),
                options.reset_cache(),
            )?),
        };

        let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
        tokio::spawn(worker::run(store, options, rx));

        Ok(Self { tx })
    }

    /// Persist a payload, returning `true` iff it is now durably present.
    ///
    /// An existing record with the same key keeps its `created_at` and
    /// `attempt_count`; only the payload is replaced. A new key passes the
    /// count-limit admission check and starts with `attempt_count = 0`.
    pub async fn save(
        &self,
        id: impl Into<String>,
        upload_type: UploadType,
        payload: Vec<u8>,
    ) -> bool {
        self.request(|reply| CacheCommand::Save {
            id: id.into(),
            upload_type,
            payload,
            reply,
        })
        .await
        .unwrap_or(false)
    }

    /// Fetch a single cached record.
    pub async fn fetch(&self, id: impl Into<String>, upload_type: UploadType) -> Option<UploadRecord> {
        self.request(|reply| CacheCommand::Fetch {
            id: id.into(),
            upload_type,
            reply,
        })
        .await
        .flatten()
    }

    /// Fetch an immutable snapshot of every cached record.
    pub async fn fetch_all(&self) -> Vec<UploadRecord> {
        self.request(|reply| CacheCommand::FetchAll { reply })
            .await
            .unwrap_or_default()
    }

    /// Delete a cached record. No-op if absent.
    pub async fn delete(&self, id: impl Into<String>, upload_type: UploadType) {
        self.request(|reply| CacheCommand::Delete {
            id: id.into(),
            upload_type,
            reply,
        })
        .await;
    }

    /// Overwrite the attempt count of a cached record.
    ///
    /// No-op if the record is absent (e.g. deleted concurrently by the
    /// drain loop); never creates a row.
    pub async fn update_attempt_count(
        &self,
        id: impl Into<String>,
        upload_type: UploadType,
        count: u32,
    ) {
        self.request(|reply| CacheCommand::UpdateAttemptCount {
            id: id.into(),
            upload_type,
            count,
            reply,
        })
        .await;
    }

    /// Remove records older than the configured age limit.
    ///
    /// Returns the number of records removed; 0 immediately when the age
    /// limit is unbounded. Meant to be called on session boundaries, not
    /// on every write.
    pub async fn vacuum_stale(&self) -> u64 {
        self.request(|reply| CacheCommand::VacuumStale { reply })
            .await
            .unwrap_or(0)
    }

    /// Drain queued commands, stop the worker, and close the backing store.
    ///
    /// After this resolves the on-disk environment is released, so the
    /// same directory can be reopened by a new cache instance.
    pub async fn close(self) {
        self.request(|reply| CacheCommand::Shutdown { reply }).await;
    }

    /// Send a command and await its reply. `None` when the worker is gone;
    /// callers degrade that to their benign default.
    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> CacheCommand,
    ) -> Option<T> {
        let (reply, rx) = oneshot::channel();
        if self.tx.send(command(reply)).await.is_err() {
            tracing::warn!(error = %StoreError::WorkerGone, "dropping cache command");
            return None;
        }
        rx.await.ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn in_memory_cache() -> UploadCache {
        UploadCache::new(CacheOptions::in_memory()).expect("cache creation should succeed")
    }

    #[tokio::test]
    async fn test_save_fetch_roundtrip() {
        let cache = in_memory_cache();

        assert!(cache.save("x", UploadType::Log, vec![1, 2, 3]).await);

        let record = cache
            .fetch("x", UploadType::Log)
            .await
            .expect("record should exist");
        assert_eq!(record.payload, vec![1, 2, 3]);
        assert_eq!(record.attempt_count, 0);
    }

    #[tokio::test]
    async fn test_last_save_wins_per_key() {
        let cache = in_memory_cache();

        assert!(cache.save("x", UploadType::Spans, vec![1]).await);
        assert!(cache.save("x", UploadType::Spans, vec![2]).await);

        let all = cache.fetch_all().await;
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].payload, vec![2]);
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let cache = in_memory_cache();

        assert!(cache.save("x", UploadType::Spans, vec![1]).await);
        cache.delete("x", UploadType::Spans).await;
        cache.delete("x", UploadType::Spans).await;

        assert!(cache.fetch("x", UploadType::Spans).await.is_none());
        assert!(cache.fetch_all().await.is_empty());
    }

    #[tokio::test]
    async fn test_update_attempt_count() {
        let cache = in_memory_cache();

        assert!(cache.save("x", UploadType::Log, vec![1]).await);
        cache.update_attempt_count("x", UploadType::Log, 3).await;

        let record = cache
            .fetch("x", UploadType::Log)
            .await
            .expect("record should exist");
        assert_eq!(record.attempt_count, 3);
    }

    #[tokio::test]
    async fn test_update_attempt_count_missing_creates_nothing() {
        let cache = in_memory_cache();

        cache.update_attempt_count("ghost", UploadType::Log, 3).await;

        assert!(cache.fetch("ghost", UploadType::Log).await.is_none());
        assert!(cache.fetch_all().await.is_empty());
    }

    #[tokio::test]
    async fn test_vacuum_unbounded_age_returns_zero() {
        let cache = UploadCache::new(CacheOptions::in_memory().with_age_limit_days(0))
            .expect("cache creation should succeed");

        assert!(cache.save("x", UploadType::Spans, vec![1]).await);
        assert_eq!(cache.vacuum_stale().await, 0);
        assert_eq!(cache.fetch_all().await.len(), 1);
    }

    #[tokio::test]
    async fn test_vacuum_keeps_fresh_records() {
        let cache = UploadCache::new(CacheOptions::in_memory().with_age_limit_days(7))
            .expect("cache creation should succeed");

        assert!(cache.save("x", UploadType::Spans, vec![1]).await);
        assert_eq!(cache.vacuum_stale().await, 0);
    }

    #[tokio::test]
    async fn test_count_limit_enforced_through_facade() {
        let cache = UploadCache::new(CacheOptions::in_memory().with_count_limit(15))
            .expect("cache creation should succeed");

        for i in 0..20 {
            assert!(cache.save(format!("k{i:02}"), UploadType::Spans, vec![]).await);
        }

        // The 16th save hits the limit and trims to 5, so the final count
        // is the 5 survivors plus the 5 saves that followed the trim.
        let all = cache.fetch_all().await;
        assert_eq!(all.len(), 10);
        assert!(all.iter().all(|r| r.id.as_str() >= "k10"));
        assert!(cache.fetch("k19", UploadType::Spans).await.is_some());
        assert!(cache.fetch("k00", UploadType::Spans).await.is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_concurrent_producers_and_drain() {
        let cache = in_memory_cache();

        let mut handles = Vec::new();
        for producer in 0..4 {
            let cache = cache.clone();
            handles.push(tokio::spawn(async move {
                for i in 0..25 {
                    assert!(
                        cache
                            .save(format!("p{producer}-{i}"), UploadType::Log, vec![i as u8])
                            .await
                    );
                }
            }));
        }
        for handle in handles {
            handle.await.expect("producer task should not panic");
        }

        let all = cache.fetch_all().await;
        assert_eq!(all.len(), 100);

        // Drain loop: delete half, bump the rest.
        for record in &all {
            if record.id.starts_with("p0") || record.id.starts_with("p1") {
                cache.delete(&record.id, record.upload_type).await;
            } else {
                cache
                    .update_attempt_count(&record.id, record.upload_type, 1)
                    .await;
            }
        }

        let remaining = cache.fetch_all().await;
        assert_eq!(remaining.len(), 50);
        assert!(remaining.iter().all(|r| r.attempt_count == 1));
    }

    #[tokio::test]
    async fn test_operations_after_close_degrade_benignly() {
        let cache = in_memory_cache();
        let survivor = cache.clone();

        assert!(cache.save("x", UploadType::Log, vec![1]).await);
        cache.close().await;

        // The worker is gone for every clone: each call degrades to its
        // benign default instead of faulting.
        assert!(!survivor.save("y", UploadType::Log, vec![2]).await);
        assert!(survivor.fetch("x", UploadType::Log).await.is_none());
        assert!(survivor.fetch_all().await.is_empty());
        assert_eq!(survivor.vacuum_stale().await, 0);
        survivor.delete("x", UploadType::Log).await;
        survivor.update_attempt_count("x", UploadType::Log, 1).await;
    }

    #[tokio::test]
    async fn test_on_disk_cache_survives_reopen() {
        let temp_dir = TempDir::new().expect("TempDir creation should succeed");
        let options = CacheOptions::on_disk(temp_dir.path(), "uploads")
            .expect("options creation should succeed");

        let cache = UploadCache::new(options.clone()).expect("cache creation should succeed");
        assert!(cache.save("x", UploadType::Attachment, vec![7]).await);
        cache.close().await;

        let reopened = UploadCache::new(options).expect("reopen should succeed");
        let record = reopened
            .fetch("x", UploadType::Attachment)
            .await
            .expect("record should survive reopen");
        assert_eq!(record.payload, vec![7]);
        reopened.close().await;
    }

    #[tokio::test]
    async fn test_reset_cache_starts_empty() {
        let temp_dir = TempDir::new().expect("TempDir creation should succeed");
        let options = CacheOptions::on_disk(temp_dir.path(), "uploads")
            .expect("options creation should succeed");

        let cache = UploadCache::new(options.clone()).expect("cache creation should succeed");
        assert!(cache.save("x", UploadType::Spans, vec![1]).await);
        cache.close().await;

        let reset = UploadCache::new(options.with_reset_cache(true))
            .expect("reset open should succeed");
        assert!(reset.fetch_all().await.is_empty());
        reset.close().await;
    }
}
