//! Record store: physical persistence of upload records.
//!
//! The [`RecordStore`] trait abstracts over the backing medium. Two
//! implementations exist: [`LmdbRecordStore`] for on-disk caches and
//! [`MemoryRecordStore`] for in-memory ones. Both share the binary
//! layout defined in [`codec`].

pub mod codec;
pub mod lmdb;
pub mod memory;

pub use codec::RecordKey;
pub use lmdb::LmdbRecordStore;
pub use memory::MemoryRecordStore;

use async_trait::async_trait;
use uplink_core::{StoreResult, Timestamp, UploadRecord, UploadType};

/// Physical persistence of [`UploadRecord`] rows keyed by `(id, upload_type)`.
///
/// Implementations must make each mutation atomic: a failed write leaves
/// no half-written row visible to readers. Serialization of concurrent
/// mutations is the facade's job, not the store's.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Fetch a single record. No side effects.
    async fn get(&self, id: &str, upload_type: UploadType) -> StoreResult<Option<UploadRecord>>;

    /// Fetch an immutable snapshot of every stored record, in key order.
    /// Mutations after the call are not visible in the returned vector.
    async fn get_all(&self) -> StoreResult<Vec<UploadRecord>>;

    /// Insert the record, or replace only the `payload` of an existing row
    /// with the same key. `attempt_count` and `created_at` of an existing
    /// row are preserved.
    async fn upsert(&self, record: UploadRecord) -> StoreResult<()>;

    /// Delete a record. No-op if absent.
    async fn delete(&self, id: &str, upload_type: UploadType) -> StoreResult<()>;

    /// Delete every record with `created_at < cutoff`. Returns the count
    /// of rows removed.
    async fn delete_older_than(&self, cutoff: Timestamp) -> StoreResult<u64>;

    /// Overwrite the attempt count of a record. No-op if absent; never
    /// alters `created_at` or `payload`.
    async fn set_attempt_count(
        &self,
        id: &str,
        upload_type: UploadType,
        count: u32,
    ) -> StoreResult<()>;

    /// Current row count.
    async fn count(&self) -> StoreResult<usize>;

    /// Release the backing resources. Called once by the worker when it
    /// stops; after this returns the backing can be reopened fresh.
    fn close(self: Box<Self>) {}
}
