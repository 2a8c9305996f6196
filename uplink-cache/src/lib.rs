//! Durable upload cache for pending telemetry payloads.
//!
//! A bounded, persistent store of not-yet-delivered payloads (span batches,
//! log batches, attachments) that survives process restarts, enforces
//! count/age retention limits, and tracks delivery-attempt counts for the
//! retry loop.
//!
//! # Architecture
//!
//! - [`RecordStore`] is the physical persistence boundary, with an LMDB
//!   backend for on-disk caches and a BTreeMap backend for in-memory ones.
//! - [`policy`] decides what to evict: a count-limit admission check before
//!   each new insert, and an age cutoff applied only on explicit vacuum.
//! - [`UploadCache`] is the public facade. All store access is owned by a
//!   single worker task fed over a channel, so the admission check and its
//!   insert are atomic with respect to every other mutation.
//!
//! # Failure Model
//!
//! This cache is a best-effort acceleration layer, not a source of truth.
//! Construction errors surface to the caller; runtime store errors are
//! logged and degrade to benign results (`false`, `None`, empty, 0).
//!
//! # Example
//!
//! ```ignore
//! let options = CacheOptions::on_disk("/var/lib/app/uplink", "uploads")?
//!     .with_count_limit(1_000)
//!     .with_age_limit_days(7);
//! let cache = UploadCache::new(options)?;
//!
//! cache.save("span-batch-1", UploadType::Spans, bytes).await;
//!
//! // Drain loop:
//! for record in cache.fetch_all().await {
//!     match deliver(&record).await {
//!         Ok(()) => cache.delete(&record.id, record.upload_type).await,
//!         Err(_) => {
//!             cache
//!                 .update_attempt_count(&record.id, record.upload_type, record.attempt_count + 1)
//!                 .await
//!         }
//!     }
//! }
//! ```

pub mod cache;
pub mod options;
pub mod policy;
pub mod store;

mod worker;

pub use cache::UploadCache;
pub use options::{Backing, CacheOptions, DEFAULT_AGE_LIMIT_DAYS};
pub use policy::OVERFLOW_MARGIN;
pub use store::{LmdbRecordStore, MemoryRecordStore, RecordStore};

// Re-export core types for API convenience
pub use uplink_core::{ConfigError, StoreError, StoreResult, Timestamp, UploadRecord, UploadType};
