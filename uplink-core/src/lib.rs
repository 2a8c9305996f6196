//! Uplink Core - Upload Record Types
//!
//! Pure data structures with no behavior. The cache crate depends on this.
//! This crate contains ONLY data types - no storage or policy logic.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod error;

pub use error::{ConfigError, StoreError, StoreResult};

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// Category of a cached upload payload.
///
/// Together with the record id this forms the unique key of a cached row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UploadType {
    /// A batch of serialized spans.
    Spans,
    /// A batch of serialized log records.
    Log,
    /// A binary attachment (e.g. a crash report blob).
    Attachment,
}

/// A single not-yet-delivered telemetry payload.
///
/// The payload bytes are opaque to the cache: producers serialize and
/// compress them before handing them over. At most one record exists per
/// `(id, upload_type)` pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadRecord {
    /// Caller-chosen identifier, unique together with `upload_type`.
    pub id: String,
    /// Payload category.
    pub upload_type: UploadType,
    /// Opaque payload bytes, already serialized by the producer.
    pub payload: Vec<u8>,
    /// Number of failed delivery attempts so far.
    pub attempt_count: u32,
    /// When the record was first inserted. Never mutated afterwards.
    pub created_at: Timestamp,
}

impl UploadRecord {
    /// Create a fresh record with zero delivery attempts, stamped now.
    pub fn new(id: impl Into<String>, upload_type: UploadType, payload: Vec<u8>) -> Self {
        Self {
            id: id.into(),
            upload_type,
            payload,
            attempt_count: 0,
            created_at: Utc::now(),
        }
    }
}
