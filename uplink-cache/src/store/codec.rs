//! Binary layout of record keys and values.
//!
//! # Key Format
//!
//! Keys encode to `[upload_type: 1 byte][separator: 1 byte][id: utf-8 bytes]`.
//! Type-first ordering keeps rows of the same payload category adjacent in
//! the store. The separator (0xFF) can never appear in valid UTF-8, so the
//! encoding is unambiguous.
//!
//! # Value Format
//!
//! Values encode to
//! `[created_at millis: 8 LE bytes][attempt_count: 4 LE bytes][payload bytes]`.
//! The payload is opaque and stored verbatim.

use chrono::DateTime;
use uplink_core::{StoreError, StoreResult, UploadRecord, UploadType};

/// Separator byte between the upload type and the record id.
const SEPARATOR: u8 = 0xFF;

/// Bytes of value header ahead of the payload: 8 timestamp + 4 attempt count.
const VALUE_HEADER_LEN: usize = 12;

/// The unique key of a cached record: `(upload_type, id)`.
///
/// Ordering of keys is defined by their encoded bytes, not by this type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordKey {
    pub upload_type: UploadType,
    pub id: String,
}

impl RecordKey {
    pub fn new(id: impl Into<String>, upload_type: UploadType) -> Self {
        Self {
            upload_type,
            id: id.into(),
        }
    }

    /// Encode this key for storage.
    pub fn encode(&self) -> Vec<u8> {
        let id_bytes = self.id.as_bytes();
        let mut bytes = Vec::with_capacity(2 + id_bytes.len());
        bytes.push(upload_type_to_byte(self.upload_type));
        bytes.push(SEPARATOR);
        bytes.extend_from_slice(id_bytes);
        bytes
    }

    /// Decode a key from stored bytes.
    ///
    /// Returns `None` if the buffer is too short, the separator is missing,
    /// the type byte is unknown, or the id is not valid UTF-8.
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < 2 {
            return None;
        }
        if bytes[1] != SEPARATOR {
            return None;
        }
        let upload_type = byte_to_upload_type(bytes[0])?;
        let id = std::str::from_utf8(&bytes[2..]).ok()?.to_string();

        Some(Self { upload_type, id })
    }
}

/// Map an upload type to its stable single-byte discriminant.
fn upload_type_to_byte(upload_type: UploadType) -> u8 {
    match upload_type {
        UploadType::Spans => 0,
        UploadType::Log => 1,
        UploadType::Attachment => 2,
    }
}

/// Map a stored discriminant back to an upload type.
fn byte_to_upload_type(byte: u8) -> Option<UploadType> {
    match byte {
        0 => Some(UploadType::Spans),
        1 => Some(UploadType::Log),
        2 => Some(UploadType::Attachment),
        _ => None,
    }
}

/// Encode the value portion of a record.
pub fn encode_value(record: &UploadRecord) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(VALUE_HEADER_LEN + record.payload.len());
    bytes.extend_from_slice(&record.created_at.timestamp_millis().to_le_bytes());
    bytes.extend_from_slice(&record.attempt_count.to_le_bytes());
    bytes.extend_from_slice(&record.payload);
    bytes
}

/// Decode a full record from its key and value bytes.
pub fn decode_record(key: &RecordKey, value: &[u8]) -> StoreResult<UploadRecord> {
    if value.len() < VALUE_HEADER_LEN {
        return Err(StoreError::Codec(format!(
            "value too short: {} bytes",
            value.len()
        )));
    }

    let millis_bytes: [u8; 8] = value[0..8]
        .try_into()
        .map_err(|_| StoreError::Codec("invalid timestamp".to_string()))?;
    let created_at = DateTime::from_timestamp_millis(i64::from_le_bytes(millis_bytes))
        .ok_or_else(|| StoreError::Codec("timestamp out of range".to_string()))?;

    let attempt_bytes: [u8; 4] = value[8..12]
        .try_into()
        .map_err(|_| StoreError::Codec("invalid attempt count".to_string()))?;

    Ok(UploadRecord {
        id: key.id.clone(),
        upload_type: key.upload_type,
        payload: value[VALUE_HEADER_LEN..].to_vec(),
        attempt_count: u32::from_le_bytes(attempt_bytes),
        created_at,
    })
}

/// Rewrite only the attempt count within an encoded value, leaving the
/// timestamp and payload bytes untouched.
pub fn patch_attempt_count(value: &[u8], count: u32) -> StoreResult<Vec<u8>> {
    if value.len() < VALUE_HEADER_LEN {
        return Err(StoreError::Codec(format!(
            "value too short: {} bytes",
            value.len()
        )));
    }
    let mut patched = value.to_vec();
    patched[8..12].copy_from_slice(&count.to_le_bytes());
    Ok(patched)
}

/// Rewrite only the payload within an encoded value, preserving the
/// timestamp and attempt count of the existing row.
pub fn patch_payload(value: &[u8], payload: &[u8]) -> StoreResult<Vec<u8>> {
    if value.len() < VALUE_HEADER_LEN {
        return Err(StoreError::Codec(format!(
            "value too short: {} bytes",
            value.len()
        )));
    }
    let mut patched = Vec::with_capacity(VALUE_HEADER_LEN + payload.len());
    patched.extend_from_slice(&value[0..VALUE_HEADER_LEN]);
    patched.extend_from_slice(payload);
    Ok(patched)
}
