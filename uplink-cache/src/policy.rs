//! Retention policy: count-limit admission and age-based eviction.
//!
//! Pure decision logic over the current row set plus configuration. The
//! policy owns no I/O of its own; deletions go through the [`RecordStore`].
//! The facade worker calls these while holding exclusive access to the
//! store, so a check can never act on a stale row count.

use chrono::Duration;
use uplink_core::{StoreResult, Timestamp};

use crate::store::{RecordKey, RecordStore};

/// How far below the count limit a trim goes.
///
/// When the limit is hit the trim removes this many extra rows beyond
/// what the limit requires, so the next several inserts do not each
/// trigger another trim.
pub const OVERFLOW_MARGIN: usize = 10;

/// Admission check before inserting a new key.
///
/// If a count limit is configured and the store is at or over it, deletes
/// the oldest rows by `created_at` ascending until the count is at
/// `count_limit - OVERFLOW_MARGIN`. Ties on `created_at` break by encoded
/// key, so a single trim pass is deterministic.
///
/// Returns the number of rows removed. Never called for payload updates
/// of an existing key, which add no row.
pub async fn enforce_count_limit(
    store: &dyn RecordStore,
    count_limit: usize,
) -> StoreResult<u64> {
    if count_limit == 0 {
        return Ok(0);
    }

    let count = store.count().await?;
    if count < count_limit {
        return Ok(0);
    }

    let to_remove = (count + OVERFLOW_MARGIN)
        .saturating_sub(count_limit)
        .min(count);

    let mut records = store.get_all().await?;
    records.sort_by_cached_key(|record| {
        (
            record.created_at,
            RecordKey::new(&record.id, record.upload_type).encode(),
        )
    });

    for record in records.iter().take(to_remove) {
        store.delete(&record.id, record.upload_type).await?;
    }

    tracing::debug!(removed = to_remove, count_limit, "trimmed upload cache");
    Ok(to_remove as u64)
}

/// Age-based eviction, run only on an explicit vacuum call.
///
/// With a zero `age_limit_days` this is a no-op. Otherwise every record
/// with `created_at` before `now - age_limit_days` is removed and the
/// count of removed rows returned.
pub async fn evict_stale(
    store: &dyn RecordStore,
    age_limit_days: u32,
    now: Timestamp,
) -> StoreResult<u64> {
    if age_limit_days == 0 {
        return Ok(0);
    }

    let cutoff = now - Duration::days(i64::from(age_limit_days));
    store.delete_older_than(cutoff).await
}
