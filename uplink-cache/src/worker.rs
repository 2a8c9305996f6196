//! The serialized cache worker.
//!
//! One spawned task owns the record store and processes commands one at a
//! time, so the admission check that precedes an insert can never observe
//! a row count made stale by a concurrent mutation. Store errors are
//! logged here and degraded to benign replies; they never cross the
//! facade as faults.

use chrono::Utc;
use tokio::sync::{mpsc, oneshot};
use uplink_core::{UploadRecord, UploadType};

use crate::options::CacheOptions;
use crate::policy;
use crate::store::RecordStore;

/// A request from an [`UploadCache`](crate::UploadCache) handle.
pub(crate) enum CacheCommand {
    Save {
        id: String,
        upload_type: UploadType,
        payload: Vec<u8>,
        reply: oneshot::Sender<bool>,
    },
    Fetch {
        id: String,
        upload_type: UploadType,
        reply: oneshot::Sender<Option<UploadRecord>>,
    },
    FetchAll {
        reply: oneshot::Sender<Vec<UploadRecord>>,
    },
    Delete {
        id: String,
        upload_type: UploadType,
        reply: oneshot::Sender<()>,
    },
    UpdateAttemptCount {
        id: String,
        upload_type: UploadType,
        count: u32,
        reply: oneshot::Sender<()>,
    },
    VacuumStale {
        reply: oneshot::Sender<u64>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// Worker loop. Exits when every cache handle is dropped or a shutdown
/// command arrives; queued commands are drained either way before the
/// store is dropped.
pub(crate) async fn run(
    store: Box<dyn RecordStore>,
    options: CacheOptions,
    mut rx: mpsc::Receiver<CacheCommand>,
) {
    let mut shutdown_reply = None;

    while let Some(command) = rx.recv().await {
        match command {
            CacheCommand::Save {
                id,
                upload_type,
                payload,
                reply,
            } => {
                let saved = handle_save(store.as_ref(), &options, id, upload_type, payload).await;
                let _ = reply.send(saved);
            }
            CacheCommand::Fetch {
                id,
                upload_type,
                reply,
            } => {
                let record = match store.get(&id, upload_type).await {
                    Ok(record) => record,
                    Err(e) => {
                        tracing::warn!(error = %e, %id, "failed to fetch cached record");
                        None
                    }
                };
                let _ = reply.send(record);
            }
            CacheCommand::FetchAll { reply } => {
                let records = match store.get_all().await {
                    Ok(records) => records,
                    Err(e) => {
                        tracing::warn!(error = %e, "failed to fetch cached records");
                        Vec::new()
                    }
                };
                let _ = reply.send(records);
            }
            CacheCommand::Delete {
                id,
                upload_type,
                reply,
            } => {
                if let Err(e) = store.delete(&id, upload_type).await {
                    tracing::warn!(error = %e, %id, "failed to delete cached record");
                }
                let _ = reply.send(());
            }
            CacheCommand::UpdateAttemptCount {
                id,
                upload_type,
                count,
                reply,
            } => {
                if let Err(e) = store.set_attempt_count(&id, upload_type, count).await {
                    tracing::warn!(error = %e, %id, "failed to update attempt count");
                }
                let _ = reply.send(());
            }
            CacheCommand::VacuumStale { reply } => {
                let _ = reply.send(handle_vacuum(store.as_ref(), &options).await);
            }
            CacheCommand::Shutdown { reply } => {
                // Stop accepting new commands; recv keeps yielding the
                // already-queued ones until the channel is empty.
                rx.close();
                shutdown_reply = Some(reply);
            }
        }
    }

    store.close();
    if let Some(reply) = shutdown_reply {
        let _ = reply.send(());
    }
}

/// Insert or update a payload, running the admission check for new keys.
async fn handle_save(
    store: &dyn RecordStore,
    options: &CacheOptions,
    id: String,
    upload_type: UploadType,
    payload: Vec<u8>,
) -> bool {
    let exists = match store.get(&id, upload_type).await {
        Ok(existing) => existing.is_some(),
        Err(e) => {
            tracing::warn!(error = %e, %id, "failed to look up cached record");
            false
        }
    };

    // Payload updates add no row, so the admission check is skipped.
    if !exists {
        if let Err(e) = policy::enforce_count_limit(store, options.count_limit()).await {
            // The insert still proceeds: a failed trim must not drop
            // fresh telemetry.
            tracing::error!(error = %e, "failed to enforce cache count limit");
        }
    }

    match store.upsert(UploadRecord::new(id, upload_type, payload)).await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(error = %e, "failed to cache upload payload");
            false
        }
    }
}

/// Age-based eviction, reported as an observability signal.
async fn handle_vacuum(store: &dyn RecordStore, options: &CacheOptions) -> u64 {
    if options.age_limit_days() == 0 {
        return 0;
    }

    match policy::evict_stale(store, options.age_limit_days(), Utc::now()).await {
        Ok(removed) => {
            if removed > 0 {
                tracing::info!(removed, "removed stale upload records");
            }
            removed
        }
        Err(e) => {
            tracing::warn!(error = %e, "failed to vacuum stale upload records");
            0
        }
    }
}
