use sqlx::SqlitePool;
use thiserror::Error;
use uuid::Uuid;

use crate::events::EventBus;
use crate::jobs::{Job, JobQueue, QueueClosed};
use crate::products::store::{self, ProductStoreError};
use crate::tasks::{self, TrackerError};
use crate::types::{
    BulkAccepted, BulkDeleteRequest, BulkDeleteResponse, BulkDeleteSummary, BulkUpdateRequest,
    BulkUpdateResponse, BulkUpdateSummary, TaskKind,
};

/// Bulk operations touching fewer items than this run inline and
/// answer with their summary; anything at or above is queued behind a
/// task id. Fixed policy, not tuning.
pub const SYNC_LIMIT: usize = 100;

#[derive(Debug, Error)]
pub enum BulkError {
    #[error(transparent)]
    Store(#[from] ProductStoreError),
    #[error(transparent)]
    Tracker(#[from] TrackerError),
    #[error(transparent)]
    Queue(#[from] QueueClosed),
}

/// Delete by explicit ids or everything. Small batches complete before
/// the response; large ones are acknowledged with a task id and exactly
/// the same work happens on a worker. Either path emits one
/// `product.bulk_deleted` event for the whole operation.
pub async fn bulk_delete(
    pool: &SqlitePool,
    bus: &EventBus,
    queue: &JobQueue,
    req: &BulkDeleteRequest,
) -> Result<BulkDeleteResponse, BulkError> {
    let ids = if req.delete_all {
        store::all_product_ids(pool).await?
    } else {
        dedup_ids(&req.ids)
    };
    let total = ids.len() as i64;

    if ids.len() < SYNC_LIMIT {
        let deleted = store::delete_by_ids(pool, &ids).await?;
        if total > 0 {
            bus.products_bulk_deleted(deleted, total, &ids).await;
        }
        return Ok(BulkDeleteResponse::Completed(BulkDeleteSummary {
            deleted,
            total,
        }));
    }

    let task_id = tasks::submit(pool, TaskKind::BulkDelete).await?;
    queue.enqueue(Job::BulkDelete { task_id, ids }).await?;

    Ok(BulkDeleteResponse::Accepted(BulkAccepted { task_id, total }))
}

/// Partial updates in bulk, same sync/async split as deletion, with one
/// `product.bulk_updated` event per operation.
pub async fn bulk_update(
    pool: &SqlitePool,
    bus: &EventBus,
    queue: &JobQueue,
    req: &BulkUpdateRequest,
) -> Result<BulkUpdateResponse, BulkError> {
    let total = req.updates.len() as i64;

    if req.updates.len() < SYNC_LIMIT {
        let updated = store::apply_update_entries(pool, &req.updates).await?;
        if total > 0 {
            bus.products_bulk_updated(updated, &req.updates).await;
        }
        return Ok(BulkUpdateResponse::Completed(BulkUpdateSummary {
            updated,
            total,
        }));
    }

    let task_id = tasks::submit(pool, TaskKind::BulkUpdate).await?;
    queue
        .enqueue(Job::BulkUpdate {
            task_id,
            updates: req.updates.clone(),
        })
        .await?;

    Ok(BulkUpdateResponse::Accepted(BulkAccepted { task_id, total }))
}

fn dedup_ids(ids: &[Uuid]) -> Vec<Uuid> {
    let mut seen = std::collections::HashSet::with_capacity(ids.len());
    ids.iter()
        .copied()
        .filter(|id| seen.insert(*id))
        .collect()
}
