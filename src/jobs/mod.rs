use std::sync::Arc;

use serde_json::json;
use sqlx::SqlitePool;
use thiserror::Error;
use tokio::sync::{Mutex, mpsc};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::events::EventBus;
use crate::imports::csv_import;
use crate::products::store as products;
use crate::tasks::{self, TrackerError};
use crate::types::{ProductUpdateEntry, TaskState, WebhookEvent};
use crate::webhooks::dispatch;

/// One unit of queued background work, always bound to a task record
/// created at submission time.
#[derive(Debug)]
pub enum Job {
    WebhookDispatch {
        task_id: Uuid,
        event: WebhookEvent,
    },
    CsvImport {
        task_id: Uuid,
        data: Vec<u8>,
    },
    BulkDelete {
        task_id: Uuid,
        ids: Vec<Uuid>,
    },
    BulkUpdate {
        task_id: Uuid,
        updates: Vec<ProductUpdateEntry>,
    },
}

impl Job {
    fn task_id(&self) -> Uuid {
        match self {
            Job::WebhookDispatch { task_id, .. }
            | Job::CsvImport { task_id, .. }
            | Job::BulkDelete { task_id, .. }
            | Job::BulkUpdate { task_id, .. } => *task_id,
        }
    }

    fn kind_name(&self) -> &'static str {
        match self {
            Job::WebhookDispatch { .. } => "webhook_dispatch",
            Job::CsvImport { .. } => "csv_import",
            Job::BulkDelete { .. } => "bulk_delete",
            Job::BulkUpdate { .. } => "bulk_update",
        }
    }
}

#[derive(Debug, Error)]
#[error("job queue is closed")]
pub struct QueueClosed;

/// Sender half of the bounded job channel. Handlers enqueue and return;
/// the worker pool drains.
#[derive(Clone)]
pub struct JobQueue {
    tx: mpsc::Sender<Job>,
}

impl JobQueue {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<Job>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    pub async fn enqueue(&self, job: Job) -> Result<(), QueueClosed> {
        self.tx.send(job).await.map_err(|_| QueueClosed)
    }
}

/// Everything a worker needs to run any job kind.
#[derive(Clone)]
pub struct WorkerContext {
    pub pool: SqlitePool,
    pub config: AppConfig,
    pub client: reqwest::Client,
    pub bus: EventBus,
}

/// Spawn the worker pool. Workers share the single receiver and pull
/// whenever idle; the pool outlives the function and stops when the
/// queue's last sender is dropped.
pub fn spawn_workers(ctx: WorkerContext, rx: mpsc::Receiver<Job>) {
    let rx = Arc::new(Mutex::new(rx));
    for worker_id in 0..ctx.config.worker_count {
        let ctx = ctx.clone();
        let rx = Arc::clone(&rx);
        tokio::spawn(worker_loop(worker_id, ctx, rx));
    }
}

async fn worker_loop(worker_id: usize, ctx: WorkerContext, rx: Arc<Mutex<mpsc::Receiver<Job>>>) {
    tracing::debug!(worker_id, "job worker started");
    loop {
        let job = {
            let mut rx = rx.lock().await;
            rx.recv().await
        };
        let Some(job) = job else {
            tracing::debug!(worker_id, "job channel closed, worker stopping");
            break;
        };
        run_job(&ctx, job).await;
    }
}

/// Drive one job through its task lifecycle. The worker is the only
/// writer for the task, so a transition failure is an implementation
/// bug: it is logged as a defect and the job abandoned rather than
/// bubbled anywhere a client would see.
async fn run_job(ctx: &WorkerContext, job: Job) {
    let task_id = job.task_id();
    let kind = job.kind_name();

    if let Err(err) = tasks::transition(&ctx.pool, task_id, TaskState::Started, None).await {
        log_transition_defect(task_id, kind, &err);
        return;
    }

    let outcome = match job {
        Job::WebhookDispatch { event, .. } => run_webhook_dispatch(ctx, &event).await,
        Job::CsvImport { data, .. } => run_csv_import(ctx, &data).await,
        Job::BulkDelete { ids, .. } => run_bulk_delete(ctx, &ids).await,
        Job::BulkUpdate { updates, .. } => run_bulk_update(ctx, &updates).await,
    };

    let (state, result) = match outcome {
        Ok(summary) => (TaskState::Success, summary),
        Err(message) => {
            tracing::warn!(%task_id, kind, error = %message, "background job failed");
            (TaskState::Failure, json!({ "error": message }))
        }
    };

    if let Err(err) = tasks::transition(&ctx.pool, task_id, state, Some(&result)).await {
        log_transition_defect(task_id, kind, &err);
    }
}

fn log_transition_defect(task_id: Uuid, kind: &str, err: &TrackerError) {
    match err {
        TrackerError::InvalidTransition { .. } => {
            tracing::error!(
                %task_id,
                kind,
                error = %err,
                "task state machine violated, abandoning job"
            );
        }
        _ => {
            tracing::error!(%task_id, kind, error = %err, "failed to update task state");
        }
    }
}

async fn run_webhook_dispatch(
    ctx: &WorkerContext,
    event: &WebhookEvent,
) -> Result<serde_json::Value, String> {
    let summary = dispatch::dispatch_event(&ctx.pool, &ctx.client, &ctx.config, event)
        .await
        .map_err(|err| err.to_string())?;

    tracing::info!(
        event = event.event_type.as_str(),
        total = summary.total,
        delivered = summary.delivered,
        failed = summary.failed,
        "webhook dispatch complete"
    );

    serde_json::to_value(&summary).map_err(|err| err.to_string())
}

async fn run_csv_import(ctx: &WorkerContext, data: &[u8]) -> Result<serde_json::Value, String> {
    let outcome = csv_import::run(&ctx.pool, data)
        .await
        .map_err(|err| err.to_string())?;

    tracing::info!(
        success_count = outcome.success_count,
        total_processed = outcome.total_processed,
        row_errors = outcome.errors.len(),
        "csv import complete"
    );

    ctx.bus
        .products_uploaded(outcome.success_count, outcome.total_processed)
        .await;

    serde_json::to_value(&outcome).map_err(|err| err.to_string())
}

async fn run_bulk_delete(ctx: &WorkerContext, ids: &[Uuid]) -> Result<serde_json::Value, String> {
    let total = ids.len() as i64;
    let deleted = products::delete_by_ids(&ctx.pool, ids)
        .await
        .map_err(|err| err.to_string())?;

    ctx.bus.products_bulk_deleted(deleted, total, ids).await;

    Ok(json!({ "deleted": deleted, "total": total }))
}

async fn run_bulk_update(
    ctx: &WorkerContext,
    updates: &[ProductUpdateEntry],
) -> Result<serde_json::Value, String> {
    let total = updates.len() as i64;
    let updated = products::apply_update_entries(&ctx.pool, updates)
        .await
        .map_err(|err| err.to_string())?;

    ctx.bus.products_bulk_updated(updated, updates).await;

    Ok(json!({ "updated": updated, "total": total }))
}
