use chrono::{SecondsFormat, Utc};
use serde_json::json;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::jobs::{Job, JobQueue};
use crate::tasks;
use crate::types::{EventType, Product, ProductUpdateEntry, TaskKind, WebhookEvent};

/// In-process emitter that turns a domain mutation into a typed event
/// and hands it to the dispatch pipeline. Built once at startup and
/// passed to whoever mutates products — there is no ambient signal
/// machinery to hook into.
///
/// Emission never fails the mutation that triggered it: queue or
/// database trouble here is logged and the request proceeds.
#[derive(Clone)]
pub struct EventBus {
    pool: SqlitePool,
    queue: JobQueue,
}

impl EventBus {
    pub fn new(pool: SqlitePool, queue: JobQueue) -> Self {
        Self { pool, queue }
    }

    pub async fn product_created(&self, product: &Product) {
        self.emit_record(EventType::ProductCreated, product).await;
    }

    pub async fn product_updated(&self, product: &Product) {
        self.emit_record(EventType::ProductUpdated, product).await;
    }

    pub async fn product_deleted(&self, product: &Product) {
        self.emit_record(EventType::ProductDeleted, product).await;
    }

    pub async fn products_bulk_updated(&self, count: i64, products: &[ProductUpdateEntry]) {
        self.emit(
            EventType::ProductBulkUpdated,
            json!({ "count": count, "products": products }),
        )
        .await;
    }

    pub async fn products_bulk_deleted(&self, deleted: i64, total: i64, ids: &[Uuid]) {
        self.emit(
            EventType::ProductBulkDeleted,
            json!({ "deleted": deleted, "total": total, "ids": ids }),
        )
        .await;
    }

    pub async fn products_uploaded(&self, success_count: i64, total_processed: i64) {
        self.emit(
            EventType::ProductUploaded,
            json!({
                "success_count": success_count,
                "total_processed": total_processed,
                "upload_type": "csv",
            }),
        )
        .await;
    }

    async fn emit_record(&self, event_type: EventType, product: &Product) {
        match serde_json::to_value(product) {
            Ok(data) => self.emit(event_type, data).await,
            Err(err) => {
                tracing::error!(
                    event = event_type.as_str(),
                    error = %err,
                    "failed to serialize event payload"
                );
            }
        }
    }

    /// Build the event, open a dispatch task for it, and enqueue the
    /// fan-out job. One event instance per logical mutation.
    async fn emit(&self, event_type: EventType, data: serde_json::Value) {
        let event = WebhookEvent {
            event_type,
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            data,
        };

        let task_id = match tasks::submit(&self.pool, TaskKind::WebhookDispatch).await {
            Ok(task_id) => task_id,
            Err(err) => {
                tracing::error!(
                    event = event_type.as_str(),
                    error = %err,
                    "failed to create dispatch task, dropping event"
                );
                return;
            }
        };

        if let Err(err) = self
            .queue
            .enqueue(Job::WebhookDispatch { task_id, event })
            .await
        {
            tracing::error!(
                event = event_type.as_str(),
                %task_id,
                error = %err,
                "failed to enqueue dispatch job"
            );
        }
    }
}
