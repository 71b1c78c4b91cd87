use std::sync::Arc;

use serde::Serialize;
use sqlx::SqlitePool;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::config::AppConfig;
use crate::types::WebhookEvent;
use crate::webhooks::registry::{self, RegistryError};
use crate::webhooks::retry::{self, RetryPolicy};

/// Per-event dispatch result, recorded as the task summary. Individual
/// endpoint failures land in `failed`; they never fail the dispatch
/// job itself.
#[derive(Debug, Clone, Serialize)]
pub struct DispatchSummary {
    pub total: i64,
    pub delivered: i64,
    pub failed: i64,
}

/// Fan one event out to every subscribed endpoint. Deliveries run
/// concurrently under a semaphore so one slow endpoint (or its backoff
/// sleeps) cannot stall the others, and each endpoint's final attempt
/// is folded into its telemetry as it completes.
pub async fn dispatch_event(
    pool: &SqlitePool,
    client: &reqwest::Client,
    config: &AppConfig,
    event: &WebhookEvent,
) -> Result<DispatchSummary, RegistryError> {
    let subscribers = registry::find_subscribers(pool, event.event_type).await?;
    let total = subscribers.len() as i64;

    if subscribers.is_empty() {
        tracing::debug!(
            event = event.event_type.as_str(),
            "no enabled endpoints subscribe to event"
        );
        return Ok(DispatchSummary {
            total: 0,
            delivered: 0,
            failed: 0,
        });
    }

    let semaphore = Arc::new(Semaphore::new(config.delivery_concurrency));
    let policy = RetryPolicy::from_config(config);
    let mut deliveries: JoinSet<bool> = JoinSet::new();

    for endpoint in subscribers {
        let semaphore = Arc::clone(&semaphore);
        let client = client.clone();
        let pool = pool.clone();
        let event = event.clone();

        deliveries.spawn(async move {
            let Ok(_permit) = semaphore.acquire_owned().await else {
                return false;
            };

            let attempt = retry::deliver_with_retry(&client, &endpoint, &event, policy).await;
            let delivered = attempt.outcome.is_success();

            if !delivered {
                tracing::warn!(
                    endpoint_id = %endpoint.id,
                    event = %attempt.event,
                    outcome = ?attempt.outcome,
                    attempts = attempt.attempt_number,
                    status_code = attempt.status_code,
                    "webhook delivery exhausted retries"
                );
            }

            if let Err(err) = registry::record_outcome(&pool, endpoint.id, &attempt).await {
                tracing::error!(
                    endpoint_id = %endpoint.id,
                    error = %err,
                    "failed to record delivery outcome"
                );
            }

            delivered
        });
    }

    let mut delivered = 0;
    while let Some(joined) = deliveries.join_next().await {
        match joined {
            Ok(true) => delivered += 1,
            Ok(false) => {}
            Err(err) => {
                tracing::error!(error = %err, "delivery task failed to complete");
            }
        }
    }

    Ok(DispatchSummary {
        total,
        delivered,
        failed: total - delivered,
    })
}
