use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::{SecondsFormat, Utc};
use serde_json::json;
use uuid::Uuid;

use crate::{
    error::ApiError,
    state::AppState,
    types::{
        CreateWebhookRequest, DeleteWebhookResponse, DeliveryOutcome, ListWebhooksResponse,
        UpdateWebhookRequest, WebhookEndpoint, WebhookTestRequest, WebhookTestResponse,
    },
    webhooks::{delivery, registry, registry::RegistryError},
};

pub async fn list_webhooks_handler(
    State(state): State<AppState>,
) -> Result<Json<ListWebhooksResponse>, ApiError> {
    let webhooks = registry::list_endpoints(&state.pool)
        .await
        .map_err(map_registry_error)?
        .into_iter()
        .map(registry::Endpoint::into_public)
        .collect();

    Ok(Json(ListWebhooksResponse { webhooks }))
}

pub async fn create_webhook_handler(
    State(state): State<AppState>,
    Json(req): Json<CreateWebhookRequest>,
) -> Result<(StatusCode, Json<WebhookEndpoint>), ApiError> {
    let endpoint = registry::create_endpoint(&state.pool, &req)
        .await
        .map_err(map_registry_error)?;

    Ok((StatusCode::CREATED, Json(endpoint.into_public())))
}

pub async fn get_webhook_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<WebhookEndpoint>, ApiError> {
    let endpoint = registry::get_endpoint(&state.pool, id)
        .await
        .map_err(map_registry_error)?;
    Ok(Json(endpoint.into_public()))
}

pub async fn update_webhook_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateWebhookRequest>,
) -> Result<Json<WebhookEndpoint>, ApiError> {
    let endpoint = registry::update_endpoint(&state.pool, id, &req)
        .await
        .map_err(map_registry_error)?;
    Ok(Json(endpoint.into_public()))
}

pub async fn delete_webhook_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<DeleteWebhookResponse>, ApiError> {
    registry::delete_endpoint(&state.pool, id)
        .await
        .map_err(map_registry_error)?;

    Ok(Json(DeleteWebhookResponse { id, deleted: true }))
}

/// One synchronous delivery attempt, no retry. The result — including
/// a remote-side failure — is the response body, not an API error, and
/// the endpoint's telemetry is updated either way.
pub async fn test_webhook_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<WebhookTestRequest>,
) -> Result<Json<WebhookTestResponse>, ApiError> {
    let endpoint = registry::get_endpoint(&state.pool, id)
        .await
        .map_err(map_registry_error)?;

    let payload = req.payload.unwrap_or_else(|| {
        json!({
            "test": true,
            "message": "This is a test webhook trigger",
            "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        })
    });

    let attempt = delivery::deliver_test(&state.http, &endpoint, &payload).await;

    if let Err(err) = registry::record_outcome(&state.pool, endpoint.id, &attempt).await {
        tracing::error!(endpoint_id = %endpoint.id, error = %err, "failed to record test outcome");
    }

    let response = match attempt.outcome {
        DeliveryOutcome::Success => WebhookTestResponse {
            success: true,
            status_code: attempt.status_code,
            response_time_ms: Some(attempt.duration_ms),
            error: None,
        },
        DeliveryOutcome::HttpError => WebhookTestResponse {
            success: false,
            status_code: attempt.status_code,
            response_time_ms: Some(attempt.duration_ms),
            error: Some(format!(
                "HTTP {}",
                attempt.status_code.unwrap_or_default()
            )),
        },
        DeliveryOutcome::Timeout => WebhookTestResponse {
            success: false,
            status_code: None,
            response_time_ms: Some(attempt.duration_ms),
            error: Some(format!(
                "request timed out after {}s",
                endpoint.timeout_seconds
            )),
        },
        DeliveryOutcome::NetworkError => WebhookTestResponse {
            success: false,
            status_code: None,
            response_time_ms: Some(attempt.duration_ms),
            error: Some("connection error - unable to reach webhook URL".to_string()),
        },
    };

    Ok(Json(response))
}

fn map_registry_error(err: RegistryError) -> ApiError {
    match err {
        RegistryError::Validation(message) => ApiError::Validation(message),
        RegistryError::NotFound => ApiError::not_found("webhook endpoint not found"),
        RegistryError::Db(db) => ApiError::Db(db),
        RegistryError::Parse(message) => ApiError::Internal(message),
    }
}
