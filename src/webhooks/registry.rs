use std::collections::BTreeMap;

use chrono::{SecondsFormat, Utc};
use sqlx::SqlitePool;
use thiserror::Error;
use uuid::Uuid;

use crate::types::{
    CreateWebhookRequest, DeliveryAttempt, EventType, UpdateWebhookRequest, WebhookEndpoint,
};

pub const MIN_TIMEOUT_SECONDS: i64 = 1;
pub const MAX_TIMEOUT_SECONDS: i64 = 300;
pub const DEFAULT_TIMEOUT_SECONDS: i64 = 30;

pub const MAX_RETRY_COUNT: i64 = 10;
pub const DEFAULT_RETRY_COUNT: i64 = 3;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
    #[error("{0}")]
    Validation(String),
    #[error("webhook endpoint not found")]
    NotFound,
    #[error("invalid stored endpoint: {0}")]
    Parse(String),
}

/// Full endpoint record, secret included. Only the delivery path and
/// the management store see this; API responses go through
/// [`Endpoint::into_public`], which drops the secret.
#[derive(Debug, Clone)]
pub struct Endpoint {
    pub id: Uuid,
    pub name: String,
    pub url: String,
    pub event_types: Vec<EventType>,
    pub enabled: bool,
    pub secret: Option<String>,
    pub headers: BTreeMap<String, String>,
    pub timeout_seconds: i64,
    pub retry_count: i64,
    pub created_at: String,
    pub updated_at: String,
    pub last_triggered_at: Option<String>,
    pub last_response_code: Option<i64>,
    pub last_response_time_ms: Option<f64>,
}

impl Endpoint {
    pub fn into_public(self) -> WebhookEndpoint {
        WebhookEndpoint {
            id: self.id,
            name: self.name,
            url: self.url,
            event_types: self.event_types,
            enabled: self.enabled,
            has_secret: self.secret.as_deref().is_some_and(|s| !s.is_empty()),
            headers: self.headers,
            timeout_seconds: self.timeout_seconds,
            retry_count: self.retry_count,
            created_at: self.created_at,
            updated_at: self.updated_at,
            last_triggered_at: self.last_triggered_at,
            last_response_code: self.last_response_code,
            last_response_time_ms: self.last_response_time_ms,
        }
    }
}

pub async fn create_endpoint(
    pool: &SqlitePool,
    req: &CreateWebhookRequest,
) -> Result<Endpoint, RegistryError> {
    let name = req.name.trim();
    if name.is_empty() {
        return Err(RegistryError::Validation("name is required".to_string()));
    }
    validate_url(&req.url)?;
    let event_types = validate_event_types(&req.event_types)?;
    let timeout_seconds = validate_timeout(req.timeout_seconds.unwrap_or(DEFAULT_TIMEOUT_SECONDS))?;
    let retry_count = validate_retry_count(req.retry_count.unwrap_or(DEFAULT_RETRY_COUNT))?;

    let now = format_utc(Utc::now());
    let endpoint = Endpoint {
        id: Uuid::new_v4(),
        name: name.to_string(),
        url: req.url.trim().to_string(),
        event_types,
        enabled: req.enabled,
        secret: req.secret.clone().filter(|s| !s.is_empty()),
        headers: req.headers.clone(),
        timeout_seconds,
        retry_count,
        created_at: now.clone(),
        updated_at: now,
        last_triggered_at: None,
        last_response_code: None,
        last_response_time_ms: None,
    };

    sqlx::query(
        r#"
        INSERT INTO webhook_endpoints (
            id, name, url, event_types, enabled, secret, headers,
            timeout_seconds, retry_count, created_at, updated_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(endpoint.id.to_string())
    .bind(&endpoint.name)
    .bind(&endpoint.url)
    .bind(encode_event_types(&endpoint.event_types))
    .bind(i64::from(endpoint.enabled))
    .bind(endpoint.secret.as_deref())
    .bind(encode_headers(&endpoint.headers)?)
    .bind(endpoint.timeout_seconds)
    .bind(endpoint.retry_count)
    .bind(&endpoint.created_at)
    .bind(&endpoint.updated_at)
    .execute(pool)
    .await?;

    Ok(endpoint)
}

pub async fn update_endpoint(
    pool: &SqlitePool,
    id: Uuid,
    req: &UpdateWebhookRequest,
) -> Result<Endpoint, RegistryError> {
    let mut endpoint = get_endpoint(pool, id).await?;

    if let Some(name) = &req.name {
        let name = name.trim();
        if name.is_empty() {
            return Err(RegistryError::Validation("name is required".to_string()));
        }
        endpoint.name = name.to_string();
    }
    if let Some(url) = &req.url {
        validate_url(url)?;
        endpoint.url = url.trim().to_string();
    }
    if let Some(event_types) = &req.event_types {
        endpoint.event_types = validate_event_types(event_types)?;
    }
    if let Some(enabled) = req.enabled {
        endpoint.enabled = enabled;
    }
    if let Some(secret) = &req.secret {
        // Empty string clears the secret; omitted leaves it untouched.
        endpoint.secret = if secret.is_empty() {
            None
        } else {
            Some(secret.clone())
        };
    }
    if let Some(headers) = &req.headers {
        endpoint.headers = headers.clone();
    }
    if let Some(timeout_seconds) = req.timeout_seconds {
        endpoint.timeout_seconds = validate_timeout(timeout_seconds)?;
    }
    if let Some(retry_count) = req.retry_count {
        endpoint.retry_count = validate_retry_count(retry_count)?;
    }

    endpoint.updated_at = format_utc(Utc::now());

    let result = sqlx::query(
        r#"
        UPDATE webhook_endpoints
        SET name = ?,
            url = ?,
            event_types = ?,
            enabled = ?,
            secret = ?,
            headers = ?,
            timeout_seconds = ?,
            retry_count = ?,
            updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&endpoint.name)
    .bind(&endpoint.url)
    .bind(encode_event_types(&endpoint.event_types))
    .bind(i64::from(endpoint.enabled))
    .bind(endpoint.secret.as_deref())
    .bind(encode_headers(&endpoint.headers)?)
    .bind(endpoint.timeout_seconds)
    .bind(endpoint.retry_count)
    .bind(&endpoint.updated_at)
    .bind(id.to_string())
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(RegistryError::NotFound);
    }

    Ok(endpoint)
}

pub async fn delete_endpoint(pool: &SqlitePool, id: Uuid) -> Result<(), RegistryError> {
    let result = sqlx::query("DELETE FROM webhook_endpoints WHERE id = ?")
        .bind(id.to_string())
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(RegistryError::NotFound);
    }

    Ok(())
}

pub async fn get_endpoint(pool: &SqlitePool, id: Uuid) -> Result<Endpoint, RegistryError> {
    let row = sqlx::query_as::<_, EndpointRow>(
        r#"
        SELECT id, name, url, event_types, enabled, secret, headers,
               timeout_seconds, retry_count, created_at, updated_at,
               last_triggered_at, last_response_code, last_response_time_ms
        FROM webhook_endpoints
        WHERE id = ?
        "#,
    )
    .bind(id.to_string())
    .fetch_optional(pool)
    .await?
    .ok_or(RegistryError::NotFound)?;

    row.try_into()
}

pub async fn list_endpoints(pool: &SqlitePool) -> Result<Vec<Endpoint>, RegistryError> {
    let rows = sqlx::query_as::<_, EndpointRow>(
        r#"
        SELECT id, name, url, event_types, enabled, secret, headers,
               timeout_seconds, retry_count, created_at, updated_at,
               last_triggered_at, last_response_code, last_response_time_ms
        FROM webhook_endpoints
        ORDER BY id ASC
        "#,
    )
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(EndpointRow::try_into).collect()
}

/// Enabled endpoints subscribed to the given event type, in ascending
/// id order so a dispatch fan-out is reproducible. Subscription
/// matching happens here rather than in SQL because `event_types` is a
/// JSON array column.
pub async fn find_subscribers(
    pool: &SqlitePool,
    event_type: EventType,
) -> Result<Vec<Endpoint>, RegistryError> {
    let rows = sqlx::query_as::<_, EndpointRow>(
        r#"
        SELECT id, name, url, event_types, enabled, secret, headers,
               timeout_seconds, retry_count, created_at, updated_at,
               last_triggered_at, last_response_code, last_response_time_ms
        FROM webhook_endpoints
        WHERE enabled = 1
        ORDER BY id ASC
        "#,
    )
    .fetch_all(pool)
    .await?;

    let mut subscribers = Vec::new();
    for row in rows {
        let endpoint: Endpoint = row.try_into()?;
        if endpoint.event_types.contains(&event_type) {
            subscribers.push(endpoint);
        }
    }

    Ok(subscribers)
}

/// Fold a finished delivery attempt into the endpoint's telemetry.
/// A single UPDATE keeps the three fields atomic per endpoint; an
/// unknown id means the endpoint was deleted while the delivery was in
/// flight, and the stale outcome is discarded without error.
pub async fn record_outcome(
    pool: &SqlitePool,
    id: Uuid,
    attempt: &DeliveryAttempt,
) -> Result<(), RegistryError> {
    sqlx::query(
        r#"
        UPDATE webhook_endpoints
        SET last_triggered_at = ?,
            last_response_code = ?,
            last_response_time_ms = ?
        WHERE id = ?
        "#,
    )
    .bind(format_utc(Utc::now()))
    .bind(attempt.status_code)
    .bind(attempt.duration_ms)
    .bind(id.to_string())
    .execute(pool)
    .await?;

    Ok(())
}

fn validate_url(url: &str) -> Result<(), RegistryError> {
    let parsed = reqwest::Url::parse(url.trim())
        .map_err(|_| RegistryError::Validation("url must be a valid absolute URL".to_string()))?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(RegistryError::Validation(
            "url scheme must be http or https".to_string(),
        ));
    }
    if parsed.host_str().is_none() {
        return Err(RegistryError::Validation(
            "url must include a host".to_string(),
        ));
    }
    Ok(())
}

fn validate_event_types(event_types: &[EventType]) -> Result<Vec<EventType>, RegistryError> {
    if event_types.is_empty() {
        return Err(RegistryError::Validation(
            "event_types must be non-empty".to_string(),
        ));
    }
    let mut deduped = Vec::with_capacity(event_types.len());
    for event_type in event_types {
        if !deduped.contains(event_type) {
            deduped.push(*event_type);
        }
    }
    Ok(deduped)
}

fn validate_timeout(timeout_seconds: i64) -> Result<i64, RegistryError> {
    if !(MIN_TIMEOUT_SECONDS..=MAX_TIMEOUT_SECONDS).contains(&timeout_seconds) {
        return Err(RegistryError::Validation(format!(
            "timeout_seconds must be between {MIN_TIMEOUT_SECONDS} and {MAX_TIMEOUT_SECONDS}"
        )));
    }
    Ok(timeout_seconds)
}

fn validate_retry_count(retry_count: i64) -> Result<i64, RegistryError> {
    if !(0..=MAX_RETRY_COUNT).contains(&retry_count) {
        return Err(RegistryError::Validation(format!(
            "retry_count must be between 0 and {MAX_RETRY_COUNT}"
        )));
    }
    Ok(retry_count)
}

fn encode_event_types(event_types: &[EventType]) -> String {
    let names: Vec<&str> = event_types.iter().map(|t| t.as_str()).collect();
    serde_json::to_string(&names).unwrap_or_else(|_| "[]".to_string())
}

fn encode_headers(headers: &BTreeMap<String, String>) -> Result<String, RegistryError> {
    serde_json::to_string(headers)
        .map_err(|err| RegistryError::Parse(format!("invalid headers JSON: {err}")))
}

#[derive(sqlx::FromRow)]
struct EndpointRow {
    id: String,
    name: String,
    url: String,
    event_types: String,
    enabled: i64,
    secret: Option<String>,
    headers: String,
    timeout_seconds: i64,
    retry_count: i64,
    created_at: String,
    updated_at: String,
    last_triggered_at: Option<String>,
    last_response_code: Option<i64>,
    last_response_time_ms: Option<f64>,
}

impl TryFrom<EndpointRow> for Endpoint {
    type Error = RegistryError;

    fn try_from(row: EndpointRow) -> Result<Self, Self::Error> {
        let id = Uuid::parse_str(&row.id)
            .map_err(|err| RegistryError::Parse(format!("invalid endpoint id: {err}")))?;

        let names: Vec<String> = serde_json::from_str(&row.event_types)
            .map_err(|err| RegistryError::Parse(format!("invalid event_types JSON: {err}")))?;
        let mut event_types = Vec::with_capacity(names.len());
        for name in &names {
            let event_type = EventType::parse(name)
                .ok_or_else(|| RegistryError::Parse(format!("unknown event type: {name}")))?;
            event_types.push(event_type);
        }

        let headers: BTreeMap<String, String> = serde_json::from_str(&row.headers)
            .map_err(|err| RegistryError::Parse(format!("invalid headers JSON: {err}")))?;

        Ok(Endpoint {
            id,
            name: row.name,
            url: row.url,
            event_types,
            enabled: row.enabled != 0,
            secret: row.secret,
            headers,
            timeout_seconds: row.timeout_seconds,
            retry_count: row.retry_count,
            created_at: row.created_at,
            updated_at: row.updated_at,
            last_triggered_at: row.last_triggered_at,
            last_response_code: row.last_response_code,
            last_response_time_ms: row.last_response_time_ms,
        })
    }
}

fn format_utc(dt: chrono::DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}
