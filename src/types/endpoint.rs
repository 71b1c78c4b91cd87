use serde::{Deserialize, Serialize};
use specta::Type;
use std::collections::BTreeMap;
use uuid::Uuid;

use super::EventType;

/// Client-facing view of a configured webhook endpoint. The signing
/// secret is deliberately absent: it is write-only via the management
/// API and only ever read by the delivery path.
#[derive(Debug, Clone, Serialize, Deserialize, Type)]
pub struct WebhookEndpoint {
    pub id: Uuid,
    pub name: String,
    pub url: String,
    pub event_types: Vec<EventType>,
    pub enabled: bool,
    pub has_secret: bool,
    pub headers: BTreeMap<String, String>,
    pub timeout_seconds: i64,
    pub retry_count: i64,
    pub created_at: String,
    pub updated_at: String,

    pub last_triggered_at: Option<String>,
    pub last_response_code: Option<i64>,
    pub last_response_time_ms: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Type)]
pub struct CreateWebhookRequest {
    pub name: String,
    pub url: String,
    pub event_types: Vec<EventType>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub secret: Option<String>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    pub timeout_seconds: Option<i64>,
    pub retry_count: Option<i64>,
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Type)]
pub struct UpdateWebhookRequest {
    pub name: Option<String>,
    pub url: Option<String>,
    pub event_types: Option<Vec<EventType>>,
    pub enabled: Option<bool>,
    /// `Some("")` clears the secret; omitted leaves it untouched.
    pub secret: Option<String>,
    pub headers: Option<BTreeMap<String, String>>,
    pub timeout_seconds: Option<i64>,
    pub retry_count: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Type)]
pub struct ListWebhooksResponse {
    pub webhooks: Vec<WebhookEndpoint>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Type)]
pub struct DeleteWebhookResponse {
    pub id: Uuid,
    pub deleted: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Type)]
pub struct WebhookTestRequest {
    pub payload: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Type)]
pub struct WebhookTestResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_time_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
