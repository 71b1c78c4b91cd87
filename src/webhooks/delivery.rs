use std::time::{Duration, Instant};

use chrono::{SecondsFormat, Utc};
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue, USER_AGENT};
use serde_json::Value;

use crate::types::{DeliveryAttempt, DeliveryOutcome, WebhookEvent};
use crate::webhooks::registry::Endpoint;
use crate::webhooks::signature;

pub const USER_AGENT_VALUE: &str = "Catalog-Webhook-Client/1.0";

/// Event name used by the management surface's test operation.
pub const TEST_EVENT: &str = "test";

/// Headers the delivery path owns. Endpoint custom headers never
/// replace these; they are written after the custom set so they win.
const RESERVED_HEADERS: [&str; 3] = ["content-type", "x-webhook-event", "x-webhook-signature"];

/// One delivery attempt for a domain event. Remote failures come back
/// classified in the attempt; this only misbehaves on programmer error
/// (an endpoint whose config could not have passed registry validation).
pub async fn deliver(
    client: &reqwest::Client,
    endpoint: &Endpoint,
    event: &WebhookEvent,
    attempt_number: i64,
) -> DeliveryAttempt {
    send_once(
        client,
        endpoint,
        event.event_type.as_str(),
        &event.timestamp,
        &event.data,
        attempt_number,
    )
    .await
}

/// Single synchronous attempt with the `test` event name, used by the
/// management surface. No retry.
pub async fn deliver_test(
    client: &reqwest::Client,
    endpoint: &Endpoint,
    data: &Value,
) -> DeliveryAttempt {
    let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
    send_once(client, endpoint, TEST_EVENT, &timestamp, data, 1).await
}

async fn send_once(
    client: &reqwest::Client,
    endpoint: &Endpoint,
    event_name: &str,
    timestamp: &str,
    data: &Value,
    attempt_number: i64,
) -> DeliveryAttempt {
    let body_value = serde_json::json!({
        "event": event_name,
        "timestamp": timestamp,
        "data": data,
    });
    let body = signature::canonical_json(&body_value);

    let signature = endpoint
        .secret
        .as_deref()
        .filter(|secret| !secret.is_empty())
        .and_then(|secret| signature::signature_header(secret, &body));

    let headers = build_headers(endpoint, event_name, signature.as_deref());

    let timeout = Duration::from_secs(endpoint.timeout_seconds.max(1) as u64);
    let started = Instant::now();
    let result = client
        .post(&endpoint.url)
        .headers(headers)
        .timeout(timeout)
        .body(body)
        .send()
        .await;
    let duration_ms = started.elapsed().as_secs_f64() * 1000.0;

    let (outcome, status_code) = match result {
        Ok(response) => {
            let status = response.status();
            if status.is_success() {
                (DeliveryOutcome::Success, Some(i64::from(status.as_u16())))
            } else {
                (DeliveryOutcome::HttpError, Some(i64::from(status.as_u16())))
            }
        }
        Err(err) if err.is_timeout() => (DeliveryOutcome::Timeout, None),
        Err(err) => {
            tracing::debug!(
                endpoint_id = %endpoint.id,
                event = event_name,
                error = %err,
                "webhook request failed before a response"
            );
            (DeliveryOutcome::NetworkError, None)
        }
    };

    DeliveryAttempt {
        endpoint_id: endpoint.id,
        event: event_name.to_string(),
        attempt_number,
        outcome,
        status_code,
        duration_ms,
        signature,
    }
}

fn build_headers(endpoint: &Endpoint, event_name: &str, signature: Option<&str>) -> HeaderMap {
    let mut headers = HeaderMap::new();

    // Custom headers first; an entry naming a reserved header is dropped
    // rather than letting it shadow what gets written below.
    for (name, value) in &endpoint.headers {
        if RESERVED_HEADERS.contains(&name.to_ascii_lowercase().as_str()) {
            tracing::debug!(
                endpoint_id = %endpoint.id,
                header = %name,
                "ignoring custom header that names a reserved delivery header"
            );
            continue;
        }
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(parsed_name), Ok(parsed_value)) => {
                headers.insert(parsed_name, parsed_value);
            }
            _ => {
                tracing::warn!(
                    endpoint_id = %endpoint.id,
                    header = %name,
                    "skipping custom header that is not a valid HTTP header"
                );
            }
        }
    }

    if !headers.contains_key(USER_AGENT) {
        headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));
    }

    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    if let Ok(value) = HeaderValue::from_str(event_name) {
        headers.insert(HeaderName::from_static("x-webhook-event"), value);
    }
    if let Some(signature) = signature
        && let Ok(value) = HeaderValue::from_str(signature)
    {
        headers.insert(HeaderName::from_static("x-webhook-signature"), value);
    }

    headers
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use std::collections::BTreeMap;
    use uuid::Uuid;

    fn endpoint_with_headers(headers: BTreeMap<String, String>) -> Endpoint {
        Endpoint {
            id: Uuid::new_v4(),
            name: "test".to_string(),
            url: "https://example.com/hook".to_string(),
            event_types: vec![crate::types::EventType::ProductCreated],
            enabled: true,
            secret: None,
            headers,
            timeout_seconds: 30,
            retry_count: 3,
            created_at: String::new(),
            updated_at: String::new(),
            last_triggered_at: None,
            last_response_code: None,
            last_response_time_ms: None,
        }
    }

    #[test]
    fn reserved_headers_win_over_custom() {
        let mut custom = BTreeMap::new();
        custom.insert("Content-Type".to_string(), "text/plain".to_string());
        custom.insert("X-Webhook-Event".to_string(), "spoofed".to_string());
        custom.insert("X-Request-Id".to_string(), "abc".to_string());

        let headers = build_headers(
            &endpoint_with_headers(custom),
            "product.created",
            Some("sha256=00"),
        );

        assert_eq!(headers.get(CONTENT_TYPE).unwrap(), "application/json");
        assert_eq!(headers.get("x-webhook-event").unwrap(), "product.created");
        assert_eq!(headers.get("x-webhook-signature").unwrap(), "sha256=00");
        assert_eq!(headers.get("x-request-id").unwrap(), "abc");
    }

    #[test]
    fn custom_user_agent_is_allowed() {
        let mut custom = BTreeMap::new();
        custom.insert("User-Agent".to_string(), "integration-probe/2".to_string());

        let headers = build_headers(&endpoint_with_headers(custom), "product.deleted", None);

        assert_eq!(headers.get(USER_AGENT).unwrap(), "integration-probe/2");
        assert!(!headers.contains_key("x-webhook-signature"));
    }
}
