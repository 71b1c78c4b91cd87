#![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    Router,
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::post,
};
use catalog::types::{DeliveryOutcome, EventType, WebhookEvent};
use catalog::webhooks::registry::Endpoint;
use catalog::webhooks::retry::{RetryPolicy, deliver_with_retry};
use catalog::webhooks::{delivery, signature};
use hmac::{Hmac, Mac};
use serde_json::json;
use sha2::Sha256;
use tokio::sync::Mutex;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

const FAST_POLICY: RetryPolicy = RetryPolicy {
    base_delay_ms: 5,
    max_delay_ms: 20,
};

#[derive(Debug, Clone)]
struct CapturedRequest {
    headers: BTreeMap<String, String>,
    body: String,
}

#[derive(Clone)]
struct MockState {
    status: StatusCode,
    captured: Arc<Mutex<Vec<CapturedRequest>>>,
}

async fn capture_handler(
    State(state): State<MockState>,
    headers: HeaderMap,
    body: String,
) -> StatusCode {
    let headers = headers
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                value.to_str().unwrap_or("").to_string(),
            )
        })
        .collect();
    state.captured.lock().await.push(CapturedRequest { headers, body });
    state.status
}

/// Throwaway receiver on an ephemeral port; returns its URL and the
/// captured request log.
async fn spawn_receiver(status: StatusCode) -> (String, Arc<Mutex<Vec<CapturedRequest>>>) {
    let captured = Arc::new(Mutex::new(Vec::new()));
    let state = MockState {
        status,
        captured: Arc::clone(&captured),
    };
    let app = Router::new()
        .route("/hook", post(capture_handler))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind mock receiver");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve mock receiver");
    });

    (format!("http://{addr}/hook"), captured)
}

/// A port that nothing listens on: bind, read the port, drop the
/// listener. Connections are refused immediately.
async fn dead_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind throwaway listener");
    let addr = listener.local_addr().expect("local addr");
    drop(listener);
    format!("http://{addr}/hook")
}

fn endpoint(url: &str) -> Endpoint {
    Endpoint {
        id: Uuid::new_v4(),
        name: "delivery-test".to_string(),
        url: url.to_string(),
        event_types: vec![EventType::ProductCreated],
        enabled: true,
        secret: None,
        headers: BTreeMap::new(),
        timeout_seconds: 5,
        retry_count: 3,
        created_at: String::new(),
        updated_at: String::new(),
        last_triggered_at: None,
        last_response_code: None,
        last_response_time_ms: None,
    }
}

fn sample_event() -> WebhookEvent {
    WebhookEvent {
        event_type: EventType::ProductCreated,
        timestamp: "2025-06-01T12:00:00Z".to_string(),
        data: json!({ "sku": "A-1", "name": "Widget" }),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Wire contract
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn delivery_sends_the_documented_headers_and_body() {
    let (url, captured) = spawn_receiver(StatusCode::OK).await;
    let client = reqwest::Client::new();

    let attempt = delivery::deliver(&client, &endpoint(&url), &sample_event(), 1).await;
    assert_eq!(attempt.outcome, DeliveryOutcome::Success);
    assert_eq!(attempt.status_code, Some(200));
    assert!(attempt.signature.is_none());

    let captured = captured.lock().await;
    assert_eq!(captured.len(), 1);
    let request = &captured[0];

    assert_eq!(request.headers.get("content-type").unwrap(), "application/json");
    assert_eq!(
        request.headers.get("x-webhook-event").unwrap(),
        "product.created"
    );
    assert_eq!(
        request.headers.get("user-agent").unwrap(),
        "Catalog-Webhook-Client/1.0"
    );
    assert!(!request.headers.contains_key("x-webhook-signature"));

    let body: serde_json::Value = serde_json::from_str(&request.body).unwrap();
    assert_eq!(body["event"], "product.created");
    assert_eq!(body["timestamp"], "2025-06-01T12:00:00Z");
    assert_eq!(body["data"]["sku"], "A-1");
}

#[tokio::test]
async fn signature_header_verifies_against_the_wire_body() {
    let (url, captured) = spawn_receiver(StatusCode::OK).await;
    let client = reqwest::Client::new();

    let mut target = endpoint(&url);
    target.secret = Some("s3cr3t".to_string());

    let attempt = delivery::deliver(&client, &target, &sample_event(), 1).await;
    assert_eq!(attempt.outcome, DeliveryOutcome::Success);

    let captured = captured.lock().await;
    let request = &captured[0];
    let header = request.headers.get("x-webhook-signature").unwrap();

    // The receiver recomputes the HMAC over exactly the bytes it got.
    let mut mac = HmacSha256::new_from_slice(b"s3cr3t").unwrap();
    mac.update(request.body.as_bytes());
    let expected = format!("sha256={}", hex::encode(mac.finalize().into_bytes()));
    assert_eq!(header, &expected);
    assert_eq!(attempt.signature.as_deref(), Some(expected.as_str()));

    // And the body is in canonical (key-sorted) form.
    let parsed: serde_json::Value = serde_json::from_str(&request.body).unwrap();
    assert_eq!(request.body, signature::canonical_json(&parsed));
}

#[tokio::test]
async fn custom_headers_ride_along_but_reserved_ones_win() {
    let (url, captured) = spawn_receiver(StatusCode::OK).await;
    let client = reqwest::Client::new();

    let mut target = endpoint(&url);
    target.headers.insert(
        "Authorization".to_string(),
        "Bearer deadbeef".to_string(),
    );
    target
        .headers
        .insert("X-Webhook-Event".to_string(), "spoofed.event".to_string());

    delivery::deliver(&client, &target, &sample_event(), 1).await;

    let captured = captured.lock().await;
    let request = &captured[0];
    assert_eq!(request.headers.get("authorization").unwrap(), "Bearer deadbeef");
    assert_eq!(
        request.headers.get("x-webhook-event").unwrap(),
        "product.created"
    );
}

#[tokio::test]
async fn non_2xx_is_an_http_error_not_an_exception() {
    let (url, _captured) = spawn_receiver(StatusCode::INTERNAL_SERVER_ERROR).await;
    let client = reqwest::Client::new();

    let attempt = delivery::deliver(&client, &endpoint(&url), &sample_event(), 1).await;
    assert_eq!(attempt.outcome, DeliveryOutcome::HttpError);
    assert_eq!(attempt.status_code, Some(500));
}

#[tokio::test]
async fn refused_connection_is_a_network_error() {
    let url = dead_url().await;
    let client = reqwest::Client::new();

    let attempt = delivery::deliver(&client, &endpoint(&url), &sample_event(), 1).await;
    assert_eq!(attempt.outcome, DeliveryOutcome::NetworkError);
    assert_eq!(attempt.status_code, None);
}

// ─────────────────────────────────────────────────────────────────────────────
// Retry scheduling
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn success_on_first_attempt_does_not_retry() {
    let (url, captured) = spawn_receiver(StatusCode::OK).await;
    let client = reqwest::Client::new();

    let attempt = deliver_with_retry(&client, &endpoint(&url), &sample_event(), FAST_POLICY).await;
    assert_eq!(attempt.outcome, DeliveryOutcome::Success);
    assert_eq!(attempt.attempt_number, 1);
    assert_eq!(captured.lock().await.len(), 1);
}

#[tokio::test]
async fn retry_count_3_makes_exactly_4_attempts_against_a_failing_endpoint() {
    let (url, captured) = spawn_receiver(StatusCode::SERVICE_UNAVAILABLE).await;
    let client = reqwest::Client::new();

    let attempt = deliver_with_retry(&client, &endpoint(&url), &sample_event(), FAST_POLICY).await;

    assert_eq!(attempt.outcome, DeliveryOutcome::HttpError);
    assert_eq!(attempt.attempt_number, 4);
    assert_eq!(captured.lock().await.len(), 4);
}

#[tokio::test]
async fn dead_endpoint_exhausts_retries_and_returns_the_failed_attempt() {
    let url = dead_url().await;
    let client = reqwest::Client::new();

    let attempt = deliver_with_retry(&client, &endpoint(&url), &sample_event(), FAST_POLICY).await;

    assert_eq!(attempt.outcome, DeliveryOutcome::NetworkError);
    assert_eq!(attempt.attempt_number, 4);
}

#[tokio::test]
async fn retry_count_zero_means_a_single_attempt() {
    let (url, captured) = spawn_receiver(StatusCode::BAD_GATEWAY).await;
    let client = reqwest::Client::new();

    let mut target = endpoint(&url);
    target.retry_count = 0;

    let attempt = deliver_with_retry(&client, &target, &sample_event(), FAST_POLICY).await;
    assert_eq!(attempt.attempt_number, 1);
    assert_eq!(captured.lock().await.len(), 1);
}

// ─────────────────────────────────────────────────────────────────────────────
// Test delivery (management surface)
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_delivery_uses_the_test_event_name() {
    let (url, captured) = spawn_receiver(StatusCode::OK).await;
    let client = reqwest::Client::new();

    let payload = json!({ "test": true, "message": "ping" });
    let attempt = delivery::deliver_test(&client, &endpoint(&url), &payload).await;

    assert_eq!(attempt.outcome, DeliveryOutcome::Success);
    assert_eq!(attempt.event, "test");

    let captured = captured.lock().await;
    let request = &captured[0];
    assert_eq!(request.headers.get("x-webhook-event").unwrap(), "test");
    let body: serde_json::Value = serde_json::from_str(&request.body).unwrap();
    assert_eq!(body["event"], "test");
    assert_eq!(body["data"]["message"], "ping");
}
