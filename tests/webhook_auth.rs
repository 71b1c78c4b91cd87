#![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    extract::State,
    http::{HeaderMap, Request, StatusCode, header::AUTHORIZATION},
    routing::post,
};
use catalog::{
    config::AppConfig,
    events::EventBus,
    handlers,
    imports::UploadSessions,
    jobs::JobQueue,
    state::AppState,
};
use http_body_util::BodyExt;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Connection, SqliteConnection, SqlitePool};
use std::fs;
use tempfile::NamedTempFile;
use tokio::sync::Mutex;
use tower::ServiceExt;

struct TestDb {
    pool: SqlitePool,
    _db_file: NamedTempFile,
}

async fn setup_db() -> TestDb {
    let db_file = NamedTempFile::new().expect("create temp sqlite file");
    let options = SqliteConnectOptions::new()
        .filename(db_file.path())
        .create_if_missing(true)
        .busy_timeout(std::time::Duration::from_millis(500));

    let mut conn = SqliteConnection::connect_with(&options)
        .await
        .expect("connect sqlite for migrations");
    run_migrations_on_conn(&mut conn).await;
    conn.close().await.expect("close migration conn");

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .expect("connect pool");

    TestDb {
        pool,
        _db_file: db_file,
    }
}

async fn run_migrations_on_conn(conn: &mut SqliteConnection) {
    let mut entries: Vec<_> = fs::read_dir("migrations")
        .expect("read migrations dir")
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().extension().and_then(|ext| ext.to_str()) == Some("sql"))
        .collect();
    entries.sort_by_key(|entry| entry.file_name());

    for entry in entries {
        let contents = fs::read_to_string(entry.path()).expect("read migration");
        for statement in contents.split(';') {
            let statement = statement.trim();
            if !statement.is_empty() {
                sqlx::query(statement)
                    .execute(&mut *conn)
                    .await
                    .expect("run migration");
            }
        }
    }
}

/// App without a worker pool: these tests only exercise the management
/// surface, never the queue.
fn build_app(pool: SqlitePool, admin_api_token: Option<&str>) -> Router {
    let config = AppConfig::default();
    let (queue, _job_rx) = JobQueue::new(config.job_queue_capacity);
    let bus = EventBus::new(pool.clone(), queue.clone());

    let state = AppState {
        pool,
        config,
        bus,
        queue,
        uploads: Arc::new(UploadSessions::new()),
        http: reqwest::Client::new(),
        admin_api_token: admin_api_token.map(str::to_string),
    };

    handlers::api_router(state)
}

async fn json_response(response: axum::response::Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).expect("valid JSON response body")
}

fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("build request")
}

fn webhook_body() -> serde_json::Value {
    serde_json::json!({
        "name": "ops",
        "url": "https://example.com/hook",
        "event_types": ["product.created"],
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// No token configured (gate disabled) - requests pass through
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn auth_disabled_allows_request_without_header() {
    let db = setup_db().await;
    let app = build_app(db.pool.clone(), None);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/webhooks")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

// ─────────────────────────────────────────────────────────────────────────────
// Token configured - header required and checked
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn missing_header_is_unauthorized() {
    let db = setup_db().await;
    let app = build_app(db.pool.clone(), Some("sekrit"));

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/webhooks")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = json_response(response).await;
    assert_eq!(body["code"], "unauthorized");
}

#[tokio::test]
async fn wrong_token_is_unauthorized() {
    let db = setup_db().await;
    let app = build_app(db.pool.clone(), Some("sekrit"));

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/webhooks")
                .header(AUTHORIZATION, "Bearer nope")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn correct_token_passes() {
    let db = setup_db().await;
    let app = build_app(db.pool.clone(), Some("sekrit"));

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/webhooks")
                .header(AUTHORIZATION, "Bearer sekrit")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn product_routes_are_not_gated() {
    let db = setup_db().await;
    let app = build_app(db.pool.clone(), Some("sekrit"));

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/products")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

// ─────────────────────────────────────────────────────────────────────────────
// Management surface behavior
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn create_list_update_delete_flow() {
    let db = setup_db().await;
    let app = build_app(db.pool.clone(), None);

    let created = app
        .clone()
        .oneshot(json_request("POST", "/api/webhooks", webhook_body()))
        .await
        .unwrap();
    assert_eq!(created.status(), StatusCode::CREATED);
    let created = json_response(created).await;
    let id = created["id"].as_str().unwrap().to_string();
    assert_eq!(created["has_secret"], false);
    assert!(created.get("secret").is_none());

    let listed = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/webhooks")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let listed = json_response(listed).await;
    assert_eq!(listed["webhooks"].as_array().unwrap().len(), 1);

    let updated = app
        .clone()
        .oneshot(json_request(
            "PATCH",
            &format!("/api/webhooks/{id}"),
            serde_json::json!({ "enabled": false, "retry_count": 5 }),
        ))
        .await
        .unwrap();
    assert_eq!(updated.status(), StatusCode::OK);
    let updated = json_response(updated).await;
    assert_eq!(updated["enabled"], false);
    assert_eq!(updated["retry_count"], 5);

    let deleted = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/api/webhooks/{id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(deleted.status(), StatusCode::OK);

    let missing = app
        .oneshot(
            Request::builder()
                .uri(format!("/api/webhooks/{id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn invalid_config_is_rejected_at_the_boundary() {
    let db = setup_db().await;
    let app = build_app(db.pool.clone(), None);

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/webhooks",
            serde_json::json!({
                "name": "bad",
                "url": "https://example.com/hook",
                "event_types": [],
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_response(response).await;
    assert_eq!(body["code"], "validation");
}

#[tokio::test]
async fn unknown_event_type_fails_deserialization() {
    let db = setup_db().await;
    let app = build_app(db.pool.clone(), None);

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/webhooks",
            serde_json::json!({
                "name": "bad",
                "url": "https://example.com/hook",
                "event_types": ["order.created"],
            }),
        ))
        .await
        .unwrap();

    // The enum is closed: an unknown name never even reaches validation.
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

// ─────────────────────────────────────────────────────────────────────────────
// Test trigger endpoint
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Clone)]
struct MockState {
    status: StatusCode,
    events_seen: Arc<Mutex<Vec<String>>>,
}

async fn mock_handler(State(state): State<MockState>, headers: HeaderMap) -> StatusCode {
    let event = headers
        .get("x-webhook-event")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("")
        .to_string();
    state.events_seen.lock().await.push(event);
    state.status
}

async fn spawn_receiver(status: StatusCode) -> (String, Arc<Mutex<Vec<String>>>) {
    let events_seen = Arc::new(Mutex::new(Vec::new()));
    let state = MockState {
        status,
        events_seen: Arc::clone(&events_seen),
    };
    let app = Router::new()
        .route("/hook", post(mock_handler))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind mock receiver");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve mock receiver");
    });

    (format!("http://{addr}/hook"), events_seen)
}

#[tokio::test]
async fn test_trigger_reports_success_and_records_telemetry() {
    let db = setup_db().await;
    let app = build_app(db.pool.clone(), None);
    let (url, events_seen) = spawn_receiver(StatusCode::OK).await;

    let created = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/webhooks",
            serde_json::json!({
                "name": "probe",
                "url": url,
                "event_types": ["product.created"],
            }),
        ))
        .await
        .unwrap();
    let id = json_response(created).await["id"]
        .as_str()
        .unwrap()
        .to_string();

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/api/webhooks/{id}/test"),
            serde_json::json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_response(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["status_code"], 200);
    assert!(body["response_time_ms"].as_f64().is_some());

    assert_eq!(events_seen.lock().await.as_slice(), ["test"]);

    let fetched = app
        .oneshot(
            Request::builder()
                .uri(format!("/api/webhooks/{id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let fetched = json_response(fetched).await;
    assert_eq!(fetched["last_response_code"], 200);
}

#[tokio::test]
async fn test_trigger_reports_remote_failure_as_data() {
    let db = setup_db().await;
    let app = build_app(db.pool.clone(), None);
    let (url, _events_seen) = spawn_receiver(StatusCode::INTERNAL_SERVER_ERROR).await;

    let created = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/webhooks",
            serde_json::json!({
                "name": "probe",
                "url": url,
                "event_types": ["product.created"],
            }),
        ))
        .await
        .unwrap();
    let id = json_response(created).await["id"]
        .as_str()
        .unwrap()
        .to_string();

    let response = app
        .oneshot(json_request(
            "POST",
            &format!("/api/webhooks/{id}/test"),
            serde_json::json!({}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_response(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["status_code"], 500);
    assert_eq!(body["error"], "HTTP 500");
}
