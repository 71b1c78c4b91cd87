use std::net::SocketAddr;
use std::sync::Arc;

use catalog::{
    config::AppConfig,
    events::EventBus,
    handlers,
    imports::UploadSessions,
    jobs::{self, JobQueue, WorkerContext},
    state::AppState,
    webhooks::delivery,
};
use sqlx::sqlite::SqlitePoolOptions;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("catalog=info")),
        )
        .init();

    let database_url =
        std::env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite:catalog.db".to_string());
    let bind_addr =
        std::env::var("CATALOG_BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:3000".to_string());

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await?;

    sqlx::query("PRAGMA foreign_keys = ON;")
        .execute(&pool)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    let config = AppConfig::from_env();

    let http = reqwest::Client::builder()
        .user_agent(delivery::USER_AGENT_VALUE)
        .redirect(reqwest::redirect::Policy::none())
        .build()?;

    let (queue, job_rx) = JobQueue::new(config.job_queue_capacity);
    let bus = EventBus::new(pool.clone(), queue.clone());

    jobs::spawn_workers(
        WorkerContext {
            pool: pool.clone(),
            config: config.clone(),
            client: http.clone(),
            bus: bus.clone(),
        },
        job_rx,
    );

    let state = AppState {
        pool,
        config,
        bus,
        queue,
        uploads: Arc::new(UploadSessions::new()),
        http,
        admin_api_token: std::env::var("CATALOG_ADMIN_TOKEN").ok(),
    };

    let app = handlers::api_router(state);

    let addr: SocketAddr = bind_addr.parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "catalog backend listening");
    axum::serve(listener, app).await?;

    Ok(())
}
