use std::sync::Arc;

use sqlx::SqlitePool;

use crate::{config::AppConfig, events::EventBus, imports::UploadSessions, jobs::JobQueue};

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub config: AppConfig,
    pub bus: EventBus,
    pub queue: JobQueue,
    pub uploads: Arc<UploadSessions>,
    pub http: reqwest::Client,
    pub admin_api_token: Option<String>,
}
