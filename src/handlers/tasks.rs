use axum::{
    Json,
    extract::{Path, State},
};
use uuid::Uuid;

use crate::{
    error::ApiError,
    state::AppState,
    tasks::{self, TrackerError},
    types::TaskStatusResponse,
};

pub async fn task_status_handler(
    State(state): State<AppState>,
    Path(task_id): Path<Uuid>,
) -> Result<Json<TaskStatusResponse>, ApiError> {
    let status = tasks::get_status(&state.pool, task_id)
        .await
        .map_err(map_tracker_error)?;

    Ok(Json(status))
}

fn map_tracker_error(err: TrackerError) -> ApiError {
    match err {
        TrackerError::NotFound => ApiError::not_found("task not found"),
        TrackerError::Db(db) => ApiError::Db(db),
        other => ApiError::internal(other.to_string()),
    }
}
