use axum::{
    Json,
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    error::ApiError,
    imports::{ChunkOutcome, UploadError},
    jobs::Job,
    state::AppState,
    tasks,
    types::{TaskKind, UploadChunkResponse},
};

#[derive(Debug, Deserialize)]
pub struct UploadChunkQuery {
    upload_id: Option<Uuid>,
    end: Option<i64>,
}

/// One chunk of a CSV upload, raw bytes in the body. The first chunk
/// omits `upload_id` and gets one allocated; `end=1` finalizes the
/// upload and queues the import, so only that response carries a
/// `task_id`.
pub async fn upload_chunk_handler(
    State(state): State<AppState>,
    Query(query): Query<UploadChunkQuery>,
    body: Bytes,
) -> Result<(StatusCode, Json<UploadChunkResponse>), ApiError> {
    let is_last = match query.end.unwrap_or(0) {
        0 => false,
        1 => true,
        other => {
            return Err(ApiError::validation(format!(
                "end must be 0 or 1, got {other}"
            )));
        }
    };

    let outcome = state
        .uploads
        .append_chunk(query.upload_id, &body, is_last)
        .await
        .map_err(|err| match err {
            UploadError::NotFound => ApiError::not_found("unknown upload id"),
        })?;

    match outcome {
        ChunkOutcome::Partial { upload_id } => Ok((
            StatusCode::OK,
            Json(UploadChunkResponse {
                upload_id,
                upload_complete: false,
                task_id: None,
            }),
        )),
        ChunkOutcome::Complete { upload_id, data } => {
            let task_id = tasks::submit(&state.pool, TaskKind::CsvImport)
                .await
                .map_err(|err| ApiError::internal(err.to_string()))?;

            state
                .queue
                .enqueue(Job::CsvImport { task_id, data })
                .await
                .map_err(|err| ApiError::internal(err.to_string()))?;

            Ok((
                StatusCode::ACCEPTED,
                Json(UploadChunkResponse {
                    upload_id,
                    upload_complete: true,
                    task_id: Some(task_id),
                }),
            ))
        }
    }
}
