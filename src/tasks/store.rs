use chrono::{SecondsFormat, Utc};
use sqlx::{QueryBuilder, SqlitePool};
use thiserror::Error;
use uuid::Uuid;

use crate::types::{TaskKind, TaskState, TaskStatusResponse};

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
    #[error("task not found")]
    NotFound,
    #[error("invalid task state transition: {from:?} -> {to:?}")]
    InvalidTransition { from: TaskState, to: TaskState },
    #[error("invalid stored task: {0}")]
    Parse(String),
}

/// Create a PENDING task record and return its id. Non-blocking by
/// design: callers acknowledge submission before any work runs.
pub async fn submit(pool: &SqlitePool, kind: TaskKind) -> Result<Uuid, TrackerError> {
    let task_id = Uuid::new_v4();
    let now = format_utc(Utc::now());

    sqlx::query(
        r#"
        INSERT INTO background_tasks (id, kind, state, created_at, updated_at)
        VALUES (?, ?, 'pending', ?, ?)
        "#,
    )
    .bind(task_id.to_string())
    .bind(kind_to_str(kind))
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await?;

    Ok(task_id)
}

/// Move a task along its state machine. The legal transitions are
/// {PENDING->STARTED, STARTED->RETRY, RETRY->STARTED, STARTED->SUCCESS,
/// STARTED->FAILURE, RETRY->FAILURE}; anything else is a bug in the
/// owning job, surfaced as `InvalidTransition`. The guard is the
/// `state IN (...)` clause of a single UPDATE, so a violation cannot
/// slip in between a read and a write.
pub async fn transition(
    pool: &SqlitePool,
    task_id: Uuid,
    new_state: TaskState,
    result: Option<&serde_json::Value>,
) -> Result<(), TrackerError> {
    let allowed_from: &[TaskState] = match new_state {
        TaskState::Started => &[TaskState::Pending, TaskState::Retry],
        TaskState::Retry => &[TaskState::Started],
        TaskState::Success => &[TaskState::Started],
        TaskState::Failure => &[TaskState::Started, TaskState::Retry],
        TaskState::Pending => &[],
    };

    let result_json = match result {
        Some(value) => Some(
            serde_json::to_string(value)
                .map_err(|err| TrackerError::Parse(format!("invalid result JSON: {err}")))?,
        ),
        None => None,
    };

    if !allowed_from.is_empty() {
        let mut query = QueryBuilder::new("UPDATE background_tasks SET state = ");
        query.push_bind(state_to_str(new_state));
        query.push(", result = COALESCE(");
        query.push_bind(result_json.as_deref());
        query.push(", result), updated_at = ");
        query.push_bind(format_utc(Utc::now()));
        query.push(" WHERE id = ");
        query.push_bind(task_id.to_string());
        query.push(" AND state IN (");
        let mut allowed_list = query.separated(", ");
        for state in allowed_from {
            allowed_list.push_bind(state_to_str(*state));
        }
        allowed_list.push_unseparated(")");

        if query.build().execute(pool).await?.rows_affected() > 0 {
            return Ok(());
        }
    }

    // Either the task does not exist or it is in a state the requested
    // transition is not legal from. Look once to tell the two apart.
    let current: Option<(String,)> =
        sqlx::query_as("SELECT state FROM background_tasks WHERE id = ?")
            .bind(task_id.to_string())
            .fetch_optional(pool)
            .await?;

    match current {
        None => Err(TrackerError::NotFound),
        Some((state,)) => Err(TrackerError::InvalidTransition {
            from: parse_state(&state)?,
            to: new_state,
        }),
    }
}

pub async fn get_status(
    pool: &SqlitePool,
    task_id: Uuid,
) -> Result<TaskStatusResponse, TrackerError> {
    let row: Option<(String, Option<String>)> =
        sqlx::query_as("SELECT state, result FROM background_tasks WHERE id = ?")
            .bind(task_id.to_string())
            .fetch_optional(pool)
            .await?;

    let (state, result) = row.ok_or(TrackerError::NotFound)?;

    let result = match result {
        Some(raw) => Some(
            serde_json::from_str(&raw)
                .map_err(|err| TrackerError::Parse(format!("invalid result JSON: {err}")))?,
        ),
        None => None,
    };

    Ok(TaskStatusResponse {
        task_id,
        state: parse_state(&state)?,
        result,
    })
}

fn kind_to_str(kind: TaskKind) -> &'static str {
    match kind {
        TaskKind::CsvImport => "csv_import",
        TaskKind::BulkDelete => "bulk_delete",
        TaskKind::BulkUpdate => "bulk_update",
        TaskKind::WebhookDispatch => "webhook_dispatch",
    }
}

fn state_to_str(state: TaskState) -> &'static str {
    match state {
        TaskState::Pending => "pending",
        TaskState::Started => "started",
        TaskState::Retry => "retry",
        TaskState::Success => "success",
        TaskState::Failure => "failure",
    }
}

fn parse_state(state: &str) -> Result<TaskState, TrackerError> {
    match state {
        "pending" => Ok(TaskState::Pending),
        "started" => Ok(TaskState::Started),
        "retry" => Ok(TaskState::Retry),
        "success" => Ok(TaskState::Success),
        "failure" => Ok(TaskState::Failure),
        other => Err(TrackerError::Parse(format!("unknown task state: {other}"))),
    }
}

fn format_utc(dt: chrono::DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}
