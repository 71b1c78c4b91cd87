use serde::{Deserialize, Serialize};
use specta::Type;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    CsvImport,
    BulkDelete,
    BulkUpdate,
    WebhookDispatch,
}

/// Task lifecycle: PENDING -> STARTED -> {SUCCESS, FAILURE}, with RETRY
/// as a transient sub-state of STARTED. Exactly one terminal transition
/// happens per task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskState {
    Pending,
    Started,
    Retry,
    Success,
    Failure,
}

impl TaskState {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskState::Success | TaskState::Failure)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Type)]
pub struct TaskStatusResponse {
    pub task_id: Uuid,
    pub state: TaskState,
    pub result: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Type)]
pub struct TaskAccepted {
    pub task_id: Uuid,
    pub state: TaskState,
}
