use serde::{Deserialize, Serialize};
use specta::Type;
use uuid::Uuid;

/// Response to one upload chunk. `task_id` appears only on the final
/// chunk, once the assembled file has been handed to the import job.
#[derive(Debug, Clone, Serialize, Deserialize, Type)]
pub struct UploadChunkResponse {
    pub upload_id: Uuid,
    pub upload_complete: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_id: Option<Uuid>,
}
