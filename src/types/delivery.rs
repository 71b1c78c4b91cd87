use serde::{Deserialize, Serialize};
use specta::Type;
use uuid::Uuid;

/// How a single HTTP delivery attempt ended. Remote-side failures are
/// data, not errors: the attempt always comes back classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryOutcome {
    Success,
    HttpError,
    Timeout,
    NetworkError,
}

impl DeliveryOutcome {
    pub fn is_success(self) -> bool {
        matches!(self, DeliveryOutcome::Success)
    }
}

/// One HTTP call to one endpoint for one event instance. Ephemeral:
/// only the owning endpoint's telemetry and the dispatch task summary
/// outlive it.
#[derive(Debug, Clone, Serialize, Deserialize, Type)]
pub struct DeliveryAttempt {
    pub endpoint_id: Uuid,
    /// Wire name of the event, e.g. `product.created` or `test`.
    pub event: String,
    pub attempt_number: i64,
    pub outcome: DeliveryOutcome,
    pub status_code: Option<i64>,
    pub duration_ms: f64,
    pub signature: Option<String>,
}
