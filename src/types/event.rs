use serde::{Deserialize, Serialize};
use specta::Type;

/// The closed set of domain events that can fan out to webhooks.
///
/// Adding a variant is a code change: wire names, subscription matching
/// and payload shapes all key off this enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
pub enum EventType {
    #[serde(rename = "product.created")]
    ProductCreated,
    #[serde(rename = "product.updated")]
    ProductUpdated,
    #[serde(rename = "product.deleted")]
    ProductDeleted,
    #[serde(rename = "product.bulk_updated")]
    ProductBulkUpdated,
    #[serde(rename = "product.bulk_deleted")]
    ProductBulkDeleted,
    #[serde(rename = "product.uploaded")]
    ProductUploaded,
}

impl EventType {
    pub const ALL: [EventType; 6] = [
        EventType::ProductCreated,
        EventType::ProductUpdated,
        EventType::ProductDeleted,
        EventType::ProductBulkUpdated,
        EventType::ProductBulkDeleted,
        EventType::ProductUploaded,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EventType::ProductCreated => "product.created",
            EventType::ProductUpdated => "product.updated",
            EventType::ProductDeleted => "product.deleted",
            EventType::ProductBulkUpdated => "product.bulk_updated",
            EventType::ProductBulkDeleted => "product.bulk_deleted",
            EventType::ProductUploaded => "product.uploaded",
        }
    }

    pub fn parse(value: &str) -> Option<EventType> {
        EventType::ALL
            .into_iter()
            .find(|event_type| event_type.as_str() == value)
    }
}

/// One domain event instance. Immutable once built; a single event fans
/// out to every subscribed endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, Type)]
pub struct WebhookEvent {
    pub event_type: EventType,
    /// RFC3339 UTC, captured when the event was built.
    pub timestamp: String,
    pub data: serde_json::Value,
}
