pub mod api_error;
pub mod delivery;
pub mod endpoint;
pub mod event;
pub mod product;
pub mod task;
pub mod upload;

#[allow(unused_imports)]
pub use api_error::{ApiErrorCode, ApiErrorResponse};
#[allow(unused_imports)]
pub use delivery::{DeliveryAttempt, DeliveryOutcome};
#[allow(unused_imports)]
pub use endpoint::{
    CreateWebhookRequest, DeleteWebhookResponse, ListWebhooksResponse, UpdateWebhookRequest,
    WebhookEndpoint, WebhookTestRequest, WebhookTestResponse,
};
#[allow(unused_imports)]
pub use event::{EventType, WebhookEvent};
#[allow(unused_imports)]
pub use product::{
    BulkAccepted, BulkDeleteRequest, BulkDeleteResponse, BulkDeleteSummary, BulkUpdateRequest,
    BulkUpdateResponse, BulkUpdateSummary, CreateProductRequest, ListProductsResponse, Product,
    ProductStatus, ProductUpdateEntry, UpdateProductRequest,
};
#[allow(unused_imports)]
pub use task::{TaskAccepted, TaskKind, TaskState, TaskStatusResponse};
#[allow(unused_imports)]
pub use upload::UploadChunkResponse;
