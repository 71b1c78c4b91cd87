pub mod bulk;
pub mod store;

pub use bulk::{BulkError, SYNC_LIMIT, bulk_delete, bulk_update};
pub use store::{ListProductsParams, ListProductsResult, ProductCursor, ProductStoreError};
