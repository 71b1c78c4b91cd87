pub mod delivery;
pub mod dispatch;
pub mod registry;
pub mod retry;
pub mod signature;

pub use dispatch::{DispatchSummary, dispatch_event};
pub use registry::{Endpoint, RegistryError};
pub use retry::{RetryPolicy, deliver_with_retry};
