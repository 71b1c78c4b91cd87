//! Product-catalog backend: CRUD over a product store plus the
//! asynchronous machinery around it — webhook fan-out with retry and
//! signing, a background job queue with tracked task state, bulk
//! operations that fall over to async above a size threshold, and
//! chunked CSV upload assembly.

pub mod auth;
pub mod config;
pub mod error;
pub mod events;
pub mod handlers;
pub mod imports;
pub mod jobs;
pub mod products;
pub mod state;
pub mod tasks;
pub mod types;
pub mod webhooks;
