pub mod store;

pub use store::{TrackerError, get_status, submit, transition};
