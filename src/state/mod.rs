//! Persisted runtime state.

mod store;

pub use store::{RuntimeRecord, ServiceStatus, StateSnapshot, StateStore};
