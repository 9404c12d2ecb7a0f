//! HTTP Client module for kumiage.
//!
//! This module provides the HTTP client used by `kumiage remote` to drive
//! another kumiage server.

pub mod api;

pub use api::KumiageClient;
