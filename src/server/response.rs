//! API response types and formatting.
//!
//! This module defines the standard API response format used by all endpoints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::config::Driver;
use crate::error::{ErrorResponse, KumiageError};
use crate::orchestrator::Command;
use crate::state::{RuntimeRecord, ServiceStatus, StateSnapshot};

/// Standard API response wrapper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    /// Whether the request was successful.
    pub success: bool,
    /// Response data (present on success).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    /// Error information (present on failure).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorResponse>,
    /// Response timestamp.
    pub timestamp: DateTime<Utc>,
}

impl<T> ApiResponse<T> {
    /// Creates a successful response with data.
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            timestamp: Utc::now(),
        }
    }

    /// Creates a failed response with an error.
    pub fn error(error: ErrorResponse) -> ApiResponse<T> {
        ApiResponse {
            success: false,
            data: None,
            error: Some(error),
            timestamp: Utc::now(),
        }
    }

    /// Creates a failed response from a KumiageError.
    pub fn from_error(err: &KumiageError) -> ApiResponse<T> {
        Self::error(ErrorResponse::from_error(err))
    }
}

/// Health check response data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthData {
    /// Health status.
    pub status: HealthStatus,
    /// Application version.
    pub version: String,
    /// Uptime in seconds.
    pub uptime_seconds: u64,
    /// Commands served so far.
    pub commands_total: u64,
}

/// Health status enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Server is healthy.
    Healthy,
}

/// One tracked service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceInfo {
    /// Service name.
    pub name: String,
    /// Container id or PID.
    pub id: String,
    /// Execution mechanism.
    pub driver: Driver,
    /// Current status.
    pub status: ServiceStatus,
}

impl ServiceInfo {
    fn from_record(name: &str, record: &RuntimeRecord) -> Self {
        Self {
            name: name.to_string(),
            id: record.id.clone(),
            driver: record.driver,
            status: record.status,
        }
    }
}

/// Tracked services response data.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServicesData {
    /// Containers first, then processes.
    pub services: Vec<ServiceInfo>,
    /// Number of tracked services.
    pub total: usize,
    /// Identifier of the shared network.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,
    /// Volume source to engine volume name.
    pub volumes: BTreeMap<String, String>,
}

impl From<StateSnapshot> for ServicesData {
    fn from(snapshot: StateSnapshot) -> Self {
        let services: Vec<ServiceInfo> = snapshot
            .containers
            .iter()
            .chain(snapshot.processes.iter())
            .map(|(name, record)| ServiceInfo::from_record(name, record))
            .collect();

        Self {
            total: services.len(),
            services,
            network: snapshot.network_id,
            volumes: snapshot.volumes,
        }
    }
}

/// Command response data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandData {
    /// Request ID.
    pub request_id: Uuid,
    /// Command that ran.
    pub command: Command,
    /// Textual report of the command.
    pub output: String,
    /// Duration in milliseconds.
    pub duration_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    #[test]
    fn test_api_response_success() {
        let response: ApiResponse<String> = ApiResponse::success("test data".to_string());

        assert!(response.success);
        assert_eq!(response.data, Some("test data".to_string()));
        assert!(response.error.is_none());
    }

    #[test]
    fn test_api_response_error() {
        let error = ErrorResponse::new(ErrorCode::ConfigInvalid, "Test error");
        let response: ApiResponse<String> = ApiResponse::error(error);

        assert!(!response.success);
        assert!(response.data.is_none());
        assert_eq!(response.error.unwrap().code, ErrorCode::ConfigInvalid);
    }

    #[test]
    fn test_health_status_serialization() {
        let json = serde_json::to_string(&HealthStatus::Healthy).unwrap();
        assert_eq!(json, "\"healthy\"");
    }

    #[test]
    fn test_services_data_from_snapshot() {
        let mut snapshot = StateSnapshot::default();
        snapshot
            .processes
            .insert("worker".to_string(), RuntimeRecord::process(42, None, None));
        snapshot
            .containers
            .insert("db".to_string(), RuntimeRecord::container("abc", None));
        snapshot.network_id = Some("net-1".to_string());
        snapshot
            .volumes
            .insert("data".to_string(), "vol-1".to_string());

        let data = ServicesData::from(snapshot);

        assert_eq!(data.total, 2);
        assert_eq!(data.services[0].name, "db");
        assert_eq!(data.services[1].id, "42");
        assert_eq!(data.network.as_deref(), Some("net-1"));

        let json = serde_json::to_value(&data).unwrap();
        assert_eq!(json["services"][0]["driver"], "container");
        assert_eq!(json["services"][0]["status"], "RUNNING");
        assert_eq!(json["volumes"]["data"], "vol-1");
    }

    #[test]
    fn test_command_data_serialization() {
        let data = CommandData {
            request_id: Uuid::new_v4(),
            command: Command::Clean,
            output: "Removing Network: n [REMOVED]\n".to_string(),
            duration_ms: 3,
        };

        let json = serde_json::to_value(&data).unwrap();
        assert_eq!(json["command"], "clean");
        assert!(json["output"].as_str().unwrap().contains("REMOVED"));
    }
}
