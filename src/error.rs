//! Error types and error handling for kumiage.
//!
//! This module defines all error types used throughout the application,
//! including error codes, error responses for the API, and CLI exit codes.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// Stable error codes.
/// Each error has a unique code for identification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    /// E001: Configuration or service definition is invalid
    #[serde(rename = "E001")]
    ConfigInvalid,

    /// E002: Target service does not exist
    #[serde(rename = "E002")]
    ServiceNotFound,

    /// E003: Dependency graph cannot be launched
    #[serde(rename = "E003")]
    DependencyInvalid,

    /// E004: Container engine operation failed
    #[serde(rename = "E004")]
    EngineError,

    /// E005: Operation timed out
    #[serde(rename = "E005")]
    Timeout,

    /// E006: Failed to connect to a remote server
    #[serde(rename = "E006")]
    ConnectionError,

    /// E007: Local process operation failed
    #[serde(rename = "E007")]
    ProcessError,

    /// E008: Request is invalid
    #[serde(rename = "E008")]
    InvalidRequest,

    /// E009: State file could not be read or written
    #[serde(rename = "E009")]
    StateError,
}

impl ErrorCode {
    /// Returns the error code as a string (e.g., "E001").
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ConfigInvalid => "E001",
            ErrorCode::ServiceNotFound => "E002",
            ErrorCode::DependencyInvalid => "E003",
            ErrorCode::EngineError => "E004",
            ErrorCode::Timeout => "E005",
            ErrorCode::ConnectionError => "E006",
            ErrorCode::ProcessError => "E007",
            ErrorCode::InvalidRequest => "E008",
            ErrorCode::StateError => "E009",
        }
    }

    /// Returns the default message for this error code.
    pub fn default_message(&self) -> &'static str {
        match self {
            ErrorCode::ConfigInvalid => "Configuration is invalid",
            ErrorCode::ServiceNotFound => "Service not found",
            ErrorCode::DependencyInvalid => "Dependency graph is invalid",
            ErrorCode::EngineError => "Container engine operation failed",
            ErrorCode::Timeout => "Operation timed out",
            ErrorCode::ConnectionError => "Failed to connect to remote server",
            ErrorCode::ProcessError => "Process operation failed",
            ErrorCode::InvalidRequest => "Request is invalid",
            ErrorCode::StateError => "State file operation failed",
        }
    }

    /// Returns the HTTP status code for this error.
    pub fn http_status(&self) -> u16 {
        match self {
            ErrorCode::ConfigInvalid => 400,
            ErrorCode::ServiceNotFound => 404,
            ErrorCode::DependencyInvalid => 422,
            ErrorCode::EngineError => 500,
            ErrorCode::Timeout => 504,
            ErrorCode::ConnectionError => 502,
            ErrorCode::ProcessError => 500,
            ErrorCode::InvalidRequest => 400,
            ErrorCode::StateError => 500,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// CLI exit codes.
pub mod exit_code {
    /// Success
    pub const SUCCESS: i32 = 0;
    /// General error
    pub const GENERAL_ERROR: i32 = 1;
    /// Configuration error
    pub const CONFIG_ERROR: i32 = 2;
    /// Connection error
    pub const CONNECTION_ERROR: i32 = 3;
    /// Timeout error
    pub const TIMEOUT_ERROR: i32 = 4;
    /// State file error
    pub const STATE_ERROR: i32 = 5;
    /// Command line argument error
    pub const CLI_ERROR: i32 = 64;
}

/// The main error type for kumiage.
#[derive(Debug, Error)]
pub enum KumiageError {
    /// Configuration file or service definition is invalid.
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Target service does not exist.
    #[error("Service not found: {service}")]
    ServiceNotFound { service: String },

    /// A service depends on a service that is neither declared nor tracked.
    #[error("Service '{service}' depends on unknown service '{dependency}'")]
    UnknownDependency { service: String, dependency: String },

    /// The dependency graph contains a cycle.
    #[error("Dependency cycle detected between: {}", services.join(", "))]
    DependencyCycle { services: Vec<String> },

    /// A dependency reported a failed launch.
    #[error("Dependency '{dependency}' of '{service}' failed to launch")]
    DependencyFailed { service: String, dependency: String },

    /// The requested image is not present locally.
    #[error("No such image: {image}")]
    ImageNotFound { image: String },

    /// Container engine operation failed.
    #[error("Engine error: {message}")]
    Engine {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Local process operation failed.
    #[error("Process error: {message}")]
    Process {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Operation timed out.
    #[error("Timeout: {operation} (waited {seconds}s)")]
    Timeout { operation: String, seconds: u64 },

    /// Failed to connect to a remote server.
    #[error("Connection error: {target}")]
    Connection {
        target: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Request is invalid.
    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    /// State file could not be read or written.
    #[error("State error: {message}")]
    State {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing error.
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON parsing error.
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),
}

impl KumiageError {
    /// Returns the error code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            KumiageError::Config { .. } => ErrorCode::ConfigInvalid,
            KumiageError::ServiceNotFound { .. } => ErrorCode::ServiceNotFound,
            KumiageError::UnknownDependency { .. }
            | KumiageError::DependencyCycle { .. }
            | KumiageError::DependencyFailed { .. } => ErrorCode::DependencyInvalid,
            KumiageError::ImageNotFound { .. } | KumiageError::Engine { .. } => {
                ErrorCode::EngineError
            }
            KumiageError::Process { .. } => ErrorCode::ProcessError,
            KumiageError::Timeout { .. } => ErrorCode::Timeout,
            KumiageError::Connection { .. } => ErrorCode::ConnectionError,
            KumiageError::InvalidRequest { .. } => ErrorCode::InvalidRequest,
            KumiageError::State { .. } => ErrorCode::StateError,
            KumiageError::Io(_) => ErrorCode::ProcessError,
            KumiageError::Yaml(_) => ErrorCode::ConfigInvalid,
            KumiageError::Json(_) => ErrorCode::InvalidRequest,
        }
    }

    /// Returns the CLI exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            KumiageError::Config { .. }
            | KumiageError::Yaml(_)
            | KumiageError::UnknownDependency { .. }
            | KumiageError::DependencyCycle { .. } => exit_code::CONFIG_ERROR,
            KumiageError::Connection { .. } => exit_code::CONNECTION_ERROR,
            KumiageError::Timeout { .. } => exit_code::TIMEOUT_ERROR,
            KumiageError::State { .. } => exit_code::STATE_ERROR,
            _ => exit_code::GENERAL_ERROR,
        }
    }

    /// Creates a configuration error with a message.
    pub fn config(message: impl Into<String>) -> Self {
        KumiageError::Config {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a configuration error with a message and source.
    pub fn config_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        KumiageError::Config {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates an engine error with a message.
    pub fn engine(message: impl Into<String>) -> Self {
        KumiageError::Engine {
            message: message.into(),
            source: None,
        }
    }

    /// Creates an engine error with a message and source.
    pub fn engine_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        KumiageError::Engine {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates a process error with a message.
    pub fn process(message: impl Into<String>) -> Self {
        KumiageError::Process {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a process error with a message and source.
    pub fn process_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        KumiageError::Process {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates a state file error with a message and source.
    pub fn state_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        KumiageError::State {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates a connection error.
    pub fn connection(target: impl Into<String>) -> Self {
        KumiageError::Connection {
            target: target.into(),
            source: None,
        }
    }

    /// Creates a connection error with a source.
    pub fn connection_with_source(
        target: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        KumiageError::Connection {
            target: target.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates an invalid request error.
    pub fn invalid_request(message: impl Into<String>) -> Self {
        KumiageError::InvalidRequest {
            message: message.into(),
        }
    }
}

/// Error details for API responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetails {
    /// Additional context fields.
    #[serde(flatten)]
    pub fields: HashMap<String, serde_json::Value>,
}

impl ErrorDetails {
    /// Creates empty error details.
    pub fn new() -> Self {
        Self {
            fields: HashMap::new(),
        }
    }

    /// Adds a field to the error details.
    pub fn with_field(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }
}

impl Default for ErrorDetails {
    fn default() -> Self {
        Self::new()
    }
}

/// Error response structure for the API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error code (e.g., "E001").
    pub code: ErrorCode,

    /// Human-readable error message.
    pub message: String,

    /// Additional error details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<ErrorDetails>,
}

impl ErrorResponse {
    /// Creates a new error response.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    /// Creates an error response from a KumiageError.
    pub fn from_error(error: &KumiageError) -> Self {
        let code = error.code();
        let message = error.to_string();

        let details = match error {
            KumiageError::ServiceNotFound { service } => {
                Some(ErrorDetails::new().with_field("service", service.clone()))
            }
            KumiageError::UnknownDependency {
                service,
                dependency,
            } => Some(
                ErrorDetails::new()
                    .with_field("service", service.clone())
                    .with_field("dependency", dependency.clone())
                    .with_field(
                        "suggestion",
                        "Declare the dependency or start it before this service",
                    ),
            ),
            KumiageError::DependencyCycle { services } => Some(
                ErrorDetails::new().with_field("services", serde_json::json!(services)),
            ),
            KumiageError::Timeout { operation, seconds } => Some(
                ErrorDetails::new()
                    .with_field("operation", operation.clone())
                    .with_field("timeout_seconds", *seconds),
            ),
            KumiageError::Connection { target, .. } => {
                Some(ErrorDetails::new().with_field("target", target.clone()))
            }
            _ => None,
        };

        Self {
            code,
            message,
            details,
        }
    }
}

/// Result type alias for kumiage operations.
pub type Result<T> = std::result::Result<T, KumiageError>;
