//! Kumiage HTTP client API.
//!
//! This module provides the client for driving a remote `kumiage serve`.

use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{KumiageError, Result};
use crate::orchestrator::Command;
use crate::server::response::{ApiResponse, CommandData, HealthData, ServicesData};

/// Default timeout for HTTP requests. A `start` waits for every launch.
const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// HTTP client for a remote orchestrator.
#[derive(Debug, Clone)]
pub struct KumiageClient {
    /// HTTP client.
    client: Client,
    /// Base URL of the target server.
    base_url: String,
}

impl KumiageClient {
    /// Creates a new client for the specified server URL.
    ///
    /// # Arguments
    /// * `base_url` - Base URL of the server (e.g., "http://localhost:8080")
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        Self::with_timeout(base_url, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    /// Creates a new client with custom timeout.
    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let base_url = base_url.into();
        let client = Client::builder().timeout(timeout).build().map_err(|e| {
            KumiageError::connection_with_source(base_url.clone(), e)
        })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Returns the base URL requests are sent to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Checks the health of the target server.
    pub async fn health(&self) -> Result<HealthData> {
        let url = format!("{}/api/v1/health", self.base_url);
        debug!(url = %url, "Checking server health");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| KumiageError::connection_with_source(&self.base_url, e))?;

        self.parse(response).await
    }

    /// Lists the services tracked by the target server.
    pub async fn services(&self) -> Result<ServicesData> {
        let url = format!("{}/api/v1/services", self.base_url);
        debug!(url = %url, "Listing services");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| KumiageError::connection_with_source(&self.base_url, e))?;

        self.parse(response).await
    }

    /// Runs a command on the target server.
    ///
    /// # Arguments
    /// * `command` - Command to run
    /// * `definition` - YAML service definition, required for `start`
    pub async fn run_command(
        &self,
        command: Command,
        definition: Option<&str>,
    ) -> Result<CommandData> {
        let url = format!("{}/api/v1/commands/{}", self.base_url, command);
        info!(url = %url, command = %command, "Sending command");

        let mut request = self
            .client
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, "application/yaml");
        if let Some(definition) = definition {
            request = request.body(definition.to_string());
        }

        let response = request
            .send()
            .await
            .map_err(|e| KumiageError::connection_with_source(&self.base_url, e))?;

        self.parse(response).await
    }

    async fn parse<T: DeserializeOwned>(&self, response: Response) -> Result<T> {
        let status = response.status();
        let api_response: ApiResponse<T> = response
            .json()
            .await
            .map_err(|e| KumiageError::connection_with_source(&self.base_url, e))?;

        if api_response.success {
            api_response.data.ok_or_else(|| {
                KumiageError::invalid_request(format!(
                    "Response from {} is missing data",
                    self.base_url
                ))
            })
        } else {
            Err(Self::extract_error(status.as_u16(), &api_response))
        }
    }

    /// Extracts an error from an API response.
    fn extract_error<T>(status: u16, response: &ApiResponse<T>) -> KumiageError {
        match &response.error {
            Some(err) => KumiageError::invalid_request(format!("[{}] {}", err.code, err.message)),
            None => KumiageError::invalid_request(format!("Request failed with HTTP {}", status)),
        }
    }
}
