//! Build Log HTTP Client
//!
//! A small, typed HTTP client for the build log server.
//!
//! # Example
//!
//! ```no_run
//! use buildlog_client::BuildLogClient;
//! use buildlog_core::dto::log::BuildLogOptions;
//! use futures::StreamExt;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = BuildLogClient::new("http://localhost:8080");
//!
//!     let options = BuildLogOptions { follow: true, ..Default::default() };
//!     let mut log = client.stream_build_log("ci", "app-1", &options).await?;
//!     while let Some(chunk) = log.next().await {
//!         print!("{}", String::from_utf8_lossy(&chunk?));
//!     }
//!     Ok(())
//! }
//! ```

pub mod error;
mod logs;
mod registry;

// Re-export commonly used types
pub use error::{ClientError, Result};
pub use logs::LogChunks;

use reqwest::Client;
use serde::de::DeserializeOwned;

/// HTTP client for the build log server API
///
/// Methods are grouped by concern:
/// - Build log streaming
/// - Registry updates (builds, execution units, step logs)
/// - Health checks
#[derive(Debug, Clone)]
pub struct BuildLogClient {
    /// Base URL of the server (e.g., "http://localhost:8080")
    base_url: String,
    /// HTTP client instance
    client: Client,
}

impl BuildLogClient {
    /// Create a new client
    ///
    /// # Arguments
    /// * `base_url` - The base URL of the server (e.g., "http://localhost:8080")
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, Client::new())
    }

    /// Create a new client with a custom HTTP client
    ///
    /// Useful to configure proxies or TLS. Avoid a global request timeout
    /// when following logs: a followed stream stays open as long as the
    /// build runs.
    pub fn with_client(base_url: impl Into<String>, client: Client) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    /// Get the base URL of the server
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Check that the server is up
    pub async fn health(&self) -> Result<()> {
        let url = format!("{}/health", self.base_url);
        let response = self.client.get(&url).send().await?;

        self.handle_empty_response(response).await
    }

    // =============================================================================
    // Response Handlers
    // =============================================================================

    /// Turn a non-success response into a [`ClientError`]
    async fn check_status(&self, response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ClientError::from_body(status.as_u16(), &error_text));
        }

        Ok(response)
    }

    /// Handle an API response and deserialize JSON
    async fn handle_response<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        self.check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| ClientError::ParseError(format!("Failed to parse JSON response: {}", e)))
    }

    /// Handle an API response whose body is not needed
    async fn handle_empty_response(&self, response: reqwest::Response) -> Result<()> {
        self.check_status(response).await.map(|_| ())
    }
}
