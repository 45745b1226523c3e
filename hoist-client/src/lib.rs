//! Hoist HTTP Client
//!
//! Typed client for the Hoist orchestrator API, used by the `hoist` CLI.
//!
//! # Example
//!
//! ```no_run
//! use hoist_client::HoistClient;
//! use hoist_core::dto::run::TriggerDeploy;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), hoist_client::ClientError> {
//!     let client = HoistClient::new("http://localhost:8080");
//!
//!     let run = client.trigger_deploy(&TriggerDeploy::default()).await?;
//!     println!("Queued run: {}", run.id);
//!     Ok(())
//! }
//! ```

pub mod error;
mod runs;

pub use error::{ClientError, Result};

use reqwest::Client;
use serde::de::DeserializeOwned;

/// HTTP client for the Hoist orchestrator API
#[derive(Debug, Clone)]
pub struct HoistClient {
    /// Base URL of the orchestrator (e.g., "http://localhost:8080")
    base_url: String,
    client: Client,
}

impl HoistClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, Client::new())
    }

    /// Create a client with a custom HTTP client (timeouts, proxies, TLS)
    pub fn with_client(base_url: impl Into<String>, client: Client) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    /// Get the base URL of the orchestrator
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Check an API response and deserialize its JSON body
    ///
    /// Error bodies of the form `{"error": "..."}` are unwrapped into the
    /// error message.
    async fn handle_response<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ClientError::api_error(
                status.as_u16(),
                error_message(&error_text),
            ));
        }

        response
            .json()
            .await
            .map_err(|e| ClientError::ParseError(format!("Failed to parse JSON response: {}", e)))
    }
}

fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_string))
        .unwrap_or_else(|| body.to_string())
}
