//! batchq HTTP Client
//!
//! A type-safe HTTP client for the batch queue API, used by the `batchq`
//! CLI and by any service that submits extraction work.
//!
//! # Example
//!
//! ```no_run
//! use batchq_client::QueueClient;
//! use batchq_core::domain::file::FileDescriptor;
//! use batchq_core::dto::job::SubmitJob;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = QueueClient::new("http://localhost:8080");
//!
//!     let submitted = client.submit(SubmitJob {
//!         files: vec![FileDescriptor {
//!             name: "answers.pdf".to_string(),
//!             content: "s3://exams/answers.pdf".to_string(),
//!             size: None,
//!             mime_type: Some("application/pdf".to_string()),
//!         }],
//!         priority: None,
//!         max_retries: None,
//!     }).await?;
//!
//!     println!("Submitted job {} at position {}", submitted.job_id, submitted.position);
//!     Ok(())
//! }
//! ```

pub mod error;
mod jobs;

// Re-export commonly used types
pub use error::{ClientError, Result};

use reqwest::Client;
use serde::de::DeserializeOwned;

/// HTTP client for the queue API
#[derive(Debug, Clone)]
pub struct QueueClient {
    /// Base URL of the queue server (e.g., "http://localhost:8080")
    base_url: String,
    /// HTTP client instance
    client: Client,
}

impl QueueClient {
    /// Create a new queue client
    ///
    /// # Example
    /// ```
    /// use batchq_client::QueueClient;
    ///
    /// let client = QueueClient::new("http://localhost:8080");
    /// ```
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, Client::new())
    }

    /// Create a new queue client with a custom HTTP client
    ///
    /// This allows you to configure timeouts, proxies, TLS settings, etc.
    pub fn with_client(base_url: impl Into<String>, client: Client) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    /// Get the base URL of the queue server
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // =============================================================================
    // Response Handlers
    // =============================================================================

    /// Handle an API response and deserialize JSON
    async fn handle_response<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ClientError::api_error(status.as_u16(), error_text));
        }

        response
            .json()
            .await
            .map_err(|e| ClientError::ParseError(format!("Failed to parse JSON response: {}", e)))
    }

    /// Handle an API response with a plain text body
    async fn handle_text_response(&self, response: reqwest::Response) -> Result<String> {
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(ClientError::api_error(status.as_u16(), text));
        }

        Ok(text)
    }
}
