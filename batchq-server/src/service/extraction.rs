//! Extraction Service client
//!
//! The processor's only outbound call: `POST <extraction-url>` with
//! `{files: group}`, expecting a 2xx `{results: [...]}` body.

use std::time::Duration;

use async_trait::async_trait;
use batchq_core::domain::file::{FileDescriptor, FileResult};
use batchq_core::dto::extraction::{ExtractRequest, ExtractResponse};
use reqwest::Client;

/// Errors of a single extraction attempt
///
/// Every variant counts as a transient group failure and is retried.
#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    #[error("extraction request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("extraction service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed extraction response: {0}")]
    Malformed(String),
}

/// Downstream extraction collaborator
#[async_trait]
pub trait ExtractionClient: Send + Sync {
    /// Extracts the content of one group of files
    async fn extract(&self, files: &[&FileDescriptor]) -> Result<Vec<FileResult>, ExtractionError>;
}

/// HTTP implementation of [`ExtractionClient`]
#[derive(Debug, Clone)]
pub struct HttpExtractionClient {
    client: Client,
    endpoint: String,
}

impl HttpExtractionClient {
    /// Creates a client for `endpoint` with a per-request timeout
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, ExtractionError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(endpoint, client))
    }

    pub fn with_client(endpoint: impl Into<String>, client: Client) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl ExtractionClient for HttpExtractionClient {
    async fn extract(&self, files: &[&FileDescriptor]) -> Result<Vec<FileResult>, ExtractionError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&ExtractRequest { files })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ExtractionError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.bytes().await?;
        let parsed: ExtractResponse = serde_json::from_slice(&body)
            .map_err(|e| ExtractionError::Malformed(e.to_string()))?;

        Ok(parsed.results)
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Json, Router, http::StatusCode, routing::post};

    fn file(name: &str) -> FileDescriptor {
        FileDescriptor {
            name: name.to_string(),
            content: format!("ref://{}", name),
            size: None,
            mime_type: None,
        }
    }

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}/extract", addr)
    }

    #[tokio::test]
    async fn test_extract_success() {
        let router = Router::new().route(
            "/extract",
            post(|Json(body): Json<serde_json::Value>| async move {
                let results: Vec<serde_json::Value> = body["files"]
                    .as_array()
                    .unwrap()
                    .iter()
                    .map(|f| serde_json::json!({ "name": f["name"], "text": "hello" }))
                    .collect();
                Json(serde_json::json!({ "results": results }))
            }),
        );
        let url = serve(router).await;
        let client = HttpExtractionClient::new(url, Duration::from_secs(5)).unwrap();

        let a = file("a.pdf");
        let b = file("b.pdf");
        let results = client.extract(&[&a, &b]).await.unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].name, "a.pdf");
        assert_eq!(results[1].text.as_deref(), Some("hello"));
    }

    #[tokio::test]
    async fn test_extract_non_success_status() {
        let router = Router::new().route(
            "/extract",
            post(|| async { (StatusCode::BAD_GATEWAY, "upstream down") }),
        );
        let url = serve(router).await;
        let client = HttpExtractionClient::new(url, Duration::from_secs(5)).unwrap();

        let a = file("a.pdf");
        let err = client.extract(&[&a]).await.unwrap_err();
        match err {
            ExtractionError::Status { status, body } => {
                assert_eq!(status, 502);
                assert_eq!(body, "upstream down");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_extract_malformed_body() {
        let router = Router::new().route(
            "/extract",
            post(|| async { Json(serde_json::json!({ "items": [] })) }),
        );
        let url = serve(router).await;
        let client = HttpExtractionClient::new(url, Duration::from_secs(5)).unwrap();

        let a = file("a.pdf");
        let err = client.extract(&[&a]).await.unwrap_err();
        assert!(matches!(err, ExtractionError::Malformed(_)));
    }
}
