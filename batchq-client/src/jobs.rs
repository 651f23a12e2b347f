//! Queue API endpoints

use batchq_core::domain::job::Job;
use batchq_core::domain::stats::QueueStats;
use batchq_core::dto::job::{CancelResponse, ProcessNextResponse, SubmitJob, SubmitResponse};
use uuid::Uuid;

use crate::QueueClient;
use crate::error::Result;

impl QueueClient {
    /// Check that the server is up
    pub async fn health(&self) -> Result<String> {
        let url = format!("{}/health", self.base_url);
        let response = self.client.get(&url).send().await?;

        self.handle_text_response(response).await
    }

    /// Submit a new job
    ///
    /// # Returns
    /// The job id with its queue position and estimated wait
    pub async fn submit(&self, req: SubmitJob) -> Result<SubmitResponse> {
        let url = format!("{}/submit", self.base_url);
        tracing::debug!("Submitting job with {} file(s)", req.files.len());
        let response = self.client.post(&url).json(&req).send().await?;

        self.handle_response(response).await
    }

    /// Get a job by ID
    pub async fn status(&self, job_id: Uuid) -> Result<Job> {
        let url = format!("{}/status", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("jobId", job_id.to_string())])
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Get queue counters and configured limits
    pub async fn queue_stats(&self) -> Result<QueueStats> {
        let url = format!("{}/queue-stats", self.base_url);
        let response = self.client.get(&url).send().await?;

        self.handle_response(response).await
    }

    /// Trigger an admission pass
    pub async fn process_next(&self) -> Result<ProcessNextResponse> {
        let url = format!("{}/process-next", self.base_url);
        let response = self.client.post(&url).send().await?;

        self.handle_response(response).await
    }

    /// Cancel a processing job
    pub async fn cancel(&self, job_id: Uuid) -> Result<CancelResponse> {
        let url = format!("{}/cancel", self.base_url);
        let response = self
            .client
            .post(&url)
            .query(&[("jobId", job_id.to_string())])
            .send()
            .await?;

        self.handle_response(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        Json, Router,
        extract::Query,
        http::StatusCode,
        routing::{get, post},
    };
    use std::collections::HashMap;

    async fn serve(router: Router) -> QueueClient {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        QueueClient::new(format!("http://{}", addr))
    }

    #[tokio::test]
    async fn test_submit_and_cancel() {
        let job_id = Uuid::new_v4();
        let router = Router::new()
            .route(
                "/submit",
                post(move |Json(body): Json<serde_json::Value>| async move {
                    assert_eq!(body["files"][0]["name"], "a.pdf");
                    assert_eq!(body["priority"], "urgent");
                    Json(serde_json::json!({
                        "jobId": job_id,
                        "position": 2,
                        "estimatedWait": 2
                    }))
                }),
            )
            .route(
                "/cancel",
                post(|Query(q): Query<HashMap<String, String>>| async move {
                    (
                        StatusCode::CONFLICT,
                        Json(serde_json::json!({
                            "error": format!("Job {} cannot be cancelled in status pending", q["jobId"])
                        })),
                    )
                }),
            );
        let client = serve(router).await;

        let req: SubmitJob = serde_json::from_value(serde_json::json!({
            "files": [{ "name": "a.pdf", "content": "ref://a" }],
            "priority": "urgent"
        }))
        .unwrap();
        let resp = client.submit(req).await.unwrap();
        assert_eq!(resp.job_id, job_id);
        assert_eq!(resp.position, 2);

        let err = client.cancel(job_id).await.unwrap_err();
        assert!(err.is_conflict());
        assert!(err.to_string().contains(&job_id.to_string()));
    }

    #[tokio::test]
    async fn test_status_not_found_and_health() {
        let router = Router::new()
            .route("/health", get(|| async { "OK" }))
            .route(
                "/status",
                get(|| async {
                    (
                        StatusCode::NOT_FOUND,
                        Json(serde_json::json!({ "error": "Job not found" })),
                    )
                }),
            );
        let client = serve(router).await;

        assert_eq!(client.health().await.unwrap(), "OK");
        let err = client.status(Uuid::new_v4()).await.unwrap_err();
        assert!(err.is_not_found());
    }
}
