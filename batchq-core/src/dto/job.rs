//! Job DTOs

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::file::FileDescriptor;
use crate::domain::job::Priority;

/// Request to submit a new batch job
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitJob {
    #[serde(default)]
    pub files: Vec<FileDescriptor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,
}

/// Response to a job submission
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
    pub job_id: Uuid,
    /// 1-based place in admission order, 0 once admitted
    pub position: u64,
    /// Estimated seconds until admission
    pub estimated_wait: u64,
}

/// Response to a manual admission pass
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessNextResponse {
    pub admitted: Vec<Uuid>,
    pub message: String,
}

/// Response to a cancellation request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelResponse {
    pub job_id: Uuid,
    pub cancelled: bool,
}

/// `jobId` query parameter used by status and cancel endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobIdQuery {
    pub job_id: Uuid,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_submit_job_optional_fields() {
        let req: SubmitJob =
            serde_json::from_str(r#"{"files":[{"name":"a.pdf","content":"ref"}]}"#).unwrap();
        assert_eq!(req.files.len(), 1);
        assert!(req.priority.is_none());
        assert!(req.max_retries.is_none());

        let req: SubmitJob =
            serde_json::from_str(r#"{"files":[],"priority":"urgent","maxRetries":2}"#).unwrap();
        assert_eq!(req.priority, Some(Priority::Urgent));
        assert_eq!(req.max_retries, Some(2));
    }

    #[test]
    fn test_submit_response_camel_case() {
        let response = SubmitResponse {
            job_id: Uuid::nil(),
            position: 2,
            estimated_wait: 30,
        };
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["position"], 2);
        assert_eq!(value["estimatedWait"], 30);
        assert!(value.get("jobId").is_some());
    }
}
