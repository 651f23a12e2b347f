//! File domain types

use serde::{Deserialize, Serialize};

/// A file submitted as part of a job
///
/// `content` is an opaque reference understood by the extraction service
/// (a URL, a storage key or an inline base64 payload).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileDescriptor {
    pub name: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

impl FileDescriptor {
    /// Estimated payload size in bytes, used for grouping
    ///
    /// Falls back to the length of the content reference when the
    /// submitter did not declare a size.
    pub fn estimated_size(&self) -> u64 {
        self.size.unwrap_or(self.content.len() as u64)
    }
}

/// Extraction outcome for a single file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileResult {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimated_size_prefers_declared_size() {
        let file = FileDescriptor {
            name: "a.pdf".to_string(),
            content: "s3://bucket/a.pdf".to_string(),
            size: Some(4096),
            mime_type: None,
        };
        assert_eq!(file.estimated_size(), 4096);
    }

    #[test]
    fn test_estimated_size_falls_back_to_content_length() {
        let file = FileDescriptor {
            name: "a.txt".to_string(),
            content: "aGVsbG8=".to_string(),
            size: None,
            mime_type: None,
        };
        assert_eq!(file.estimated_size(), 8);
    }

    #[test]
    fn test_file_result_metadata_defaults() {
        let result: FileResult = serde_json::from_str(r#"{"name":"a.pdf","text":"hi"}"#).unwrap();
        assert_eq!(result.text.as_deref(), Some("hi"));
        assert!(result.metadata.is_null());
    }
}
