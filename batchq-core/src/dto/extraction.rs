//! Extraction service contract

use serde::{Deserialize, Serialize};

use crate::domain::file::{FileDescriptor, FileResult};

/// Body sent to the extraction endpoint for one group
#[derive(Debug, Clone, Serialize)]
pub struct ExtractRequest<'a> {
    pub files: &'a [&'a FileDescriptor],
}

/// Body returned by the extraction endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractResponse {
    pub results: Vec<FileResult>,
}
