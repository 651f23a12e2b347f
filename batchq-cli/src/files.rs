//! Building file descriptors from command-line arguments

use std::path::Path;

use anyhow::{Context, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use batchq_core::domain::file::FileDescriptor;

/// Reads a local file and inlines it as a base64 payload
pub fn read_file(path: &Path) -> Result<FileDescriptor> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;

    Ok(FileDescriptor {
        name: file_name(path.to_string_lossy().as_ref()),
        content: STANDARD.encode(&bytes),
        size: Some(bytes.len() as u64),
        mime_type: guess_mime(path.to_string_lossy().as_ref()),
    })
}

/// Wraps a remote content reference (URL or storage key) without reading it
pub fn reference(content: &str) -> FileDescriptor {
    FileDescriptor {
        name: file_name(content),
        content: content.to_string(),
        size: None,
        mime_type: guess_mime(content),
    }
}

fn file_name(reference: &str) -> String {
    let trimmed = reference.trim_end_matches('/');
    trimmed
        .rsplit(['/', '\\'])
        .next()
        .filter(|name| !name.is_empty())
        .unwrap_or(trimmed)
        .to_string()
}

fn guess_mime(reference: &str) -> Option<String> {
    let extension = reference.rsplit_once('.')?.1.to_ascii_lowercase();
    let mime = match extension.as_str() {
        "pdf" => "application/pdf",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "txt" => "text/plain",
        "csv" => "text/csv",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        _ => return None,
    };
    Some(mime.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_file_inlines_base64() {
        let path = std::env::temp_dir().join(format!("batchq-{}.txt", uuid::Uuid::new_v4()));
        std::fs::write(&path, b"hello").unwrap();

        let file = read_file(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert!(file.name.starts_with("batchq-"));
        assert_eq!(STANDARD.decode(&file.content).unwrap(), b"hello");
        assert_eq!(file.size, Some(5));
        assert_eq!(file.mime_type.as_deref(), Some("text/plain"));
    }

    #[test]
    fn test_read_missing_file_fails() {
        let err = read_file(Path::new("/nonexistent/batchq/answers.pdf")).unwrap_err();
        assert!(err.to_string().contains("answers.pdf"));
    }

    #[test]
    fn test_reference() {
        let file = reference("https://storage.example.com/exams/Answers.PDF");
        assert_eq!(file.name, "Answers.PDF");
        assert_eq!(file.content, "https://storage.example.com/exams/Answers.PDF");
        assert_eq!(file.size, None);
        assert_eq!(file.mime_type.as_deref(), Some("application/pdf"));

        let file = reference("opaque-key");
        assert_eq!(file.name, "opaque-key");
        assert_eq!(file.mime_type, None);
    }
}
