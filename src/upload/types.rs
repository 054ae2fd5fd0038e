use crate::api::deserialize_optional_id;
use crate::utils::file_size::FileSizeUtils;
use serde::Deserialize;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

pub const PDF_MIME: &str = "application/pdf";
pub const INVALID_TYPE_MESSAGE: &str = "only PDF files are allowed";

const PDF_MAGIC: &[u8] = b"%PDF-";

/// A file picked for upload.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectedFile {
    pub path: PathBuf,
    pub name: String,
    pub size: u64,
    pub mime_type: String,
}

impl SelectedFile {
    /// Inspects a file on disk. The type comes from the `%PDF-` header when
    /// present, otherwise from the extension.
    pub fn from_path(path: &Path) -> io::Result<Self> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "Invalid filename"))?;

        let mut file = File::open(path)?;
        let size = file.metadata()?.len();
        let mut header = [0u8; 5];
        let mut read = 0;
        while read < header.len() {
            match file.read(&mut header[read..])? {
                0 => break,
                n => read += n,
            }
        }

        let mime_type = if header[..read] == *PDF_MAGIC {
            PDF_MIME
        } else {
            mime_from_extension(path)
        };

        Ok(Self {
            path: path.to_path_buf(),
            name,
            size,
            mime_type: mime_type.to_string(),
        })
    }

    pub fn is_pdf(&self) -> bool {
        self.mime_type == PDF_MIME
    }

    pub fn formatted_size(&self) -> String {
        FileSizeUtils::format_size(self.size)
    }
}

fn mime_from_extension(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "pdf" => PDF_MIME,
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "txt" => "text/plain",
        "html" | "htm" => "text/html",
        "json" => "application/json",
        _ => "application/octet-stream",
    }
}

/// Outcome for one file of a finished batch.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadResult {
    pub filename: String,
    pub document_id: Option<String>,
    pub error: Option<String>,
}

impl UploadResult {
    pub fn is_success(&self) -> bool {
        self.error.is_none() && self.document_id.is_some()
    }
}

/// Per-file entry as the backend reports it.
#[derive(Debug, Deserialize)]
pub(crate) struct UploadResultWire {
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_id")]
    pub document_id: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Batch-level failure.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum UploadError {
    /// Rejected at selection time, before any request.
    #[error("{0}")]
    Validation(String),

    /// The local file could not be read while building the request.
    #[error("Could not read {name}: {reason}")]
    File { name: String, reason: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Upload failed: {message} (status {status})")]
    Server { status: u16, message: String },

    #[error("The server sent an unexpected response: {0}")]
    Protocol(String),
}

impl UploadError {
    pub fn is_validation(&self) -> bool {
        matches!(self, UploadError::Validation(_))
    }
}

/// Lifecycle state, derived from the controller's data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadPhase {
    Idle,
    Selected,
    Uploading,
    Succeeded,
    Failed,
}

/// Checks a candidate selection; the first offending file decides the message.
pub fn validate_selection(files: &[SelectedFile], max_file_size: u64) -> Result<(), UploadError> {
    if files.iter().any(|f| !f.is_pdf()) {
        return Err(UploadError::Validation(INVALID_TYPE_MESSAGE.to_string()));
    }
    if let Some(big) = files.iter().find(|f| f.size > max_file_size) {
        return Err(UploadError::Validation(format!(
            "{} is too large ({}); the limit is {}",
            big.name,
            big.formatted_size(),
            FileSizeUtils::format_size(max_file_size)
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn pdf(name: &str, size: u64) -> SelectedFile {
        SelectedFile {
            path: PathBuf::from(name),
            name: name.to_string(),
            size,
            mime_type: PDF_MIME.to_string(),
        }
    }

    #[test]
    fn detects_pdf_by_header_and_extension() {
        let dir = tempfile::tempdir().unwrap();

        let real = dir.path().join("scan.bin");
        fs::write(&real, b"%PDF-1.7\n...").unwrap();
        assert!(SelectedFile::from_path(&real).unwrap().is_pdf());

        let empty = dir.path().join("empty.PDF");
        fs::write(&empty, b"").unwrap();
        assert!(SelectedFile::from_path(&empty).unwrap().is_pdf());

        let image = dir.path().join("image.png");
        fs::write(&image, b"\x89PNG\r\n\x1a\n").unwrap();
        let image = SelectedFile::from_path(&image).unwrap();
        assert_eq!(image.mime_type, "image/png");
        assert_eq!(image.size, 8);
    }

    #[test]
    fn rejects_non_pdf_with_fixed_message() {
        let mut files = vec![pdf("a.pdf", 10)];
        files.push(SelectedFile {
            mime_type: "image/png".to_string(),
            ..pdf("image.png", 10)
        });

        let err = validate_selection(&files, 100).unwrap_err();
        assert_eq!(err.to_string(), "only PDF files are allowed");
        assert!(err.is_validation());
    }

    #[test]
    fn rejects_oversized_files() {
        let err = validate_selection(&[pdf("huge.pdf", 11 * 1024 * 1024)], 10 * 1024 * 1024)
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "huge.pdf is too large (11.00 MB); the limit is 10.00 MB"
        );
    }
}
