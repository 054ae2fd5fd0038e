use super::types::{SelectedFile, PDF_MIME};
use crate::config::UploadField;
use reqwest::blocking::multipart::{Form, Part};
use std::fs::File;
use std::io::{self, Read};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Receives `(bytes_sent, bytes_total)` for the running batch.
pub type ProgressFn = Arc<dyn Fn(u64, u64) + Send + Sync>;

/// Terminal answer of the backend, before interpretation.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("{0}")]
    Network(String),

    #[error("could not read {name}: {source}")]
    File {
        name: String,
        #[source]
        source: io::Error,
    },
}

/// Sends one batch of files and reports byte-level progress.
///
/// Implementations block until the request finishes; callers run them off
/// the UI thread.
pub trait Transport: Send + Sync {
    fn upload(
        &self,
        files: &[SelectedFile],
        progress: ProgressFn,
    ) -> Result<TransportResponse, TransportError>;
}

/// `multipart/form-data` upload to `{api_url}/upload`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::blocking::Client,
    url: String,
    field: UploadField,
}

impl HttpTransport {
    pub fn new(api_url: &str, field: UploadField) -> Self {
        // No request timeout: a stalled upload stays in flight until the
        // connection itself fails.
        let client = reqwest::blocking::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(None::<Duration>)
            .build()
            .unwrap_or_else(|_| reqwest::blocking::Client::new());

        Self {
            client,
            url: format!("{}/upload", api_url.trim_end_matches('/')),
            field,
        }
    }

    fn build_form(
        &self,
        files: &[SelectedFile],
        progress: &ProgressFn,
    ) -> Result<(Form, u64), TransportError> {
        let mut opened = Vec::with_capacity(files.len());
        for selected in files {
            let file = File::open(&selected.path).map_err(|source| TransportError::File {
                name: selected.name.clone(),
                source,
            })?;
            let len = file
                .metadata()
                .map_err(|source| TransportError::File {
                    name: selected.name.clone(),
                    source,
                })?
                .len();
            opened.push((selected, file, len));
        }

        let total: u64 = opened.iter().map(|(_, _, len)| len).sum();
        let sent = Arc::new(AtomicU64::new(0));
        let mut form = Form::new();

        for (selected, file, len) in opened {
            let reader = ProgressReader {
                inner: file,
                sent: Arc::clone(&sent),
                total,
                progress: Arc::clone(progress),
            };
            let part = Part::reader_with_length(reader, len)
                .file_name(selected.name.clone())
                .mime_str(PDF_MIME)
                .map_err(|e| TransportError::Network(e.to_string()))?;
            form = form.part(self.field.as_str(), part);
        }

        Ok((form, total))
    }
}

impl Transport for HttpTransport {
    fn upload(
        &self,
        files: &[SelectedFile],
        progress: ProgressFn,
    ) -> Result<TransportResponse, TransportError> {
        let (form, total) = self.build_form(files, &progress)?;
        tracing::info!(url = %self.url, files = files.len(), bytes = total, "uploading batch");
        progress(0, total);

        let response = self
            .client
            .post(&self.url)
            .multipart(form)
            .send()
            .map_err(|e| TransportError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .map_err(|e| TransportError::Network(e.to_string()))?;
        tracing::debug!(status, %body, "upload response");

        Ok(TransportResponse { status, body })
    }
}

/// Counts bytes as the request body pulls them from disk.
struct ProgressReader<R> {
    inner: R,
    sent: Arc<AtomicU64>,
    total: u64,
    progress: ProgressFn,
}

impl<R: Read> Read for ProgressReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        if n > 0 {
            let sent = self.sent.fetch_add(n as u64, Ordering::Relaxed) + n as u64;
            (self.progress)(sent, self.total);
        }
        Ok(n)
    }
}
