use super::transport::{ProgressFn, Transport, TransportError, TransportResponse};
use super::types::{
    validate_selection, SelectedFile, UploadError, UploadPhase, UploadResult, UploadResultWire,
};
use crate::api::error_detail;
use crate::history::SharedHistory;
use chrono::Utc;
use derivative::Derivative;
use std::path::PathBuf;
use std::sync::mpsc::{channel, Receiver, TryRecvError};
use std::sync::Arc;

/// Called with `(document_id, filename)` for every stored document.
pub type SuccessCallback = Box<dyn FnMut(&str, &str) + Send>;

#[derive(Debug)]
pub(crate) enum UploadEvent {
    Progress { sent: u64, total: u64 },
    Finished(Result<Vec<UploadResult>, UploadError>),
}

/// Owns the selection, progress, results and error of one upload widget.
///
/// All mutation happens on the caller's thread; the transfer itself runs on a
/// worker thread whose events are applied by [`UploadController::poll`].
#[derive(Derivative)]
#[derivative(Debug)]
pub struct UploadController {
    #[derivative(Debug = "ignore")]
    transport: Arc<dyn Transport>,
    #[derivative(Debug = "ignore")]
    history: Option<SharedHistory>,
    #[derivative(Debug = "ignore")]
    on_success: Option<SuccessCallback>,
    max_file_size: u64,

    selected: Vec<SelectedFile>,
    progress: Option<u8>,
    results: Vec<UploadResult>,
    error: Option<UploadError>,
    #[derivative(Debug = "ignore")]
    in_flight: Option<Receiver<UploadEvent>>,
}

impl UploadController {
    pub fn new(transport: Arc<dyn Transport>, max_file_size: u64) -> Self {
        Self {
            transport,
            history: None,
            on_success: None,
            max_file_size,
            selected: Vec::new(),
            progress: None,
            results: Vec::new(),
            error: None,
            in_flight: None,
        }
    }

    pub fn with_history(mut self, history: SharedHistory) -> Self {
        self.history = Some(history);
        self
    }

    pub fn on_success(mut self, callback: impl FnMut(&str, &str) + Send + 'static) -> Self {
        self.on_success = Some(Box::new(callback));
        self
    }

    pub fn phase(&self) -> UploadPhase {
        if self.in_flight.is_some() {
            UploadPhase::Uploading
        } else if self.error.as_ref().is_some_and(|e| !e.is_validation()) {
            UploadPhase::Failed
        } else if !self.results.is_empty() {
            UploadPhase::Succeeded
        } else if !self.selected.is_empty() {
            UploadPhase::Selected
        } else {
            UploadPhase::Idle
        }
    }

    pub fn is_uploading(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn selected(&self) -> &[SelectedFile] {
        &self.selected
    }

    pub fn progress(&self) -> Option<u8> {
        self.progress
    }

    pub fn results(&self) -> &[UploadResult] {
        &self.results
    }

    pub fn error(&self) -> Option<&UploadError> {
        self.error.as_ref()
    }

    /// Replaces the selection if every candidate is an acceptable PDF.
    /// A rejected selection keeps the previous one and records the reason.
    pub fn select(&mut self, files: Vec<SelectedFile>) {
        if self.is_uploading() {
            tracing::warn!("selection ignored while a batch is uploading");
            return;
        }
        if files.is_empty() {
            return;
        }

        if let Err(e) = validate_selection(&files, self.max_file_size) {
            self.reject(e);
            return;
        }

        tracing::info!(files = files.len(), "files selected");
        self.selected = files;
        self.progress = None;
        self.results.clear();
        self.error = None;
    }

    /// Inspects the given paths and selects them.
    pub fn select_paths(&mut self, paths: &[PathBuf]) {
        if self.is_uploading() {
            tracing::warn!("selection ignored while a batch is uploading");
            return;
        }
        let mut files = Vec::with_capacity(paths.len());
        for path in paths {
            match SelectedFile::from_path(path) {
                Ok(file) => files.push(file),
                Err(e) => {
                    let name = path.display().to_string();
                    tracing::warn!(file = %name, error = %e, "could not inspect file");
                    self.reject(UploadError::Validation(format!(
                        "Could not read {}: {}",
                        name, e
                    )));
                    return;
                }
            }
        }
        self.select(files);
    }

    /// Records a rejected selection. A failed batch keeps its error until
    /// `reset()`.
    fn reject(&mut self, error: UploadError) {
        if self.phase() == UploadPhase::Failed {
            tracing::warn!(error = %error, "selection rejected after a failed batch");
            return;
        }
        tracing::warn!(error = %error, "selection rejected");
        self.error = Some(error);
    }

    /// Starts uploading the current selection. Does nothing unless the
    /// controller is in the `Selected` phase.
    pub fn submit(&mut self) {
        if self.phase() != UploadPhase::Selected {
            tracing::debug!(phase = ?self.phase(), "submit ignored");
            return;
        }

        self.error = None;
        self.results.clear();
        self.progress = Some(0);

        let (sender, receiver) = channel();
        self.in_flight = Some(receiver);

        let files = self.selected.clone();
        let transport = Arc::clone(&self.transport);
        let progress_sender = sender.clone();
        let progress: ProgressFn = Arc::new(move |sent, total| {
            let _ = progress_sender.send(UploadEvent::Progress { sent, total });
        });

        tracing::info!(files = files.len(), "starting upload");
        let spawned = std::thread::Builder::new()
            .name("pdf-upload".to_string())
            .spawn(move || {
                let outcome = match transport.upload(&files, progress) {
                    Ok(response) => interpret_response(&response, &files),
                    Err(e) => Err(e.into()),
                };
                let _ = sender.send(UploadEvent::Finished(outcome));
            });

        if let Err(e) = spawned {
            self.in_flight = None;
            self.fail(UploadError::Network(format!("could not start upload: {}", e)));
        }
    }

    /// Applies whatever the worker has reported since the last call.
    /// Returns `true` when state changed.
    pub fn poll(&mut self) -> bool {
        let Some(receiver) = &self.in_flight else {
            return false;
        };

        let mut events = Vec::new();
        let mut disconnected = false;
        loop {
            match receiver.try_recv() {
                Ok(event) => events.push(event),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    disconnected = true;
                    break;
                }
            }
        }

        let changed = !events.is_empty() || disconnected;
        for event in events {
            self.apply(event);
        }

        if disconnected && self.in_flight.is_some() {
            self.in_flight = None;
            self.fail(UploadError::Network(
                "upload stopped without a response".to_string(),
            ));
        }
        changed
    }

    /// Clears everything. An in-flight batch is abandoned, not cancelled.
    pub fn reset(&mut self) {
        if self.in_flight.take().is_some() {
            tracing::info!("abandoning in-flight upload");
        }
        self.selected.clear();
        self.progress = None;
        self.results.clear();
        self.error = None;
    }

    pub(crate) fn apply(&mut self, event: UploadEvent) {
        if self.in_flight.is_none() {
            return;
        }
        match event {
            UploadEvent::Progress { sent, total } => {
                let percent = percent_of(sent, total);
                self.progress = Some(self.progress.map_or(percent, |p| p.max(percent)));
            }
            UploadEvent::Finished(Ok(results)) => {
                self.in_flight = None;
                self.complete(results);
            }
            UploadEvent::Finished(Err(e)) => {
                self.in_flight = None;
                self.fail(e);
            }
        }
    }

    fn complete(&mut self, results: Vec<UploadResult>) {
        let stored = results.iter().filter(|r| r.is_success()).count();
        tracing::info!(
            stored,
            failed = results.len() - stored,
            "upload finished"
        );

        let now = Utc::now();
        for result in &results {
            let Some(document_id) = result.document_id.as_deref() else {
                continue;
            };
            if result.error.is_some() {
                continue;
            }
            if let Some(callback) = self.on_success.as_mut() {
                callback(document_id, &result.filename);
            }
            if let Some(history) = &self.history {
                match history.lock() {
                    Ok(mut history) => history.upsert(document_id, &result.filename, now),
                    Err(_) => tracing::warn!("history cache unavailable"),
                }
            }
        }

        self.progress = Some(100);
        self.selected.clear();
        self.results = results;
    }

    fn fail(&mut self, error: UploadError) {
        tracing::error!(error = %error, "upload failed");
        self.error = Some(error);
    }
}

fn percent_of(sent: u64, total: u64) -> u8 {
    if total == 0 {
        return 100;
    }
    let percent = (sent.min(total) as f64 * 100.0 / total as f64).round();
    percent.clamp(0.0, 100.0) as u8
}

impl From<TransportError> for UploadError {
    fn from(e: TransportError) -> Self {
        match e {
            TransportError::Network(message) => UploadError::Network(message),
            TransportError::File { name, source } => UploadError::File {
                name,
                reason: source.to_string(),
            },
        }
    }
}

/// Turns the backend's answer into per-file results.
///
/// Only a 200 carries results. The body is either a list with one entry per
/// submitted file or, from single-file backends, one object.
pub(crate) fn interpret_response(
    response: &TransportResponse,
    submitted: &[SelectedFile],
) -> Result<Vec<UploadResult>, UploadError> {
    if response.status != 200 {
        let message = if response.body.trim().is_empty() {
            "no response body".to_string()
        } else {
            error_detail(&response.body)
        };
        return Err(UploadError::Server {
            status: response.status,
            message,
        });
    }

    let value: serde_json::Value = serde_json::from_str(&response.body)
        .map_err(|e| UploadError::Protocol(e.to_string()))?;

    let entries: Vec<UploadResultWire> = match value {
        serde_json::Value::Array(_) => {
            serde_json::from_value(value).map_err(|e| UploadError::Protocol(e.to_string()))?
        }
        serde_json::Value::Object(_) => {
            vec![serde_json::from_value(value).map_err(|e| UploadError::Protocol(e.to_string()))?]
        }
        _ => {
            return Err(UploadError::Protocol(
                "expected a list of upload results".to_string(),
            ))
        }
    };

    if entries.len() != submitted.len() {
        return Err(UploadError::Protocol(format!(
            "expected {} results, got {}",
            submitted.len(),
            entries.len()
        )));
    }

    Ok(entries
        .into_iter()
        .zip(submitted)
        .map(|(entry, file)| {
            let error = match (&entry.document_id, entry.error) {
                (_, Some(error)) => Some(error),
                (None, None) => Some("no document id returned".to_string()),
                (Some(_), None) => None,
            };
            UploadResult {
                filename: entry.filename.unwrap_or_else(|| file.name.clone()),
                document_id: entry.document_id,
                error,
            }
        })
        .collect())
}
