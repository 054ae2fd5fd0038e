use crate::api::{ApiClient, ApiError, DocumentInfo};
use crate::history::{merge_history, HistoryItem, SharedHistory};
use crate::utils::worker::spawn_async;
use derivative::Derivative;
use std::sync::mpsc::{channel, Receiver, TryRecvError};

type HistoryResult = Result<Vec<DocumentInfo>, ApiError>;

/// Sidebar listing of uploaded documents.
#[derive(Derivative, Default)]
#[derivative(Debug)]
pub struct HistoryState {
    pub items: Vec<HistoryItem>,
    pub loading: bool,
    pub error: Option<String>,
    refresh_queued: bool,
    #[derivative(Debug = "ignore")]
    receiver: Option<Receiver<HistoryResult>>,
}

impl HistoryState {
    /// Requests the document list. A request made while one is running is
    /// sent once the running one finishes.
    pub fn refresh(&mut self, api: &ApiClient) {
        if self.loading {
            self.refresh_queued = true;
            return;
        }
        self.loading = true;
        self.error = None;

        let (sender, receiver) = channel();
        self.receiver = Some(receiver);
        let api = api.clone();
        spawn_async("history-refresh", async move {
            let _ = sender.send(api.history().await);
        });
    }

    pub fn poll(&mut self, api: &ApiClient, local: &SharedHistory) -> bool {
        let Some(receiver) = &self.receiver else {
            return false;
        };
        let result = match receiver.try_recv() {
            Ok(result) => result,
            Err(TryRecvError::Empty) => return false,
            Err(TryRecvError::Disconnected) => {
                Err(ApiError::Network("history request was dropped".to_string()))
            }
        };
        self.receiver = None;
        self.loading = false;

        match result {
            Ok(documents) => {
                let entries = match local.lock() {
                    Ok(history) => history.entries(),
                    Err(_) => Vec::new(),
                };
                self.items = merge_history(&documents, &entries);
                tracing::info!(documents = self.items.len(), "history refreshed");
            }
            Err(e) => {
                tracing::warn!(error = %e, "could not load history");
                self.error = Some(e.to_string());
            }
        }

        if std::mem::take(&mut self.refresh_queued) {
            self.refresh(api);
        }
        true
    }

    pub fn filename_of(&self, document_id: &str) -> Option<&str> {
        self.items
            .iter()
            .find(|item| item.id == document_id)
            .map(|item| item.filename.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::LocalHistory;
    use chrono::Utc;

    fn doc(id: &str, filename: &str) -> DocumentInfo {
        DocumentInfo {
            id: id.to_string(),
            filename: filename.to_string(),
            upload_date: "2024-05-01T10:00:00".to_string(),
            file_path: None,
            question_count: None,
        }
    }

    fn offline_api() -> ApiClient {
        ApiClient::new("http://127.0.0.1:9")
    }

    #[test]
    fn poll_merges_server_documents_with_local_cache() {
        let api = offline_api();
        let local = LocalHistory::in_memory(10).shared();
        {
            let mut history = local.lock().unwrap();
            history.upsert("1", "report.pdf", Utc::now());
            history.record_question("1", "What changed?");
        }

        let (sender, receiver) = channel();
        let mut state = HistoryState {
            loading: true,
            receiver: Some(receiver),
            ..Default::default()
        };
        assert!(!state.poll(&api, &local));

        sender.send(Ok(vec![doc("1", "report.pdf"), doc("2", "notes.pdf")])).unwrap();
        assert!(state.poll(&api, &local));

        assert!(!state.loading);
        assert_eq!(state.items.len(), 2);
        assert_eq!(state.items[0].question_count, 1);
        assert_eq!(state.filename_of("2"), Some("notes.pdf"));
    }

    #[test]
    fn failed_refresh_keeps_previous_items() {
        let api = offline_api();
        let local = LocalHistory::in_memory(10).shared();
        let (sender, receiver) = channel();
        let mut state = HistoryState {
            items: vec![HistoryItem {
                id: "1".to_string(),
                filename: "kept.pdf".to_string(),
                upload_date: String::new(),
                question_count: 0,
            }],
            loading: true,
            receiver: Some(receiver),
            ..Default::default()
        };

        sender
            .send(Err(ApiError::Server {
                status: 500,
                message: "database locked".to_string(),
            }))
            .unwrap();
        assert!(state.poll(&api, &local));

        assert_eq!(state.items.len(), 1);
        assert!(state.error.as_deref().unwrap().contains("database locked"));
    }

    #[test]
    fn refresh_during_load_runs_after_it() {
        let api = offline_api();
        let local = LocalHistory::in_memory(10).shared();
        let (sender, receiver) = channel();
        let mut state = HistoryState {
            loading: true,
            receiver: Some(receiver),
            ..Default::default()
        };

        state.refresh(&api);
        sender.send(Ok(vec![doc("1", "report.pdf")])).unwrap();
        assert!(state.poll(&api, &local));

        assert_eq!(state.items.len(), 1);
        assert!(state.loading);
        assert!(!state.refresh_queued);
    }
}
