//! Local cache of uploaded documents.
//!
//! The cache only enriches what the backend reports through `GET /history`;
//! the server list stays authoritative.

mod storage;

use crate::api::DocumentInfo;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

pub use storage::{HistoryStorage, JsonFileStorage};
#[cfg(test)]
pub use storage::MemoryStorage;

pub type SharedHistory = Arc<Mutex<LocalHistory>>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalHistoryEntry {
    pub document_id: String,
    pub filename: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub questions: Vec<String>,
}

/// A row of the history sidebar.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryItem {
    pub id: String,
    pub filename: String,
    pub upload_date: String,
    pub question_count: usize,
}

pub struct LocalHistory {
    storage: Box<dyn HistoryStorage>,
    max_items: usize,
}

impl LocalHistory {
    pub fn new(storage: Box<dyn HistoryStorage>, max_items: usize) -> Self {
        Self {
            storage,
            max_items: max_items.max(1),
        }
    }

    #[cfg(test)]
    pub fn in_memory(max_items: usize) -> Self {
        Self::new(Box::new(MemoryStorage::default()), max_items)
    }

    pub fn shared(self) -> SharedHistory {
        Arc::new(Mutex::new(self))
    }

    /// Current entries; unreadable storage counts as empty.
    pub fn entries(&self) -> Vec<LocalHistoryEntry> {
        match self.storage.load() {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(error = %e, "ignoring unreadable history cache");
                Vec::new()
            }
        }
    }

    /// Records an upload. A known document only gets its timestamp refreshed.
    pub fn upsert(&mut self, document_id: &str, filename: &str, timestamp: DateTime<Utc>) {
        let mut entries = self.entries();

        match entries.iter_mut().find(|e| e.document_id == document_id) {
            Some(existing) => existing.timestamp = timestamp,
            None => entries.push(LocalHistoryEntry {
                document_id: document_id.to_string(),
                filename: filename.to_string(),
                timestamp,
                questions: Vec::new(),
            }),
        }

        while entries.len() > self.max_items {
            let oldest = entries
                .iter()
                .enumerate()
                .min_by_key(|(_, e)| e.timestamp)
                .map(|(idx, _)| idx);
            match oldest {
                Some(idx) => {
                    entries.remove(idx);
                }
                None => break,
            }
        }

        self.persist(&entries);
    }

    /// Appends a question to a known document. Unknown documents are ignored.
    pub fn record_question(&mut self, document_id: &str, question: &str) {
        let mut entries = self.entries();
        let Some(entry) = entries.iter_mut().find(|e| e.document_id == document_id) else {
            return;
        };
        entry.questions.push(question.to_string());
        self.persist(&entries);
    }

    fn persist(&mut self, entries: &[LocalHistoryEntry]) {
        if let Err(e) = self.storage.save(entries) {
            tracing::warn!(error = %e, "failed to write history cache");
        }
    }
}

/// Combines the server's document list with the local cache.
///
/// Server order and fields win. The local question log only fills in the
/// count when the server does not report one; local-only entries are dropped.
pub fn merge_history(server: &[DocumentInfo], local: &[LocalHistoryEntry]) -> Vec<HistoryItem> {
    server
        .iter()
        .map(|doc| {
            let local_count = local
                .iter()
                .find(|e| e.document_id == doc.id)
                .map(|e| e.questions.len())
                .unwrap_or(0);
            HistoryItem {
                id: doc.id.clone(),
                filename: doc.filename.clone(),
                upload_date: doc.upload_date.clone(),
                question_count: doc
                    .question_count
                    .map(|count| count as usize)
                    .unwrap_or(local_count),
            }
        })
        .collect()
}
