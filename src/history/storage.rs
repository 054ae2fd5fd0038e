use super::LocalHistoryEntry;
use std::fs;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("history file error: {0}")]
    Io(#[from] std::io::Error),

    #[error("history file is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// Backing store for the local history cache.
pub trait HistoryStorage: Send {
    fn load(&self) -> Result<Vec<LocalHistoryEntry>, StorageError>;
    fn save(&mut self, entries: &[LocalHistoryEntry]) -> Result<(), StorageError>;
}

/// Keeps the history as a JSON array on disk.
#[derive(Debug, Clone)]
pub struct JsonFileStorage {
    path: PathBuf,
}

impl JsonFileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl HistoryStorage for JsonFileStorage {
    fn load(&self) -> Result<Vec<LocalHistoryEntry>, StorageError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_str(&content)?)
    }

    fn save(&mut self, entries: &[LocalHistoryEntry]) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_string_pretty(entries)?)?;
        tracing::debug!(path = %self.path.display(), entries = entries.len(), "history saved");
        Ok(())
    }
}

#[cfg(test)]
#[derive(Debug, Default, Clone)]
pub struct MemoryStorage {
    entries: Vec<LocalHistoryEntry>,
}

#[cfg(test)]
impl HistoryStorage for MemoryStorage {
    fn load(&self) -> Result<Vec<LocalHistoryEntry>, StorageError> {
        Ok(self.entries.clone())
    }

    fn save(&mut self, entries: &[LocalHistoryEntry]) -> Result<(), StorageError> {
        self.entries = entries.to_vec();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn missing_file_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let storage = JsonFileStorage::new(dir.path().join("nope.json"));
        assert!(storage.load().unwrap().is_empty());
    }

    #[test]
    fn writes_camel_case_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("history.json");
        let mut storage = JsonFileStorage::new(&path);

        let entry = LocalHistoryEntry {
            document_id: "doc_1".to_string(),
            filename: "report.pdf".to_string(),
            timestamp: Utc::now(),
            questions: vec!["Who wrote it?".to_string()],
        };
        storage.save(&[entry.clone()]).unwrap();

        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"documentId\": \"doc_1\""));
        assert_eq!(storage.load().unwrap(), vec![entry]);
    }

    #[test]
    fn corrupt_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");
        fs::write(&path, "{not json").unwrap();

        assert!(matches!(
            JsonFileStorage::new(&path).load(),
            Err(StorageError::Corrupt(_))
        ));
    }
}
