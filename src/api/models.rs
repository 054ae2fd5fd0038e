use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Backend identifiers come back as integers or strings depending on the
/// endpoint; both are kept as strings.
#[derive(Deserialize)]
#[serde(untagged)]
enum IdRepr {
    Text(String),
    Number(i64),
}

impl From<IdRepr> for String {
    fn from(id: IdRepr) -> Self {
        match id {
            IdRepr::Text(text) => text,
            IdRepr::Number(number) => number.to_string(),
        }
    }
}

pub(crate) fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    IdRepr::deserialize(deserializer).map(String::from)
}

pub(crate) fn deserialize_optional_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<IdRepr>::deserialize(deserializer).map(|id| id.map(String::from))
}

/// One uploaded document as listed by `GET /history`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentInfo {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    pub filename: String,
    #[serde(default)]
    pub upload_date: String,
    #[serde(default)]
    pub file_path: Option<String>,
    #[serde(default)]
    pub question_count: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct QuestionRecord {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    pub question: String,
    pub answer: String,
    #[serde(default)]
    pub timestamp: String,
}

/// Response of `GET /history/{id}`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DocumentHistory {
    pub document: DocumentInfo,
    #[serde(default)]
    pub questions: Vec<QuestionRecord>,
}

#[derive(Debug, Serialize)]
pub(crate) struct AskRequest<'a> {
    pub document_id: &'a str,
    pub question: &'a str,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AskResponse {
    pub answer: String,
    #[serde(default, deserialize_with = "deserialize_optional_id")]
    pub document_id: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_id")]
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Question,
    Answer,
}

/// A single entry of a document's chat log, as persisted by
/// `POST /messages/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    pub fn new(kind: MessageKind, content: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            kind,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct SaveMessagesRequest<'a> {
    pub messages: &'a [ChatMessage],
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_entry_accepts_numeric_ids_and_missing_fields() {
        let docs: Vec<DocumentInfo> = serde_json::from_str(
            r#"[
                {"id": 7, "filename": "a.pdf", "uploadDate": "2024-05-01T10:00:00", "questionCount": 3},
                {"id": "doc_2", "filename": "b.pdf", "uploadDate": "2024-05-02", "filePath": "/srv/b.pdf"}
            ]"#,
        )
        .unwrap();

        assert_eq!(docs[0].id, "7");
        assert_eq!(docs[0].question_count, Some(3));
        assert_eq!(docs[1].id, "doc_2");
        assert_eq!(docs[1].file_path.as_deref(), Some("/srv/b.pdf"));
        assert_eq!(docs[1].question_count, None);
    }

    #[test]
    fn ask_response_tolerates_bare_answer() {
        let response: AskResponse = serde_json::from_str(r#"{"answer": "42"}"#).unwrap();
        assert_eq!(response.answer, "42");
        assert_eq!(response.document_id, None);

        let full: AskResponse =
            serde_json::from_str(r#"{"answer": "a", "documentId": 3, "sessionId": "s1"}"#).unwrap();
        assert_eq!(full.document_id.as_deref(), Some("3"));
        assert_eq!(full.session_id.as_deref(), Some("s1"));
    }

    #[test]
    fn chat_message_uses_type_field() {
        let message: ChatMessage = serde_json::from_str(
            r#"{"id": "1", "type": "answer", "content": "hi", "timestamp": "2024-01-01T00:00:00.000Z"}"#,
        )
        .unwrap();
        assert_eq!(message.kind, MessageKind::Answer);

        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["type"], "answer");
    }
}
