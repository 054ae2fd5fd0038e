//! HTTP client for the question-answering backend.

mod client;
mod models;

pub use client::ApiClient;
pub use models::{AskResponse, ChatMessage, DocumentHistory, DocumentInfo, MessageKind};
pub(crate) use models::deserialize_optional_id;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ApiError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error: {message} (status {status})")]
    Server { status: u16, message: String },

    #[error("Could not understand the server's response: {0}")]
    Protocol(String),
}

pub type Result<T> = std::result::Result<T, ApiError>;

/// Extracts a readable message from an error response body.
///
/// FastAPI-style bodies carry the message under `detail`; anything else is
/// returned as raw text.
pub(crate) fn error_detail(body: &str) -> String {
    match serde_json::from_str::<serde_json::Value>(body) {
        Ok(serde_json::Value::Object(map)) => match map.get("detail") {
            Some(serde_json::Value::String(detail)) => detail.clone(),
            Some(serde_json::Value::Null) | None => body.to_string(),
            Some(other) => other.to_string(),
        },
        _ => body.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::error_detail;

    #[test]
    fn detail_field_is_preferred() {
        assert_eq!(
            error_detail(r#"{"detail": "Document not found"}"#),
            "Document not found"
        );
    }

    #[test]
    fn raw_text_when_not_structured() {
        assert_eq!(error_detail("Internal Server Error"), "Internal Server Error");
        assert_eq!(error_detail(r#"{"error": "x"}"#), r#"{"error": "x"}"#);
    }

    #[test]
    fn non_string_detail_is_rendered() {
        assert_eq!(error_detail(r#"{"detail": [1, 2]}"#), "[1,2]");
    }
}
