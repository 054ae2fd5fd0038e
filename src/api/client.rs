use super::models::{AskRequest, SaveMessagesRequest};
use super::{
    error_detail, ApiError, AskResponse, ChatMessage, DocumentHistory, DocumentInfo, Result,
};
use reqwest::RequestBuilder;
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Client for the non-upload endpoints of the backend.
#[derive(Clone, Debug)]
pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        // Requests run on short-lived runtimes, so pooled connections would
        // outlive the runtime that owns them.
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .pool_max_idle_per_host(0)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Lists every uploaded document.
    pub async fn history(&self) -> Result<Vec<DocumentInfo>> {
        let url = self.url("/history");
        tracing::info!("GET {}", url);
        self.send_json(self.client.get(&url), &url).await
    }

    /// Fetches a document together with its recorded questions.
    pub async fn document_history(&self, document_id: &str) -> Result<DocumentHistory> {
        let url = self.url(&format!("/history/{}", document_id));
        tracing::info!("GET {}", url);
        self.send_json(self.client.get(&url), &url).await
    }

    pub async fn ask(&self, document_id: &str, question: &str) -> Result<AskResponse> {
        let url = self.url("/ask");
        tracing::info!("POST {}", url);
        let request = self.client.post(&url).json(&AskRequest {
            document_id,
            question,
        });
        self.send_json(request, &url).await
    }

    /// Loads the saved chat log of a document. Documents without a log yield
    /// an empty list.
    pub async fn messages(&self, document_id: &str) -> Result<Vec<ChatMessage>> {
        let url = self.url(&format!("/messages/{}", document_id));
        tracing::info!("GET {}", url);
        self.send_json(self.client.get(&url), &url).await
    }

    /// Replaces the saved chat log of a document.
    pub async fn save_messages(&self, document_id: &str, messages: &[ChatMessage]) -> Result<()> {
        let url = self.url(&format!("/messages/{}", document_id));
        tracing::info!("POST {} ({} messages)", url, messages.len());
        let request = self
            .client
            .post(&url)
            .json(&SaveMessagesRequest { messages });
        let _: serde_json::Value = self.send_json(request, &url).await?;
        Ok(())
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder, url: &str) -> Result<T> {
        let response = request
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;
        tracing::debug!(%url, status = status.as_u16(), %body, "response received");

        if !status.is_success() {
            let message = error_detail(&body);
            tracing::warn!(%url, status = status.as_u16(), %message, "request failed");
            return Err(ApiError::Server {
                status: status.as_u16(),
                message,
            });
        }

        serde_json::from_str(&body).map_err(|e| {
            tracing::warn!(%url, error = %e, "unexpected response body");
            ApiError::Protocol(e.to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::MessageKind;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn history_lists_documents() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/history"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"id": 1, "filename": "report.pdf", "uploadDate": "2024-05-01T10:00:00", "questionCount": 2}
            ])))
            .mount(&server)
            .await;

        let client = ApiClient::new(format!("{}/", server.uri()));
        let docs = client.history().await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].id, "1");
        assert_eq!(docs[0].filename, "report.pdf");
    }

    #[tokio::test]
    async fn server_error_surfaces_detail() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/history/99"))
            .respond_with(
                ResponseTemplate::new(404)
                    .set_body_json(serde_json::json!({"detail": "Document not found"})),
            )
            .mount(&server)
            .await;

        let client = ApiClient::new(server.uri());
        let err = client.document_history("99").await.unwrap_err();
        assert_eq!(
            err,
            ApiError::Server {
                status: 404,
                message: "Document not found".to_string()
            }
        );
    }

    #[tokio::test]
    async fn non_json_success_is_protocol_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/history"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let client = ApiClient::new(server.uri());
        assert!(matches!(
            client.history().await,
            Err(ApiError::Protocol(_))
        ));
    }

    #[tokio::test]
    async fn ask_posts_document_and_question() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/ask"))
            .and(body_json(serde_json::json!({
                "document_id": "doc_1",
                "question": "What is the total?"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "answer": "The total is 12.",
                "documentId": "doc_1",
                "sessionId": "s-1"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = ApiClient::new(server.uri());
        let response = client.ask("doc_1", "What is the total?").await.unwrap();
        assert_eq!(response.answer, "The total is 12.");
        assert_eq!(response.session_id.as_deref(), Some("s-1"));
    }

    #[tokio::test]
    async fn messages_round_trip_through_backend() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/messages/doc_1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"id": "1", "type": "question", "content": "hi", "timestamp": "2024-01-01T00:00:00Z"}
            ])))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/messages/doc_1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"status": "success"})))
            .expect(1)
            .mount(&server)
            .await;

        let client = ApiClient::new(server.uri());
        let messages = client.messages("doc_1").await.unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].kind, MessageKind::Question);

        client.save_messages("doc_1", &messages).await.unwrap();
    }

    #[tokio::test]
    async fn unreachable_server_is_network_error() {
        let client = ApiClient::new("http://127.0.0.1:9");
        assert!(matches!(client.history().await, Err(ApiError::Network(_))));
    }
}
