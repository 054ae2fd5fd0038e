//! Conversation state for the active document.

use crate::api::{ApiClient, ApiError, AskResponse, ChatMessage, DocumentHistory, MessageKind};
use crate::history::SharedHistory;
use crate::utils::worker::spawn_async;
use chrono::{DateTime, NaiveDateTime, Utc};
use std::sync::mpsc::{channel, Receiver, Sender};

enum ChatEvent {
    Loaded {
        document_id: String,
        result: Result<Vec<ChatMessage>, ApiError>,
    },
    Answered {
        document_id: String,
        result: Result<AskResponse, ApiError>,
    },
}

pub struct ChatSession {
    api: ApiClient,
    history: Option<SharedHistory>,
    document_id: Option<String>,
    messages: Vec<ChatMessage>,
    loading: bool,
    asking: bool,
    error: Option<String>,
    sender: Sender<ChatEvent>,
    receiver: Receiver<ChatEvent>,
}

impl ChatSession {
    pub fn new(api: ApiClient) -> Self {
        let (sender, receiver) = channel();
        Self {
            api,
            history: None,
            document_id: None,
            messages: Vec::new(),
            loading: false,
            asking: false,
            error: None,
            sender,
            receiver,
        }
    }

    pub fn with_history(mut self, history: SharedHistory) -> Self {
        self.history = Some(history);
        self
    }

    pub fn document_id(&self) -> Option<&str> {
        self.document_id.as_deref()
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn is_asking(&self) -> bool {
        self.asking
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn clear_error(&mut self) {
        self.error = None;
    }

    /// Switches to `document_id` and starts loading its saved conversation.
    pub fn open(&mut self, document_id: &str) {
        if self.document_id.as_deref() == Some(document_id) {
            return;
        }
        tracing::info!(document_id, "opening conversation");

        self.document_id = Some(document_id.to_string());
        self.messages.clear();
        self.error = None;
        self.asking = false;
        self.loading = true;

        let api = self.api.clone();
        let sender = self.sender.clone();
        let document_id = document_id.to_string();
        spawn_async("chat-load", async move {
            let result = load_conversation(&api, &document_id).await;
            let _ = sender.send(ChatEvent::Loaded {
                document_id,
                result,
            });
        });
    }

    pub fn close(&mut self) {
        self.document_id = None;
        self.messages.clear();
        self.loading = false;
        self.asking = false;
        self.error = None;
    }

    /// Sends a question about the active document. Ignored for blank input,
    /// without a document, while the saved log loads or an answer is pending.
    pub fn ask(&mut self, question: &str) -> bool {
        let question = question.trim();
        let Some(document_id) = self.document_id.clone() else {
            return false;
        };
        if question.is_empty() || self.asking || self.loading {
            return false;
        }

        self.messages
            .push(ChatMessage::new(MessageKind::Question, question));
        self.asking = true;
        self.error = None;

        if let Some(history) = &self.history {
            if let Ok(mut history) = history.lock() {
                history.record_question(&document_id, question);
            }
        }
        self.save_log();

        let api = self.api.clone();
        let sender = self.sender.clone();
        let question = question.to_string();
        spawn_async("chat-ask", async move {
            let result = api.ask(&document_id, &question).await;
            let _ = sender.send(ChatEvent::Answered {
                document_id,
                result,
            });
        });
        true
    }

    /// Applies finished requests. Returns `true` when state changed.
    pub fn poll(&mut self) -> bool {
        let events: Vec<ChatEvent> = self.receiver.try_iter().collect();
        let mut changed = false;
        for event in events {
            changed |= self.apply(event);
        }
        changed
    }

    fn apply(&mut self, event: ChatEvent) -> bool {
        match event {
            ChatEvent::Loaded {
                document_id,
                result,
            } => {
                if !self.is_active(&document_id) {
                    tracing::debug!(document_id, "dropping stale conversation load");
                    return false;
                }
                self.loading = false;
                match result {
                    Ok(loaded) => self.messages = loaded,
                    Err(e) => {
                        tracing::warn!(document_id, error = %e, "could not load conversation");
                        self.error = Some(e.to_string());
                    }
                }
            }
            ChatEvent::Answered {
                document_id,
                result,
            } => {
                if !self.is_active(&document_id) {
                    tracing::debug!(document_id, "dropping answer for inactive document");
                    return false;
                }
                self.asking = false;
                match result {
                    Ok(response) => {
                        self.messages
                            .push(ChatMessage::new(MessageKind::Answer, response.answer));
                        self.save_log();
                    }
                    Err(e) => {
                        tracing::warn!(document_id, error = %e, "question failed");
                        self.error = Some(e.to_string());
                    }
                }
            }
        }
        true
    }

    fn is_active(&self, document_id: &str) -> bool {
        self.document_id.as_deref() == Some(document_id)
    }

    fn save_log(&self) {
        let Some(document_id) = self.document_id.clone() else {
            return;
        };
        if self.messages.is_empty() {
            return;
        }

        let api = self.api.clone();
        let messages = self.messages.clone();
        spawn_async("chat-save", async move {
            if let Err(e) = api.save_messages(&document_id, &messages).await {
                tracing::error!(document_id, error = %e, "error saving messages");
            }
        });
    }
}

/// Saved chat log of a document. Documents that were only ever questioned
/// through `/ask` have no log yet; their recorded questions stand in for it.
async fn load_conversation(api: &ApiClient, document_id: &str) -> Result<Vec<ChatMessage>, ApiError> {
    let messages = api.messages(document_id).await?;
    if !messages.is_empty() {
        return Ok(messages);
    }

    match api.document_history(document_id).await {
        Ok(history) => Ok(messages_from_history(&history)),
        Err(e) => {
            tracing::debug!(document_id, error = %e, "no question history either");
            Ok(Vec::new())
        }
    }
}

fn messages_from_history(history: &DocumentHistory) -> Vec<ChatMessage> {
    // Newest first on the wire.
    history
        .questions
        .iter()
        .rev()
        .flat_map(|record| {
            let timestamp = parse_timestamp(&record.timestamp);
            [
                ChatMessage {
                    id: format!("{}-question", record.id),
                    kind: MessageKind::Question,
                    content: record.question.clone(),
                    timestamp,
                },
                ChatMessage {
                    id: format!("{}-answer", record.id),
                    kind: MessageKind::Answer,
                    content: record.answer.clone(),
                    timestamp,
                },
            ]
        })
        .collect()
}

fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f").map(|t| t.and_utc()))
        .unwrap_or_else(|_| Utc::now())
}
