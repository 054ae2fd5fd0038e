mod state;
mod ui;

use crate::api::ApiClient;
use crate::chat::ChatSession;
use crate::config::Config;
use crate::history::{JsonFileStorage, LocalHistory, SharedHistory};
use crate::upload::{HttpTransport, UploadController};
use eframe::{egui, App};
pub use state::HistoryState;
use std::sync::mpsc::{channel, Receiver};
use std::sync::Arc;
use std::time::Duration;

pub struct PdfQaApp {
    api: ApiClient,
    upload: UploadController,
    chat: ChatSession,
    local_history: SharedHistory,
    history: HistoryState,
    uploaded_receiver: Receiver<(String, String)>,
    question: String,
}

impl PdfQaApp {
    pub fn new(_cc: &eframe::CreationContext<'_>, config: Config) -> Self {
        tracing::info!(api_url = %config.api_url, "initializing PDF Q&A client");
        Self::from_config(config)
    }

    pub fn from_config(config: Config) -> Self {
        let api = ApiClient::new(&config.api_url);
        let local_history = LocalHistory::new(
            Box::new(JsonFileStorage::new(config.history_file())),
            config.max_history_items,
        )
        .shared();

        let (uploaded_sender, uploaded_receiver) = channel();
        let transport = Arc::new(HttpTransport::new(&config.api_url, config.upload_field));
        let upload = UploadController::new(transport, config.max_file_size)
            .with_history(local_history.clone())
            .on_success(move |document_id, filename| {
                let _ = uploaded_sender.send((document_id.to_string(), filename.to_string()));
            });
        let chat = ChatSession::new(api.clone()).with_history(local_history.clone());

        let mut history = HistoryState::default();
        history.refresh(&api);

        Self {
            api,
            upload,
            chat,
            local_history,
            history,
            uploaded_receiver,
            question: String::new(),
        }
    }

    /// Pulls in background results. Returns `true` when anything changed.
    pub fn update_state(&mut self) -> bool {
        let mut changed = self.upload.poll();

        let uploaded: Vec<(String, String)> = self.uploaded_receiver.try_iter().collect();
        if let Some((document_id, filename)) = uploaded.first() {
            tracing::info!(document_id = %document_id, filename = %filename, "document ready");
            self.chat.open(document_id);
            self.history.refresh(&self.api);
            changed = true;
        }

        changed |= self.history.poll(&self.api, &self.local_history);
        changed |= self.chat.poll();
        changed
    }

    fn is_busy(&self) -> bool {
        self.upload.is_uploading()
            || self.history.loading
            || self.chat.is_loading()
            || self.chat.is_asking()
    }
}

impl App for PdfQaApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        if self.update_state() {
            ctx.request_repaint();
        }
        self.render(ctx);
        if self.is_busy() {
            ctx.request_repaint_after(Duration::from_millis(100));
        }
    }
}
