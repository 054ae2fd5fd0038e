use super::PdfQaApp;
use crate::api::MessageKind;
use crate::upload::UploadPhase;
use eframe::egui::{self, Color32, RichText};
use rfd::FileDialog;

const ACCENT: Color32 = Color32::from_rgb(161, 89, 225);
const SUCCESS: Color32 = Color32::from_rgb(0, 180, 0);
const FAILURE: Color32 = Color32::from_rgb(220, 50, 50);
const MUTED: Color32 = Color32::from_rgb(150, 150, 150);

impl PdfQaApp {
    pub fn render(&mut self, ctx: &egui::Context) {
        egui::SidePanel::left("history_panel")
            .resizable(true)
            .default_width(240.0)
            .show(ctx, |ui| self.render_history(ui));

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.add_space(10.0);
            ui.vertical_centered(|ui| {
                ui.heading("PDF Q&A");
                ui.label(
                    RichText::new("Upload a PDF and ask questions about it")
                        .color(ui.visuals().text_color().gamma_multiply(0.7)),
                );
            });
            ui.add_space(10.0);

            self.render_upload(ui);
            ui.add_space(10.0);
            ui.separator();
            self.render_chat(ui);
        });
    }

    fn render_history(&mut self, ui: &mut egui::Ui) {
        ui.add_space(8.0);
        ui.horizontal(|ui| {
            ui.heading("History");
            let refresh = ui.add_enabled(!self.history.loading, egui::Button::new("🔄"));
            if refresh.on_hover_text("Refresh").clicked() {
                self.history.refresh(&self.api);
            }
            if self.history.loading {
                ui.spinner();
            }
        });
        ui.add_space(8.0);

        if let Some(error) = &self.history.error {
            ui.colored_label(FAILURE, error);
            ui.add_space(4.0);
        }

        if self.history.items.is_empty() {
            ui.colored_label(MUTED, "No documents uploaded yet");
            return;
        }

        egui::ScrollArea::vertical().show(ui, |ui| {
            for item in &self.history.items {
                let active = self.chat.document_id() == Some(item.id.as_str());
                let label = format!(
                    "{}\nUploaded {}\n{} questions asked",
                    truncate(&item.filename, 30),
                    item.upload_date,
                    item.question_count
                );
                if ui.selectable_label(active, label).clicked() {
                    self.chat.open(&item.id);
                }
                ui.add_space(4.0);
            }
        });
    }

    fn render_upload(&mut self, ui: &mut egui::Ui) {
        ui.group(|ui| {
            ui.set_width(ui.available_width());
            let phase = self.upload.phase();

            ui.horizontal(|ui| {
                let can_select = phase != UploadPhase::Uploading;
                if ui
                    .add_enabled(can_select, egui::Button::new("📁 Select PDFs"))
                    .clicked()
                {
                    if let Some(paths) = FileDialog::new().add_filter("PDF", &["pdf"]).pick_files() {
                        self.upload.select_paths(&paths);
                    }
                }

                match phase {
                    UploadPhase::Selected => {
                        if ui.button("📤 Upload").clicked() {
                            self.upload.submit();
                        }
                    }
                    UploadPhase::Succeeded => {
                        if ui.button("🗑 Clear").clicked() {
                            self.upload.reset();
                        }
                    }
                    UploadPhase::Failed => {
                        if ui.button("🔄 Start over").clicked() {
                            self.upload.reset();
                        }
                    }
                    UploadPhase::Idle | UploadPhase::Uploading => {}
                }
            });

            for file in self.upload.selected() {
                ui.label(format!("📄 {} ({})", file.name, file.formatted_size()));
            }

            if phase == UploadPhase::Uploading {
                let progress = self.upload.progress().unwrap_or(0) as f32 / 100.0;
                ui.add(
                    egui::ProgressBar::new(progress)
                        .show_percentage()
                        .animate(false)
                        .fill(ACCENT),
                );
            }

            for result in self.upload.results() {
                ui.horizontal(|ui| match &result.error {
                    None => {
                        ui.label("✅");
                        ui.colored_label(SUCCESS, &result.filename);
                    }
                    Some(err) => {
                        ui.label("❌");
                        ui.colored_label(FAILURE, format!("{} - {}", result.filename, err));
                    }
                });
            }

            if let Some(error) = self.upload.error() {
                ui.colored_label(FAILURE, error.to_string());
            }
        });
    }

    fn render_chat(&mut self, ui: &mut egui::Ui) {
        let Some(document_id) = self.chat.document_id().map(str::to_string) else {
            ui.add_space(20.0);
            ui.vertical_centered(|ui| {
                ui.colored_label(MUTED, "Upload or pick a PDF to start asking questions");
            });
            return;
        };

        let title = self
            .history
            .filename_of(&document_id)
            .unwrap_or(document_id.as_str())
            .to_string();
        ui.horizontal(|ui| {
            ui.strong(title);
            if self.chat.is_loading() {
                ui.spinner();
            }
            if ui.small_button("✖ Close").clicked() {
                self.chat.close();
            }
        });

        let input_height = 40.0;
        egui::ScrollArea::vertical()
            .max_height((ui.available_height() - input_height).max(0.0))
            .stick_to_bottom(true)
            .show(ui, |ui| {
                for message in self.chat.messages() {
                    let (author, color) = match message.kind {
                        MessageKind::Question => ("You", ACCENT),
                        MessageKind::Answer => ("Assistant", SUCCESS),
                    };
                    ui.horizontal(|ui| {
                        ui.colored_label(color, author);
                        ui.colored_label(
                            MUTED,
                            message
                                .timestamp
                                .with_timezone(&chrono::Local)
                                .format("%Y-%m-%d %H:%M")
                                .to_string(),
                        );
                    });
                    ui.label(&message.content);
                    ui.add_space(6.0);
                }
                if self.chat.is_asking() {
                    ui.horizontal(|ui| {
                        ui.spinner();
                        ui.colored_label(MUTED, "Thinking...");
                    });
                }
            });

        if let Some(error) = self.chat.error().map(str::to_string) {
            ui.horizontal(|ui| {
                ui.colored_label(FAILURE, error);
                if ui.small_button("✖").clicked() {
                    self.chat.clear_error();
                }
            });
        }

        ui.horizontal(|ui| {
            let enabled = !self.chat.is_asking() && !self.chat.is_loading();
            let input = ui.add_enabled(
                enabled,
                egui::TextEdit::singleline(&mut self.question)
                    .hint_text("Ask a question about the PDF...")
                    .desired_width(ui.available_width() - 60.0),
            );
            let submitted = input.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter));
            let clicked = ui
                .add_enabled(
                    enabled && !self.question.trim().is_empty(),
                    egui::Button::new("Ask"),
                )
                .clicked();

            if (submitted || clicked) && self.chat.ask(&self.question) {
                self.question.clear();
            }
        });
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut short: String = text.chars().take(max_chars.saturating_sub(3)).collect();
    short.push_str("...");
    short
}

#[cfg(test)]
mod tests {
    use super::truncate;

    #[test]
    fn long_names_are_shortened() {
        assert_eq!(truncate("report.pdf", 30), "report.pdf");
        assert_eq!(truncate("a-very-long-annual-report-2024.pdf", 12), "a-very-lo...");
    }
}
