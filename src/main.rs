mod api;
mod app;
mod chat;
mod config;
mod history;
mod upload;
mod utils;

use app::PdfQaApp;
use config::Config;
use eframe::CreationContext;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), eframe::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting PDF Q&A client");

    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!(error = %e, "failed to load config, using defaults");
            Config::default().with_api_url_override(std::env::var(config::API_URL_ENV).ok())
        }
    };

    let options = eframe::NativeOptions {
        viewport: eframe::egui::ViewportBuilder::default()
            .with_inner_size([960.0, 680.0])
            .with_min_inner_size([640.0, 480.0]),
        ..Default::default()
    };

    eframe::run_native(
        "PDF Q&A",
        options,
        Box::new(move |cc: &CreationContext| Box::new(PdfQaApp::new(cc, config))),
    )
}
