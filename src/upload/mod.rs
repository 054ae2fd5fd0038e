mod controller;
mod transport;
mod types;

pub use controller::UploadController;
pub use transport::HttpTransport;
pub use types::UploadPhase;
