// autotube - unattended folder-watching video uploader
//
// This is the library crate containing the pipeline and its services.
// The binary crate (main.rs) wires configuration, logging and the scan loop.

pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod pipeline;
pub mod services;

// Re-export commonly used types for convenience
pub use config::ConfigManager;
pub use metrics::Metrics;
pub use models::{AppConfig, EffectiveConfig};
pub use pipeline::{FileOutcome, Pipeline};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
