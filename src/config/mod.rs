//! Configuration management

mod settings;

pub use settings::{AppConfig, ScreenConfig, DEFAULT_SHARE_DIR};
