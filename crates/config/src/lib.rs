// Configuration loading

pub mod settings;

pub use settings::{ConfigError, DatabaseSettings, LogSettings, Settings, DEFAULT_LOG_FILTER};
