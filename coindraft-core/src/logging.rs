//! Logging setup for the draft engine
//!
//! Thin wrapper around `env_logger` with a typed configuration.
//! Modules log through the standard `log` macros; nothing here touches
//! engine state.

use std::sync::Once;

use log::LevelFilter;
use serde::{Deserialize, Serialize};

static INIT: Once = Once::new();

/// Log severity levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

/// Configuration for the logging system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Default level for all modules.
    pub level: LogLevel,
    /// Whether to include timestamps in log lines.
    pub include_timestamps: bool,
    /// Whether to log to the console at all.
    pub console_logging: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            include_timestamps: true,
            console_logging: true,
        }
    }
}

/// Initialize logging. Safe to call more than once; only the first
/// call takes effect.
pub fn init(config: &LogConfig) {
    INIT.call_once(|| {
        let mut builder = env_logger::Builder::new();
        if config.console_logging {
            builder.filter_level(config.level.into());
        } else {
            builder.filter_level(LevelFilter::Off);
        }
        if !config.include_timestamps {
            builder.format_timestamp(None);
        }
        let _ = builder.try_init();
    });
}
