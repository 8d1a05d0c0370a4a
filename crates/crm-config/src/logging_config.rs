use crate::{DEFAULT_LOG_LEVEL, LogLevel};

use log::LevelFilter;
use serde::Deserialize;

pub const DEFAULT_COLORED: bool = true;
pub const DEFAULT_DEBUG: bool = false;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: LogLevel,
    pub colored: bool,
    /// Append to this file instead of stdout.
    pub file: Option<String>,
    /// SDK debug mode: raises the level to at least Debug.
    pub debug: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel(DEFAULT_LOG_LEVEL),
            colored: DEFAULT_COLORED,
            file: None,
            debug: DEFAULT_DEBUG,
        }
    }
}

impl LoggingConfig {
    pub fn effective_level(&self) -> LevelFilter {
        if self.debug {
            self.level.0.max(LevelFilter::Debug)
        } else {
            self.level.0
        }
    }
}
