use crate::{Result as SyncResult, SyncError};

use crm_config::LoggingConfig;

use std::time::SystemTime;

use fern::Dispatch;
use fern::colors::{Color, ColoredLevelConfig};
use log::info;

/// Installs the global logger.
///
/// Logs go to `config.file` when set (plain, appended), otherwise to stdout,
/// colored when `config.colored` is on. Can only succeed once per process.
#[track_caller]
pub fn initialize(config: &LoggingConfig) -> SyncResult<()> {
    let level = config.effective_level();
    let colored = config.colored && config.file.is_none();

    let colors = ColoredLevelConfig::new()
        .trace(Color::Magenta)
        .debug(Color::Blue)
        .info(Color::Green)
        .warn(Color::Yellow)
        .error(Color::Red);

    let dispatch = Dispatch::new()
        .level(level)
        .format(move |out, message, record| {
            let level = if colored {
                colors.color(record.level()).to_string()
            } else {
                record.level().to_string()
            };

            out.finish(format_args!(
                "[{date} - {level}] {message} [{file}:{line}]",
                date = humantime::format_rfc3339(SystemTime::now()),
                file = record.file().unwrap_or("unknown"),
                line = record.line().unwrap_or(0),
            ))
        });

    let dispatch = match &config.file {
        Some(path) => {
            let file = fern::log_file(path)
                .map_err(|e| SyncError::logger(format!("Failed to open log file {path}: {e}")))?;
            dispatch.chain(file)
        }
        None => dispatch.chain(std::io::stdout()),
    };

    dispatch
        .apply()
        .map_err(|e| SyncError::logger(format!("Failed to initialize logger: {e}")))?;

    match &config.file {
        Some(path) => info!("Logger initialized: level={level:?}, file={path}"),
        None => info!("Logger initialized: level={level:?}, stdout"),
    }

    Ok(())
}
