mod config;
mod credentials_config;
mod error;
mod log_level;
mod logging_config;
mod retry_config;
mod storage_config;
mod sync_config;

pub use config::Config;
pub use credentials_config::CredentialsConfig;
pub use error::{ConfigError, ConfigErrorResult};
pub use log_level::LogLevel;
pub use logging_config::LoggingConfig;
pub use retry_config::RetryConfig;
pub use storage_config::StorageConfig;
pub use sync_config::SyncConfig;


const CONFIG_DIR_ENV: &str = "CRM_CONFIG_DIR";
const DEFAULT_CONFIG_DIR: &str = ".crm";
const CONFIG_FILENAME: &str = "config.toml";
const DEFAULT_STORAGE_FILENAME: &str = "identity.db";
const DEFAULT_LOG_LEVEL_STRING: &str = "info";
const DEFAULT_LOG_LEVEL: log::LevelFilter = log::LevelFilter::Info;
