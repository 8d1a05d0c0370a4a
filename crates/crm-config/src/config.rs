use crate::{
    CONFIG_DIR_ENV, CONFIG_FILENAME, ConfigError, ConfigErrorResult, CredentialsConfig,
    DEFAULT_CONFIG_DIR, LogLevel, LoggingConfig, RetryConfig, StorageConfig, SyncConfig,
};

use std::path::{Path, PathBuf};

use log::info;
use serde::Deserialize;

/// SDK configuration handed to the identity manager at construction.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub credentials: CredentialsConfig,
    pub sync: SyncConfig,
    pub retry: RetryConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Load config for a host application.
    ///
    /// Loading order:
    /// 1. Check for CRM_CONFIG_DIR env var, else use ./.crm/
    /// 2. Auto-create config directory if it doesn't exist
    /// 3. Load config.toml if it exists, else use defaults
    /// 4. Apply CRM_* environment variable overrides
    ///
    /// Does NOT validate - call validate() after load().
    pub fn load() -> ConfigErrorResult<Self> {
        let config_dir = Self::config_dir()?;

        if !config_dir.exists() {
            std::fs::create_dir_all(&config_dir).map_err(|e| ConfigError::Io {
                path: config_dir.clone(),
                source: e,
            })?;
        }

        let config_path = config_dir.join(CONFIG_FILENAME);

        let mut config = if config_path.exists() {
            Self::load_toml(&config_path)?
        } else {
            Config::default()
        };

        config.apply_env_overrides();

        Ok(config)
    }

    fn load_toml(path: &Path) -> ConfigErrorResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&contents).map_err(|e| ConfigError::Toml {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Priority: CRM_CONFIG_DIR env var > ./.crm/ (relative to cwd)
    pub fn config_dir() -> ConfigErrorResult<PathBuf> {
        if let Ok(dir) = std::env::var(CONFIG_DIR_ENV) {
            return Ok(PathBuf::from(dir));
        }

        let cwd = std::env::current_dir()
            .map_err(|_| ConfigError::config("Cannot determine current working directory"))?;
        Ok(cwd.join(DEFAULT_CONFIG_DIR))
    }

    /// Validate all sections. Call after load() to catch errors at startup.
    pub fn validate(&self) -> ConfigErrorResult<()> {
        self.credentials.validate()?;
        self.sync.validate()?;
        self.retry.validate()?;
        self.storage.validate()?;

        Ok(())
    }

    /// Absolute path of the identity store.
    pub fn storage_path(&self) -> ConfigErrorResult<PathBuf> {
        let config_dir = Self::config_dir()?;
        Ok(config_dir.join(&self.storage.path))
    }

    /// Log configuration summary (never logs the secret).
    pub fn log_summary(&self) {
        info!("Configuration loaded:");
        info!(
            "  credentials: api_key={} secret={}",
            self.credentials.api_key,
            if self.credentials.api_secret.is_empty() {
                "missing"
            } else {
                "set"
            }
        );
        info!(
            "  sync: network={}, cooldown={}s",
            self.sync.network, self.sync.cooldown_secs
        );
        info!(
            "  retry: attempts={}, initial={}ms, max={}s, backoff={}x, jitter={}",
            self.retry.max_attempts,
            self.retry.initial_delay_ms,
            self.retry.max_delay_secs,
            self.retry.backoff_multiplier,
            self.retry.jitter
        );
        info!("  storage: {}", self.storage.path);
        info!(
            "  logging: {} (colored: {}, debug: {})",
            *self.logging.level, self.logging.colored, self.logging.debug
        );
    }

    fn apply_env_overrides(&mut self) {
        // Credentials
        Self::apply_env_string("CRM_API_KEY", &mut self.credentials.api_key);
        Self::apply_env_string("CRM_API_SECRET", &mut self.credentials.api_secret);

        // Sync
        Self::apply_env_parse("CRM_SYNC_COOLDOWN_SECS", &mut self.sync.cooldown_secs);
        Self::apply_env_string("CRM_SYNC_NETWORK", &mut self.sync.network);

        // Retry
        Self::apply_env_parse("CRM_RETRY_MAX_ATTEMPTS", &mut self.retry.max_attempts);
        Self::apply_env_parse(
            "CRM_RETRY_INITIAL_DELAY_MS",
            &mut self.retry.initial_delay_ms,
        );
        Self::apply_env_parse("CRM_RETRY_MAX_DELAY_SECS", &mut self.retry.max_delay_secs);
        Self::apply_env_parse(
            "CRM_RETRY_BACKOFF_MULTIPLIER",
            &mut self.retry.backoff_multiplier,
        );
        Self::apply_env_bool("CRM_RETRY_JITTER", &mut self.retry.jitter);

        // Storage
        Self::apply_env_string("CRM_STORAGE_PATH", &mut self.storage.path);

        // Logging
        if let Ok(val) = std::env::var("CRM_LOG_LEVEL") {
            self.logging.level = LogLevel::parse_lenient(&val);
        }
        Self::apply_env_bool("CRM_LOG_COLORED", &mut self.logging.colored);
        Self::apply_env_option_string("CRM_LOG_FILE", &mut self.logging.file);
        Self::apply_env_bool("CRM_DEBUG", &mut self.logging.debug);
    }

    /// Helper: Apply environment variable override for String values
    fn apply_env_string(var_name: &str, target: &mut String) {
        if let Ok(val) = std::env::var(var_name) {
            *target = val;
        }
    }

    /// Helper: Apply environment variable override for bool values (accepts "true"/"1")
    fn apply_env_bool(var_name: &str, target: &mut bool) {
        if let Ok(val) = std::env::var(var_name) {
            *target = val == "true" || val == "1";
        }
    }

    /// Helper: Apply environment variable override for parseable values
    fn apply_env_parse<T: std::str::FromStr>(var_name: &str, target: &mut T) {
        if let Ok(val) = std::env::var(var_name)
            && let Ok(parsed) = val.parse()
        {
            *target = parsed;
        }
    }

    /// Helper: Apply environment variable override for Option<String> values
    fn apply_env_option_string(var_name: &str, target: &mut Option<String>) {
        if let Ok(val) = std::env::var(var_name) {
            *target = Some(val);
        }
    }
}
