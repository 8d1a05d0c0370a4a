use crate::{ConfigError, ConfigErrorResult};

use std::fmt;

use serde::Deserialize;
use sha1::{Digest, Sha1};

/// Platform credentials handed to the remote identity client.
#[derive(Clone, Default, Deserialize)]
#[serde(default)]
pub struct CredentialsConfig {
    pub api_key: String,
    pub api_secret: String,
}

impl CredentialsConfig {
    pub fn validate(&self) -> ConfigErrorResult<()> {
        if self.api_key.trim().is_empty() {
            return Err(ConfigError::credentials(
                "credentials.api_key is required and cannot be empty",
            ));
        }

        if self.api_secret.trim().is_empty() {
            return Err(ConfigError::credentials(
                "credentials.api_secret is required and cannot be empty",
            ));
        }

        Ok(())
    }

    /// Request signature derived from the secret (hex SHA-1).
    pub fn signature(&self) -> String {
        hex::encode(Sha1::digest(self.api_secret.as_bytes()))
    }
}

// Keeps the secret out of `{:?}` output
impl fmt::Debug for CredentialsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialsConfig")
            .field("api_key", &self.api_key)
            .field("api_secret", &"<redacted>")
            .finish()
    }
}
