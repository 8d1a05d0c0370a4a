use crm_core::{FailureKind, IdentityProfile, SyncFailure};

use std::panic::Location;

use async_trait::async_trait;
use error_location::ErrorLocation;
use thiserror::Error;

/// Network side of an identify: pushes one profile to the remote service.
///
/// Implementations own transport concerns (authentication, timeouts,
/// encoding). A timeout must surface as [`RemoteError::NetworkUnavailable`].
#[async_trait]
pub trait RemoteIdentityClient: Send + Sync {
    /// Sends `profile` for `key` and returns the server-assigned reference.
    async fn send(&self, key: &str, profile: &IdentityProfile) -> Result<String, RemoteError>;
}

#[derive(Error, Debug)]
pub enum RemoteError {
    #[error("Network unavailable: {message} {location}")]
    NetworkUnavailable {
        message: String,
        location: ErrorLocation,
    },

    #[error("Server responded with status {status}: {message} {location}")]
    Server {
        status: u16,
        message: String,
        location: ErrorLocation,
    },

    #[error("Unknown remote error: {message} {location}")]
    Unknown {
        message: String,
        location: ErrorLocation,
    },
}

impl RemoteError {
    #[track_caller]
    pub fn network_unavailable(message: impl Into<String>) -> Self {
        Self::NetworkUnavailable {
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn server(status: u16, message: impl Into<String>) -> Self {
        Self::Server {
            status,
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn unknown(message: impl Into<String>) -> Self {
        Self::Unknown {
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            Self::NetworkUnavailable { .. } => FailureKind::NetworkUnavailable,
            Self::Server { status, .. } => FailureKind::Server { status: *status },
            Self::Unknown { .. } => FailureKind::Unknown,
        }
    }

    /// Only connectivity failures are worth an immediate retry; a server
    /// rejection would fail the same way again.
    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }

    pub fn to_failure(&self) -> SyncFailure {
        let message = match self {
            Self::NetworkUnavailable { message, .. }
            | Self::Server { message, .. }
            | Self::Unknown { message, .. } => message.clone(),
        };

        SyncFailure::new(self.kind(), message)
    }
}
