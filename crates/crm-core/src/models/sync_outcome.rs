use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Classification of a failed identify, shared by every waiter of a sync.
///
/// Blank ids never reach a sync and surface as an error of the call instead.
/// Local store failures do not fail a sync; they set
/// [`SyncReport::local_cache_stale`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureKind {
    /// No connectivity or timeout; retried a bounded number of times.
    NetworkUnavailable,
    /// Non-2xx response; never retried automatically.
    Server { status: u16 },
    Unknown,
}

impl FailureKind {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::NetworkUnavailable)
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NetworkUnavailable => f.write_str("network unavailable"),
            Self::Server { status } => write!(f, "server error (status {status})"),
            Self::Unknown => f.write_str("unknown error"),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{kind}: {message}")]
pub struct SyncFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl SyncFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncOutcome {
    /// Carries the server-assigned reference of the user.
    Success(String),
    Failure(SyncFailure),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutcomeSource {
    /// A network call produced the outcome.
    Network,
    /// The stamp already covered the profile; no call was made.
    Cache,
}

/// What every caller of an identify receives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    pub outcome: SyncOutcome,
    pub source: OutcomeSource,
    /// Set when a local store write failed, so the cached profile or stamp
    /// may not reflect what the server holds.
    pub local_cache_stale: bool,
}

impl SyncReport {
    pub fn network(outcome: SyncOutcome) -> Self {
        Self {
            outcome,
            source: OutcomeSource::Network,
            local_cache_stale: false,
        }
    }

    pub fn cached(reference: impl Into<String>) -> Self {
        Self {
            outcome: SyncOutcome::Success(reference.into()),
            source: OutcomeSource::Cache,
            local_cache_stale: false,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, SyncOutcome::Success(_))
    }

    pub fn reference(&self) -> Option<&str> {
        match &self.outcome {
            SyncOutcome::Success(reference) => Some(reference),
            SyncOutcome::Failure(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&SyncFailure> {
        match &self.outcome {
            SyncOutcome::Success(_) => None,
            SyncOutcome::Failure(failure) => Some(failure),
        }
    }
}
