use crate::Fingerprint;

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Record of the last profile the remote service accepted for a key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityStamp {
    pub fingerprint: Fingerprint,
    /// Server-assigned reference returned by the successful sync.
    pub reference: String,
    pub synced_at: DateTime<Utc>,
}

impl IdentityStamp {
    pub fn new(fingerprint: Fingerprint, reference: impl Into<String>) -> Self {
        Self {
            fingerprint,
            reference: reference.into(),
            synced_at: Utc::now(),
        }
    }

    /// True when `fingerprint` matches and the sync happened less than
    /// `cooldown` before `now`. A stamp from the future never counts as fresh.
    pub fn covers(&self, fingerprint: &Fingerprint, now: DateTime<Utc>, cooldown: Duration) -> bool {
        if &self.fingerprint != fingerprint {
            return false;
        }

        match (now - self.synced_at).to_std() {
            Ok(age) => age < cooldown,
            Err(_) => false,
        }
    }
}
