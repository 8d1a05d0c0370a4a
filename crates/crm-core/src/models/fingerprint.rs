use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Hex SHA-256 content fingerprint of the synced part of a profile.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Wraps an already computed hex digest (e.g. read back from storage).
    pub fn from_hex(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Incremental hasher. Every field is written as tag + length + bytes so that
/// adjacent fields can never alias each other.
pub(crate) struct FingerprintHasher {
    inner: Sha256,
}

impl FingerprintHasher {
    pub(crate) fn new() -> Self {
        Self {
            inner: Sha256::new(),
        }
    }

    pub(crate) fn field(&mut self, tag: u8, bytes: &[u8]) -> &mut Self {
        self.inner.update([tag]);
        self.inner.update((bytes.len() as u64).to_be_bytes());
        self.inner.update(bytes);
        self
    }

    pub(crate) fn optional(&mut self, tag: u8, value: Option<&str>) -> &mut Self {
        match value {
            Some(v) => self.field(tag, v.as_bytes()),
            None => self.field(tag ^ 0x80, &[]),
        }
    }

    pub(crate) fn finish(self) -> Fingerprint {
        Fingerprint(hex::encode(self.inner.finalize()))
    }
}
