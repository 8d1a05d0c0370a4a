#![allow(dead_code)]

use crm_core::{Fingerprint, IdentityProfile, IdentityStamp};
use crm_store::{FileIdentityStore, LocalIdentityStore, SqliteIdentityStore};

use chrono::{DateTime, Utc};
use tempfile::TempDir;

/// Store under test plus whatever keeps its backing storage alive.
pub struct TestStore {
    pub store: Box<dyn LocalIdentityStore>,
    _dir: Option<TempDir>,
}

pub async fn sqlite_store() -> TestStore {
    let store = SqliteIdentityStore::in_memory()
        .await
        .expect("Failed to create in-memory store");

    TestStore {
        store: Box::new(store),
        _dir: None,
    }
}

pub fn file_store() -> TestStore {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let store = FileIdentityStore::new(dir.path());

    TestStore {
        store: Box::new(store),
        _dir: Some(dir),
    }
}

pub fn create_test_profile(id: &str) -> IdentityProfile {
    IdentityProfile::builder(id)
        .name("Test User")
        .email("test@example.com")
        .custom("plan", "gold")
        .custom("visits", 3_i64)
        .custom("score", 4.5)
        .custom("vip", true)
        .build()
}

pub fn create_test_stamp(profile: &IdentityProfile, reference: &str) -> IdentityStamp {
    IdentityStamp {
        fingerprint: profile.fingerprint(),
        reference: reference.to_string(),
        // Whole seconds keep comparisons independent of storage precision
        synced_at: DateTime::from_timestamp(Utc::now().timestamp() - 5, 0)
            .expect("Timestamp in range"),
    }
}

pub fn other_fingerprint() -> Fingerprint {
    IdentityProfile::builder("someone-else").build().fingerprint()
}
