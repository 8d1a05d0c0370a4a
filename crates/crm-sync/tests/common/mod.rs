#![allow(dead_code)]

use crm_config::{Config, RetryConfig};
use crm_core::{IdentityProfile, IdentityStamp};
use crm_store::{LocalIdentityStore, StoreError};
use crm_sync::{
    IdentityManager, RemoteError, RemoteIdentityClient, SyncCoordinator, SyncSnapshot,
};

use std::collections::{HashMap, VecDeque};
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Semaphore;
use tokio::time::{Instant, sleep};

const POLL_INTERVAL: Duration = Duration::from_millis(5);
const POLL_TIMEOUT: Duration = Duration::from_secs(5);

pub fn test_config(cooldown_secs: u64) -> Config {
    let mut config = Config::default();
    config.credentials.api_key = String::from("test-key");
    config.credentials.api_secret = String::from("test-secret");
    config.sync.cooldown_secs = cooldown_secs;
    config.retry = RetryConfig {
        max_attempts: 3,
        initial_delay_ms: 10,
        max_delay_secs: 1,
        backoff_multiplier: 2.0,
        jitter: false,
    };
    config
}

pub fn coordinator(
    store: Arc<MemoryStore>,
    remote: Arc<ScriptedRemote>,
    cooldown_secs: u64,
) -> SyncCoordinator {
    SyncCoordinator::new(
        store,
        remote,
        Duration::from_secs(cooldown_secs),
        test_config(cooldown_secs).retry,
    )
}

pub fn manager(
    store: Arc<MemoryStore>,
    remote: Arc<ScriptedRemote>,
    cooldown_secs: u64,
) -> Arc<IdentityManager> {
    let manager = IdentityManager::new(test_config(cooldown_secs), store, remote)
        .expect("Failed to create identity manager");
    Arc::new(manager)
}

pub fn profile(id: &str, name: &str) -> IdentityProfile {
    IdentityProfile::builder(id).name(name).build()
}

/// Polls until `key` reaches `expected`.
pub async fn wait_for_snapshot(coordinator: &SyncCoordinator, key: &str, expected: SyncSnapshot) {
    let deadline = Instant::now() + POLL_TIMEOUT;
    loop {
        let snapshot = coordinator.snapshot(key).await;
        if snapshot == expected {
            return;
        }
        assert!(
            Instant::now() < deadline,
            "{key} stuck at {snapshot:?}, expected {expected:?}"
        );
        sleep(POLL_INTERVAL).await;
    }
}

/// Scripted reply of [`ScriptedRemote`] for one call.
#[derive(Debug, Clone)]
pub enum Reply {
    Ok(String),
    Network,
    Server(u16),
    Unknown,
    /// Panics inside the call, as a buggy client would.
    Panic,
}

/// Remote double that records every call and answers from a per-key script,
/// falling back to a unique success reference.
///
/// A gated remote holds every call until [`release`](Self::release) hands
/// out a permit, which stands in for a slow network.
pub struct ScriptedRemote {
    calls: Mutex<Vec<(String, IdentityProfile)>>,
    replies: Mutex<HashMap<String, VecDeque<Reply>>>,
    gate: Option<Semaphore>,
}

impl ScriptedRemote {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            replies: Mutex::new(HashMap::new()),
            gate: None,
        })
    }

    pub fn gated() -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            replies: Mutex::new(HashMap::new()),
            gate: Some(Semaphore::new(0)),
        })
    }

    pub fn script(&self, key: &str, replies: impl IntoIterator<Item = Reply>) {
        self.replies
            .lock()
            .unwrap()
            .entry(key.to_string())
            .or_default()
            .extend(replies);
    }

    pub fn release(&self, calls: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(calls);
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn calls_for(&self, key: &str) -> Vec<IdentityProfile> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(called_key, _)| called_key == key)
            .map(|(_, profile)| profile.clone())
            .collect()
    }

    /// Polls until at least `count` calls have started.
    pub async fn wait_for_calls(&self, count: usize) {
        let deadline = Instant::now() + POLL_TIMEOUT;
        while self.call_count() < count {
            assert!(
                Instant::now() < deadline,
                "expected {count} remote calls, saw {}",
                self.call_count()
            );
            sleep(POLL_INTERVAL).await;
        }
    }
}

#[async_trait]
impl RemoteIdentityClient for ScriptedRemote {
    async fn send(&self, key: &str, profile: &IdentityProfile) -> Result<String, RemoteError> {
        let call_number = {
            let mut calls = self.calls.lock().unwrap();
            calls.push((key.to_string(), profile.clone()));
            calls.len()
        };

        if let Some(gate) = &self.gate {
            gate.acquire().await.unwrap().forget();
        }

        let reply = self
            .replies
            .lock()
            .unwrap()
            .get_mut(key)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| Reply::Ok(format!("ref-{key}-{call_number}")));

        match reply {
            Reply::Ok(reference) => Ok(reference),
            Reply::Network => Err(RemoteError::network_unavailable("offline")),
            Reply::Server(status) => Err(RemoteError::server(status, "rejected")),
            Reply::Unknown => Err(RemoteError::unknown("unexpected response")),
            Reply::Panic => panic!("remote client exploded"),
        }
    }
}

/// In-memory store double with switchable write and stamp-read failures.
#[derive(Default)]
pub struct MemoryStore {
    profiles: Mutex<HashMap<String, IdentityProfile>>,
    stamps: Mutex<HashMap<String, IdentityStamp>>,
    fail_writes: AtomicBool,
    fail_stamp_reads: AtomicBool,
    saves: AtomicUsize,
    updates: AtomicUsize,
}

impl MemoryStore {
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn fail_stamp_reads(&self, fail: bool) {
        self.fail_stamp_reads.store(fail, Ordering::SeqCst);
    }

    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn update_count(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }

    pub fn profile(&self, key: &str) -> Option<IdentityProfile> {
        self.profiles.lock().unwrap().get(key).cloned()
    }

    pub fn stamp(&self, key: &str) -> Option<IdentityStamp> {
        self.stamps.lock().unwrap().get(key).cloned()
    }

    fn check_write(&self) -> crm_store::Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::io(
                PathBuf::from("memory"),
                io::Error::other("disk full"),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl LocalIdentityStore for MemoryStore {
    async fn save(&self, key: &str, profile: &IdentityProfile) -> crm_store::Result<()> {
        self.check_write()?;
        self.saves.fetch_add(1, Ordering::SeqCst);
        self.profiles
            .lock()
            .unwrap()
            .insert(key.to_string(), profile.clone());
        Ok(())
    }

    async fn fetch(&self, key: &str) -> crm_store::Result<Option<IdentityProfile>> {
        Ok(self.profile(key))
    }

    async fn update(&self, key: &str, profile: &IdentityProfile) -> crm_store::Result<()> {
        self.check_write()?;
        self.updates.fetch_add(1, Ordering::SeqCst);
        self.profiles
            .lock()
            .unwrap()
            .insert(key.to_string(), profile.clone());
        Ok(())
    }

    async fn delete(&self, key: &str) -> crm_store::Result<()> {
        self.check_write()?;
        self.profiles.lock().unwrap().remove(key);
        self.stamps.lock().unwrap().remove(key);
        Ok(())
    }

    async fn save_stamp(&self, key: &str, stamp: &IdentityStamp) -> crm_store::Result<()> {
        self.check_write()?;
        self.stamps
            .lock()
            .unwrap()
            .insert(key.to_string(), stamp.clone());
        Ok(())
    }

    async fn fetch_stamp(&self, key: &str) -> crm_store::Result<Option<IdentityStamp>> {
        if self.fail_stamp_reads.load(Ordering::SeqCst) {
            return Err(StoreError::corrupted(key, "unreadable stamp"));
        }
        Ok(self.stamp(key))
    }

    async fn delete_stamp(&self, key: &str) -> crm_store::Result<()> {
        self.check_write()?;
        self.stamps.lock().unwrap().remove(key);
        Ok(())
    }
}
