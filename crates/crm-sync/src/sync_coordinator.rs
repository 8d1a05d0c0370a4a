use crate::retry::with_retry;
use crate::{RemoteIdentityClient, Result as SyncResult, SyncError};

use crm_config::RetryConfig;
use crm_core::{Fingerprint, IdentityProfile, IdentityStamp, SyncOutcome, SyncReport};
use crm_store::LocalIdentityStore;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use log::{debug, error, info, warn};
use tokio::sync::{Mutex, RwLock, oneshot};
use tokio::task::JoinError;

const OPERATION_NAME: &str = "Identity sync";

/// Observable state of one identity key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncSnapshot {
    Idle,
    InFlight {
        /// Callers that will receive the outcome of the running call
        waiters: usize,
        /// Callers waiting on the follow-up call for a newer profile
        queued_waiters: usize,
    },
}

/// Handle returned by [`SyncCoordinator::submit`] once the caller has been
/// admitted. Await [`wait`](Self::wait) for the outcome.
#[derive(Debug)]
pub enum SyncTicket {
    /// Answered from the local stamp, no network call involved.
    Ready(SyncReport),
    Pending {
        key: String,
        receiver: oneshot::Receiver<SyncReport>,
    },
}

impl SyncTicket {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }

    pub async fn wait(self) -> SyncResult<SyncReport> {
        match self {
            Self::Ready(report) => Ok(report),
            Self::Pending { key, receiver } => receiver.await.map_err(|_| SyncError::closed(&key)),
        }
    }
}

struct Waiter {
    sender: oneshot::Sender<SyncReport>,
    /// Set when this caller's profile could not be written locally
    stale: bool,
}

struct QueuedBatch {
    profile: IdentityProfile,
    fingerprint: Fingerprint,
    waiters: Vec<Waiter>,
}

struct InFlight {
    fingerprint: Fingerprint,
    generation: u64,
    waiters: Vec<Waiter>,
    queued: Option<QueuedBatch>,
}

impl InFlight {
    fn admit(
        &mut self,
        key: &str,
        profile: IdentityProfile,
        fingerprint: Fingerprint,
        generation: u64,
        waiter: Waiter,
    ) {
        if self.queued.is_none() && self.generation == generation && self.fingerprint == fingerprint
        {
            debug!("{key}: joining running sync ({} waiters)", self.waiters.len() + 1);
            self.waiters.push(waiter);
            return;
        }

        match self.queued.as_mut() {
            Some(batch) => {
                if batch.fingerprint != fingerprint {
                    debug!("{key}: newer profile supersedes the queued one");
                    batch.profile = profile;
                    batch.fingerprint = fingerprint;
                }
                batch.waiters.push(waiter);
            }
            None => {
                debug!("{key}: queueing follow-up sync behind the running one");
                self.queued = Some(QueuedBatch {
                    profile,
                    fingerprint,
                    waiters: vec![waiter],
                });
            }
        }
    }
}

#[derive(Default)]
struct KeyState {
    /// Bumped by reset; a call started under an older generation never
    /// writes to the store.
    generation: u64,
    in_flight: Option<InFlight>,
}

type KeySlot = Mutex<KeyState>;

struct Shared {
    store: Arc<dyn LocalIdentityStore>,
    remote: Arc<dyn RemoteIdentityClient>,
    cooldown: Duration,
    retry: RetryConfig,
    slots: RwLock<HashMap<String, Arc<KeySlot>>>,
}

/// Runs at most one remote call per identity key and fans its outcome out
/// to every caller waiting on it.
///
/// Each key has its own lock, held while a caller is admitted and while a
/// finished call is committed, never across the network round trip.
#[derive(Clone)]
pub struct SyncCoordinator {
    shared: Arc<Shared>,
}

impl SyncCoordinator {
    pub fn new(
        store: Arc<dyn LocalIdentityStore>,
        remote: Arc<dyn RemoteIdentityClient>,
        cooldown: Duration,
        retry: RetryConfig,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                store,
                remote,
                cooldown,
                retry,
                slots: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Admits `profile` for syncing.
    ///
    /// On an idle key, an unchanged profile inside the cooldown window
    /// resolves immediately from the stamp. Otherwise the profile is
    /// persisted and the caller either starts a call, joins the running one,
    /// or joins the single follow-up batch that carries the newest profile.
    pub async fn submit(&self, profile: IdentityProfile) -> SyncTicket {
        let key = profile.id().to_string();
        let fingerprint = profile.fingerprint();

        let slot = self.shared.slot(&key).await;
        let mut state = slot.lock().await;

        // A running call may carry a newer profile than the stamp, so the
        // stamp only answers an idle key.
        let mut stamp_unreadable = false;
        if state.in_flight.is_none() {
            let (stamp, unreadable) = self.shared.read_stamp(&key).await;
            if let Some(stamp) = stamp
                && stamp.covers(&fingerprint, Utc::now(), self.shared.cooldown)
            {
                debug!("{key}: unchanged within cooldown, answering from stamp");
                let persisted = self.shared.persist_profile(&key, &profile).await;
                let mut report = SyncReport::cached(stamp.reference);
                report.local_cache_stale = !persisted;
                return SyncTicket::Ready(report);
            }
            stamp_unreadable = unreadable;
        }

        let persisted = self.shared.persist_profile(&key, &profile).await;

        let (sender, receiver) = oneshot::channel();
        let waiter = Waiter {
            sender,
            stale: stamp_unreadable || !persisted,
        };

        let generation = state.generation;
        match state.in_flight.as_mut() {
            Some(flight) => flight.admit(&key, profile, fingerprint, generation, waiter),
            None => {
                info!("{key}: starting sync");
                state.in_flight = Some(InFlight {
                    fingerprint: fingerprint.clone(),
                    generation,
                    waiters: vec![waiter],
                    queued: None,
                });

                let shared = Arc::clone(&self.shared);
                let slot = Arc::clone(&slot);
                let task_key = key.clone();
                tokio::spawn(async move {
                    let driver = tokio::spawn(Arc::clone(&shared).drive(
                        task_key.clone(),
                        Arc::clone(&slot),
                        profile,
                        fingerprint,
                        generation,
                    ));

                    if let Err(join_error) = driver.await {
                        error!(
                            "{task_key}: sync task aborted: {}",
                            abort_reason(join_error)
                        );
                        shared.abandon(&task_key, &slot).await;
                    }
                });
            }
        }

        SyncTicket::Pending { key, receiver }
    }

    /// Deletes the persisted profile and stamp for `key`.
    ///
    /// A running call is not aborted: its callers still get its outcome but
    /// it no longer writes a stamp. Callers of a queued follow-up are moved
    /// onto the running call and the queued profile is dropped.
    pub async fn reset(&self, key: &str) -> SyncResult<()> {
        let slot = self.shared.slot(key).await;
        let mut state = slot.lock().await;

        state.generation += 1;

        if let Some(flight) = state.in_flight.as_mut()
            && let Some(batch) = flight.queued.take()
        {
            debug!(
                "{key}: dropping queued profile, {} waiters moved to the running sync",
                batch.waiters.len()
            );
            flight.waiters.extend(batch.waiters);
        }

        self.shared.store.delete(key).await?;

        info!("{key}: identity reset");
        Ok(())
    }

    pub async fn snapshot(&self, key: &str) -> SyncSnapshot {
        let slot = self.shared.slots.read().await.get(key).cloned();
        let Some(slot) = slot else {
            return SyncSnapshot::Idle;
        };

        let state = slot.lock().await;
        match &state.in_flight {
            None => SyncSnapshot::Idle,
            Some(flight) => SyncSnapshot::InFlight {
                waiters: flight.waiters.len(),
                queued_waiters: flight.queued.as_ref().map_or(0, |batch| batch.waiters.len()),
            },
        }
    }
}

impl Shared {
    async fn slot(&self, key: &str) -> Arc<KeySlot> {
        if let Some(slot) = self.slots.read().await.get(key) {
            return Arc::clone(slot);
        }

        let mut slots = self.slots.write().await;
        Arc::clone(slots.entry(key.to_string()).or_default())
    }

    /// Drives the call for `profile` and then any follow-up batches queued
    /// behind it, until the key goes idle.
    async fn drive(
        self: Arc<Self>,
        key: String,
        slot: Arc<KeySlot>,
        mut profile: IdentityProfile,
        mut fingerprint: Fingerprint,
        mut generation: u64,
    ) {
        loop {
            let outcome = self.send(&key, &profile).await;

            let mut state = slot.lock().await;

            let stamp_failed = if state.generation == generation {
                self.commit(&key, &fingerprint, &outcome).await
            } else {
                debug!("{key}: reset during sync, outcome not recorded");
                false
            };

            let Some(flight) = state.in_flight.take() else {
                warn!("{key}: sync finished without in-flight state");
                return;
            };

            let mut follow_up = None;
            let mut cached = None;

            if let Some(batch) = flight.queued {
                let (stamp, stamp_unreadable) = self.read_stamp(&key).await;
                match stamp {
                    Some(stamp) if stamp.covers(&batch.fingerprint, Utc::now(), self.cooldown) => {
                        debug!("{key}: queued profile already synced, answering from stamp");
                        cached = Some((SyncReport::cached(stamp.reference), batch.waiters));
                    }
                    _ => {
                        let mut waiters = batch.waiters;
                        if stamp_unreadable {
                            waiters.iter_mut().for_each(|waiter| waiter.stale = true);
                        }

                        let current = state.generation;
                        info!("{key}: starting follow-up sync");
                        state.in_flight = Some(InFlight {
                            fingerprint: batch.fingerprint.clone(),
                            generation: current,
                            waiters,
                            queued: None,
                        });
                        follow_up = Some((batch.profile, batch.fingerprint, current));
                    }
                }
            }

            drop(state);

            deliver(&key, flight.waiters, &SyncReport::network(outcome), stamp_failed);
            if let Some((report, waiters)) = cached {
                deliver(&key, waiters, &report, false);
            }

            match follow_up {
                Some((next_profile, next_fingerprint, next_generation)) => {
                    profile = next_profile;
                    fingerprint = next_fingerprint;
                    generation = next_generation;
                }
                None => return,
            }
        }
    }

    async fn send(&self, key: &str, profile: &IdentityProfile) -> SyncOutcome {
        let remote = self.remote.as_ref();

        match with_retry(&self.retry, OPERATION_NAME, move || remote.send(key, profile)).await {
            Ok(reference) => SyncOutcome::Success(reference),
            Err(e) => {
                warn!("{key}: sync failed: {e}");
                SyncOutcome::Failure(e.to_failure())
            }
        }
    }

    /// Records a successful outcome. Returns true when the stamp could not
    /// be written.
    async fn commit(&self, key: &str, fingerprint: &Fingerprint, outcome: &SyncOutcome) -> bool {
        let SyncOutcome::Success(reference) = outcome else {
            return false;
        };

        let stamp = IdentityStamp::new(fingerprint.clone(), reference.clone());
        match self.store.save_stamp(key, &stamp).await {
            Ok(()) => {
                info!("{key}: synced");
                false
            }
            Err(e) => {
                warn!("{key}: synced but the stamp could not be saved: {e}");
                true
            }
        }
    }

    /// Clears the in-flight state of a call whose task died. Dropping the
    /// senders resolves every waiter with [`SyncError::Closed`].
    async fn abandon(&self, key: &str, slot: &KeySlot) {
        let mut state = slot.lock().await;
        if let Some(flight) = state.in_flight.take() {
            let queued = flight.queued.as_ref().map_or(0, |batch| batch.waiters.len());
            warn!(
                "{key}: dropping {} waiters of an aborted sync",
                flight.waiters.len() + queued
            );
        }
    }

    /// An unreadable stamp counts as no stamp; the flag reports the failure.
    async fn read_stamp(&self, key: &str) -> (Option<IdentityStamp>, bool) {
        match self.store.fetch_stamp(key).await {
            Ok(stamp) => (stamp, false),
            Err(e) => {
                warn!("{key}: could not read sync stamp, treating as unsynced: {e}");
                (None, true)
            }
        }
    }

    async fn persist_profile(&self, key: &str, profile: &IdentityProfile) -> bool {
        let result = match self.store.fetch(key).await {
            Ok(Some(stored)) if stored.fingerprint() == profile.fingerprint() => Ok(()),
            Ok(Some(_)) => self.store.update(key, profile).await,
            _ => self.store.save(key, profile).await,
        };

        match result {
            Ok(()) => true,
            Err(e) => {
                warn!("{key}: could not persist profile, syncing anyway: {e}");
                false
            }
        }
    }
}

fn deliver(key: &str, waiters: Vec<Waiter>, report: &SyncReport, stale: bool) {
    for waiter in waiters {
        let mut report = report.clone();
        report.local_cache_stale |= stale || waiter.stale;

        if waiter.sender.send(report).is_err() {
            debug!("{key}: caller stopped waiting before the outcome arrived");
        }
    }
}

fn abort_reason(join_error: JoinError) -> String {
    if !join_error.is_panic() {
        return "task cancelled".to_string();
    }

    match join_error.into_panic().downcast::<String>() {
        Ok(msg) => *msg,
        Err(any) => match any.downcast::<&str>() {
            Ok(msg) => msg.to_string(),
            Err(_) => "unknown panic".to_string(),
        },
    }
}
