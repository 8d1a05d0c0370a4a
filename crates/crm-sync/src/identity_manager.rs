use crate::{RemoteIdentityClient, Result as SyncResult, SyncCoordinator, SyncError};

use crm_config::Config;
use crm_core::{CustomValue, IdentityProfile, SyncReport};
use crm_store::{LocalIdentityStore, SqliteIdentityStore};

use std::collections::BTreeMap;
use std::sync::Arc;

use log::{debug, info, warn};
use serde_json::{Map, Value};

/// Entry point host applications call to report who the current user is.
pub struct IdentityManager {
    config: Config,
    store: Arc<dyn LocalIdentityStore>,
    coordinator: SyncCoordinator,
}

impl IdentityManager {
    /// Fails when the configuration does not validate, e.g. missing
    /// credentials.
    pub fn new(
        config: Config,
        store: Arc<dyn LocalIdentityStore>,
        remote: Arc<dyn RemoteIdentityClient>,
    ) -> SyncResult<Self> {
        config.validate()?;

        let coordinator = SyncCoordinator::new(
            Arc::clone(&store),
            remote,
            config.sync.cooldown(),
            config.retry.clone(),
        );

        info!(
            "Identity manager ready (network={}, cooldown={}s)",
            config.sync.network, config.sync.cooldown_secs
        );

        Ok(Self {
            config,
            store,
            coordinator,
        })
    }

    /// Opens the SQLite store at the configured storage path.
    pub async fn open(config: Config, remote: Arc<dyn RemoteIdentityClient>) -> SyncResult<Self> {
        config.validate()?;

        let path = config.storage_path()?;
        let store = SqliteIdentityStore::connect(&path).await?;
        debug!("Identity store opened at {}", path.display());

        Self::new(config, Arc::new(store), remote)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn coordinator(&self) -> &SyncCoordinator {
        &self.coordinator
    }

    /// Syncs `profile` unless an identical one was synced within the
    /// cooldown. Remote failures arrive inside the report; `Err` is only
    /// returned for a blank id or a sync that never reported back.
    pub async fn identify(&self, profile: IdentityProfile) -> SyncResult<SyncReport> {
        if profile.has_blank_id() {
            warn!("Rejected identify with a blank id");
            return Err(SyncError::invalid_argument("identity id cannot be empty"));
        }

        self.coordinator.submit(profile).await.wait().await
    }

    pub async fn identify_with(
        &self,
        id: &str,
        name: Option<&str>,
        email: Option<&str>,
        custom_data: BTreeMap<String, CustomValue>,
    ) -> SyncResult<SyncReport> {
        let mut builder = IdentityProfile::builder(id).custom_data(custom_data);
        if let Some(name) = name {
            builder = builder.name(name);
        }
        if let Some(email) = email {
            builder = builder.email(email);
        }

        self.identify(builder.build()).await
    }

    /// Identify from the key/value map sent by the mobile bridges.
    pub async fn identify_bridge_map(&self, map: &Map<String, Value>) -> SyncResult<SyncReport> {
        let profile = IdentityProfile::from_bridge_map(map)?;
        self.identify(profile).await
    }

    /// Forgets `id` locally, e.g. on logout.
    pub async fn reset(&self, id: &str) -> SyncResult<()> {
        if id.trim().is_empty() {
            return Err(SyncError::invalid_argument("identity id cannot be empty"));
        }

        self.coordinator.reset(id).await
    }

    /// Re-submits the persisted profile for `id` when it was never
    /// confirmed by the remote service. Returns `None` when there is no
    /// profile or the stored stamp already matches it.
    pub async fn resync_pending(&self, id: &str) -> SyncResult<Option<SyncReport>> {
        let Some(profile) = self.store.fetch(id).await? else {
            return Ok(None);
        };

        let synced = match self.store.fetch_stamp(id).await {
            Ok(Some(stamp)) => stamp.fingerprint == profile.fingerprint(),
            Ok(None) => false,
            Err(e) => {
                warn!("{id}: could not read sync stamp, resyncing: {e}");
                false
            }
        };

        if synced {
            debug!("{id}: nothing pending");
            return Ok(None);
        }

        info!("{id}: resyncing unconfirmed profile");
        self.identify(profile).await.map(Some)
    }

    /// Last profile persisted for `id`, synced or not.
    pub async fn cached_profile(&self, id: &str) -> SyncResult<Option<IdentityProfile>> {
        Ok(self.store.fetch(id).await?)
    }
}
