use crate::Result as StoreResult;

use crm_core::{IdentityProfile, IdentityStamp};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Durable persistence of identity profiles and their sync stamps.
///
/// Every operation reports failure through its `Result`; nothing is
/// swallowed. Implementations never touch the network.
#[async_trait]
pub trait LocalIdentityStore: Send + Sync {
    /// Persist the profile for `key`, replacing any previous one.
    async fn save(&self, key: &str, profile: &IdentityProfile) -> StoreResult<()>;

    /// Last persisted profile, `None` if never saved.
    async fn fetch(&self, key: &str) -> StoreResult<Option<IdentityProfile>>;

    /// Same overwrite semantics as [`save`](Self::save); kept separate so
    /// implementations can tell first writes from refreshes in their logs.
    async fn update(&self, key: &str, profile: &IdentityProfile) -> StoreResult<()>;

    /// Remove both the profile and the stamp for `key`.
    async fn delete(&self, key: &str) -> StoreResult<()>;

    async fn save_stamp(&self, key: &str, stamp: &IdentityStamp) -> StoreResult<()>;

    async fn fetch_stamp(&self, key: &str) -> StoreResult<Option<IdentityStamp>>;

    async fn delete_stamp(&self, key: &str) -> StoreResult<()>;

    /// Time of the last successful sync for `key`.
    async fn fetch_saving_state(&self, key: &str) -> StoreResult<Option<DateTime<Utc>>> {
        Ok(self.fetch_stamp(key).await?.map(|stamp| stamp.synced_at))
    }
}
