use crate::{LocalIdentityStore, Result as StoreResult, StoreError};

use crm_core::{ErrorLocation, Fingerprint, IdentityProfile, IdentityStamp};

use std::panic::Location;
use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::debug;
use sqlx::Row;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};

const MAX_CONNECTIONS: u32 = 5;

/// SQLite-backed identity store.
pub struct SqliteIdentityStore {
    pool: SqlitePool,
}

impl SqliteIdentityStore {
    /// Wraps an existing pool. The caller is responsible for migrations.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Opens (creating if missing) the database at `path` and runs migrations.
    pub async fn connect(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StoreError::io(parent.to_path_buf(), e))?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .connect_with(options)
            .await?;

        Self::migrate(&pool).await?;

        Ok(Self { pool })
    }

    /// Private in-memory database, mostly useful for tests and ephemeral hosts.
    pub async fn in_memory() -> StoreResult<Self> {
        let options = SqliteConnectOptions::new()
            .filename(":memory:")
            .create_if_missing(true);

        // In-memory needs a single connection
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        Self::migrate(&pool).await?;

        Ok(Self { pool })
    }

    pub async fn migrate(pool: &SqlitePool) -> StoreResult<()> {
        sqlx::migrate!("./migrations")
            .run(pool)
            .await
            .map_err(|e| StoreError::Migration {
                message: format!("Migration failed: {e}"),
                location: ErrorLocation::from(Location::caller()),
            })?;

        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn upsert_profile(&self, key: &str, profile: &IdentityProfile) -> StoreResult<()> {
        let profile_json = serde_json::to_string(profile)?;
        let updated_at = Utc::now();

        sqlx::query(
            r#"
              INSERT INTO identity_profiles (identity_key, profile_json, updated_at)
              VALUES (?, ?, ?)
              ON CONFLICT(identity_key) DO UPDATE SET
                  profile_json = excluded.profile_json,
                  updated_at = excluded.updated_at
              "#,
        )
        .bind(key)
        .bind(profile_json)
        .bind(updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl LocalIdentityStore for SqliteIdentityStore {
    async fn save(&self, key: &str, profile: &IdentityProfile) -> StoreResult<()> {
        self.upsert_profile(key, profile).await?;
        debug!("Saved identity profile for {key}");
        Ok(())
    }

    async fn fetch(&self, key: &str) -> StoreResult<Option<IdentityProfile>> {
        let row = sqlx::query("SELECT profile_json FROM identity_profiles WHERE identity_key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let json: String = row.try_get("profile_json")?;
        let profile = serde_json::from_str(&json)
            .map_err(|e| StoreError::corrupted(key, e.to_string()))?;

        Ok(Some(profile))
    }

    async fn update(&self, key: &str, profile: &IdentityProfile) -> StoreResult<()> {
        self.upsert_profile(key, profile).await?;
        debug!("Updated identity profile for {key}");
        Ok(())
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM identity_profiles WHERE identity_key = ?")
            .bind(key)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM identity_stamps WHERE identity_key = ?")
            .bind(key)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        debug!("Deleted identity profile and stamp for {key}");
        Ok(())
    }

    async fn save_stamp(&self, key: &str, stamp: &IdentityStamp) -> StoreResult<()> {
        sqlx::query(
            r#"
              INSERT INTO identity_stamps (identity_key, fingerprint, reference, synced_at)
              VALUES (?, ?, ?, ?)
              ON CONFLICT(identity_key) DO UPDATE SET
                  fingerprint = excluded.fingerprint,
                  reference = excluded.reference,
                  synced_at = excluded.synced_at
              "#,
        )
        .bind(key)
        .bind(stamp.fingerprint.as_str())
        .bind(&stamp.reference)
        .bind(stamp.synced_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn fetch_stamp(&self, key: &str) -> StoreResult<Option<IdentityStamp>> {
        let row = sqlx::query(
            "SELECT fingerprint, reference, synced_at FROM identity_stamps WHERE identity_key = ?",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let fingerprint: String = row.try_get("fingerprint")?;
        let reference: String = row.try_get("reference")?;
        let synced_at: DateTime<Utc> = row.try_get("synced_at")?;

        Ok(Some(IdentityStamp {
            fingerprint: Fingerprint::from_hex(fingerprint),
            reference,
            synced_at,
        }))
    }

    async fn delete_stamp(&self, key: &str) -> StoreResult<()> {
        sqlx::query("DELETE FROM identity_stamps WHERE identity_key = ?")
            .bind(key)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
