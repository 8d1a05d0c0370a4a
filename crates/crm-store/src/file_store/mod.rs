use crate::{LocalIdentityStore, Result as StoreResult, StoreError};

use crm_core::{IdentityProfile, IdentityStamp};

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use log::{debug, warn};
use serde::de::DeserializeOwned;
use tokio::fs;
use tokio::io::AsyncWriteExt;

const PROFILE_SUFFIX: &str = "profile.json";
const STAMP_SUFFIX: &str = "stamp.json";
const DATE_FORMAT: &str = "%Y%m%d_%H%M%S";

// Keeps temp names unique across concurrent writes in one process
static TEMP_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Identity store keeping one JSON file per record under a directory.
///
/// File names are the hex-encoded identity key, so any user id is safe to
/// use as a key. Writes go through a temp file, fsync and rename.
pub struct FileIdentityStore {
    dir: PathBuf,
}

impl FileIdentityStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub(crate) fn record_path(&self, key: &str, suffix: &str) -> PathBuf {
        self.dir.join(format!("{}.{suffix}", hex::encode(key)))
    }

    async fn write_atomic(&self, path: &Path, json: &str) -> StoreResult<()> {
        fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| StoreError::io(self.dir.clone(), e))?;

        let sequence = TEMP_SEQUENCE.fetch_add(1, Ordering::Relaxed);
        let temp_path = path.with_extension(format!("tmp.{}.{sequence}", std::process::id()));

        let written = async {
            let mut file = fs::File::create(&temp_path)
                .await
                .map_err(|e| StoreError::io(temp_path.clone(), e))?;

            file.write_all(json.as_bytes())
                .await
                .map_err(|e| StoreError::io(temp_path.clone(), e))?;

            file.sync_all()
                .await
                .map_err(|e| StoreError::io(temp_path.clone(), e))?;
            drop(file);

            fs::rename(&temp_path, path)
                .await
                .map_err(|e| StoreError::io(path.to_path_buf(), e))
        }
        .await;

        if written.is_err()
            && let Err(e) = fs::remove_file(&temp_path).await
            && e.kind() != ErrorKind::NotFound
        {
            warn!("Failed to remove temp file {}: {e}", temp_path.display());
        }

        written
    }

    /// Reads a record. A file that no longer parses is moved aside to
    /// `<name>.corrupted.<timestamp>` so the next read starts clean.
    async fn read_record<T: DeserializeOwned>(
        &self,
        key: &str,
        path: &Path,
    ) -> StoreResult<Option<T>> {
        let contents = match fs::read_to_string(path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::io(path.to_path_buf(), e)),
        };

        match serde_json::from_str(&contents) {
            Ok(record) => Ok(Some(record)),
            Err(e) => {
                warn!("Identity record corrupted at {path:?}: {e}");
                self.backup_corrupted(path).await?;
                Err(StoreError::corrupted(key, e.to_string()))
            }
        }
    }

    async fn backup_corrupted(&self, path: &Path) -> StoreResult<()> {
        let timestamp = chrono::Utc::now().format(DATE_FORMAT);
        let mut backup = path.as_os_str().to_owned();
        backup.push(format!(".corrupted.{timestamp}"));
        let backup_path = PathBuf::from(backup);

        fs::rename(path, &backup_path)
            .await
            .map_err(|e| StoreError::io(path.to_path_buf(), e))?;

        warn!("Backed up corrupted identity record to {backup_path:?}");
        Ok(())
    }

    async fn remove_if_exists(path: &Path) -> StoreResult<()> {
        match fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::io(path.to_path_buf(), e)),
        }
    }
}

#[async_trait]
impl LocalIdentityStore for FileIdentityStore {
    async fn save(&self, key: &str, profile: &IdentityProfile) -> StoreResult<()> {
        let json = serde_json::to_string_pretty(profile)?;
        self.write_atomic(&self.record_path(key, PROFILE_SUFFIX), &json)
            .await?;
        debug!("Saved identity profile for {key}");
        Ok(())
    }

    async fn fetch(&self, key: &str) -> StoreResult<Option<IdentityProfile>> {
        self.read_record(key, &self.record_path(key, PROFILE_SUFFIX))
            .await
    }

    async fn update(&self, key: &str, profile: &IdentityProfile) -> StoreResult<()> {
        let json = serde_json::to_string_pretty(profile)?;
        self.write_atomic(&self.record_path(key, PROFILE_SUFFIX), &json)
            .await?;
        debug!("Updated identity profile for {key}");
        Ok(())
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        Self::remove_if_exists(&self.record_path(key, PROFILE_SUFFIX)).await?;
        Self::remove_if_exists(&self.record_path(key, STAMP_SUFFIX)).await?;
        debug!("Deleted identity profile and stamp for {key}");
        Ok(())
    }

    async fn save_stamp(&self, key: &str, stamp: &IdentityStamp) -> StoreResult<()> {
        let json = serde_json::to_string_pretty(stamp)?;
        self.write_atomic(&self.record_path(key, STAMP_SUFFIX), &json)
            .await
    }

    async fn fetch_stamp(&self, key: &str) -> StoreResult<Option<IdentityStamp>> {
        self.read_record(key, &self.record_path(key, STAMP_SUFFIX))
            .await
    }

    async fn delete_stamp(&self, key: &str) -> StoreResult<()> {
        Self::remove_if_exists(&self.record_path(key, STAMP_SUFFIX)).await
    }
}
