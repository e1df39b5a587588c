//! Local file-based state storage backend.
//!
//! The fleet state lives in a single JSON file; the lock file sits in the
//! same directory.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::error::{PersistenceError, Result};

use super::lock::{generate_holder_id, LockInfo, LOCK_EXPIRY_SECS};
use super::store::StateStore;
use super::types::FleetState;

/// Lock file name.
const LOCK_FILE: &str = "fleet.lock";

/// Local file-based state store.
#[derive(Debug)]
pub struct LocalStateStore {
    /// Directory holding the state and lock files.
    base_dir: PathBuf,
    /// Path to the state file.
    state_path: PathBuf,
    /// Path to the lock file.
    lock_path: PathBuf,
}

impl LocalStateStore {
    /// Creates a local state store from a state file path.
    #[must_use]
    pub fn with_state_path(state_path: impl Into<PathBuf>) -> Self {
        let state_path = state_path.into();
        let base_dir = state_path
            .parent()
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
        let lock_path = base_dir.join(LOCK_FILE);

        Self {
            base_dir,
            state_path,
            lock_path,
        }
    }

    /// Returns the state file path.
    #[must_use]
    pub fn state_path(&self) -> &Path {
        &self.state_path
    }

    /// Ensures the state directory exists.
    async fn ensure_dir(&self) -> Result<()> {
        if !self.base_dir.exists() {
            debug!("Creating state directory: {}", self.base_dir.display());
            fs::create_dir_all(&self.base_dir)
                .await
                .map_err(|e| PersistenceError::write(&self.base_dir, e))?;
        }
        Ok(())
    }

    /// Reads the lock file if it exists.
    async fn read_lock_file(&self) -> Result<Option<LockInfo>> {
        let content = match fs::read_to_string(&self.lock_path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(PersistenceError::read(&self.lock_path, e).into()),
        };

        let lock_info: LockInfo = serde_json::from_str(&content)
            .map_err(|e| PersistenceError::corrupted(&self.lock_path, e))?;

        Ok(Some(lock_info))
    }

    /// Creates the lock file, failing if it already exists.
    async fn create_lock_file(&self, lock_info: &LockInfo) -> Result<bool> {
        self.ensure_dir().await?;

        let content = serde_json::to_string_pretty(lock_info)
            .map_err(|e| PersistenceError::serialization(format!("Failed to serialize lock: {e}")))?;

        let mut file = match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.lock_path)
            .await
        {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => return Ok(false),
            Err(e) => return Err(PersistenceError::write(&self.lock_path, e).into()),
        };

        file.write_all(content.as_bytes())
            .await
            .map_err(|e| PersistenceError::write(&self.lock_path, e))?;

        file.sync_all()
            .await
            .map_err(|e| PersistenceError::write(&self.lock_path, e))?;

        Ok(true)
    }

    /// Deletes the lock file.
    async fn delete_lock_file(&self) -> Result<()> {
        match fs::remove_file(&self.lock_path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(PersistenceError::write(&self.lock_path, e).into()),
        }
    }
}

#[async_trait]
impl StateStore for LocalStateStore {
    async fn load(&self) -> Result<Option<FleetState>> {
        let content = match fs::read_to_string(&self.state_path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("State file does not exist: {}", self.state_path.display());
                return Ok(None);
            }
            Err(e) => return Err(PersistenceError::read(&self.state_path, e).into()),
        };

        debug!("Loaded state from: {}", self.state_path.display());

        let state: FleetState = serde_json::from_str(&content)
            .map_err(|e| PersistenceError::corrupted(&self.state_path, e))?;

        Ok(Some(state))
    }

    async fn save(&self, state: &FleetState) -> Result<()> {
        self.ensure_dir().await?;

        info!("Saving fleet state to: {}", self.state_path.display());

        let content = serde_json::to_string_pretty(state)
            .map_err(|e| PersistenceError::serialization(format!("Failed to serialize state: {e}")))?;

        // Write to a temporary file first, then rename for atomicity
        let temp_path = self.state_path.with_extension("tmp");

        let mut file = fs::File::create(&temp_path)
            .await
            .map_err(|e| PersistenceError::write(&temp_path, e))?;

        file.write_all(content.as_bytes())
            .await
            .map_err(|e| PersistenceError::write(&temp_path, e))?;

        file.sync_all()
            .await
            .map_err(|e| PersistenceError::write(&temp_path, e))?;

        // Atomic rename
        fs::rename(&temp_path, &self.state_path)
            .await
            .map_err(|e| PersistenceError::write(&self.state_path, e))?;

        debug!("State saved successfully");
        Ok(())
    }

    async fn acquire_lock(&self, holder: &str, operation: &str) -> Result<LockInfo> {
        let holder_id = if holder.is_empty() {
            generate_holder_id()
        } else {
            holder.to_string()
        };

        let lock_info = LockInfo::new(&holder_id, operation);
        if self.create_lock_file(&lock_info).await? {
            info!(
                "Acquired fleet lock for {operation}: {} (expires in {}s)",
                lock_info.lock_id, LOCK_EXPIRY_SECS
            );
            return Ok(lock_info);
        }

        // Lock file exists; take it over only if it has expired.
        let existing = self.read_lock_file().await?;
        if let Some(existing) = existing
            && !existing.is_expired()
        {
            return Err(PersistenceError::LockedByOther {
                holder: existing.holder.clone(),
                since: existing.acquired_at.to_rfc3339(),
            }
            .into());
        }

        debug!("Expired lock found, taking over");
        self.delete_lock_file().await?;

        if self.create_lock_file(&lock_info).await? {
            info!("Acquired fleet lock for {operation}: {}", lock_info.lock_id);
            Ok(lock_info)
        } else {
            let holder = self
                .read_lock_file()
                .await?
                .map_or_else(|| String::from("unknown"), |l| l.holder);
            Err(PersistenceError::LockedByOther {
                holder,
                since: String::from("just now"),
            }
            .into())
        }
    }

    async fn release_lock(&self, lock_id: &str) -> Result<()> {
        if let Some(existing) = self.read_lock_file().await? {
            if existing.lock_id == lock_id {
                self.delete_lock_file().await?;
                debug!("Released fleet lock: {lock_id}");
            } else {
                debug!(
                    "Lock ID mismatch: expected {lock_id}, found {}",
                    existing.lock_id
                );
            }
        }
        Ok(())
    }

    async fn get_lock_info(&self) -> Result<Option<LockInfo>> {
        self.read_lock_file().await
    }

    async fn is_locked(&self) -> Result<bool> {
        if let Some(lock_info) = self.read_lock_file().await? {
            return Ok(!lock_info.is_expired());
        }
        Ok(false)
    }
}
