//! Directory-backed snapshot store.
//!
//! Each snapshot is one self-contained JSON file named `<id>.json`. Files are
//! created once and never rewritten.

use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::error::{FleetError, PersistenceError, Result, SnapshotError};

use super::types::{is_valid_snapshot_id, Snapshot, SnapshotSummary};

/// Extension of snapshot files.
const SNAPSHOT_EXTENSION: &str = "json";

/// Snapshot store rooted at a directory.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    dir: PathBuf,
}

impl SnapshotStore {
    /// Creates a store for `dir`. The directory is created on first write.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Returns the snapshot directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Ids that are not plain identifiers never name a file in the store.
    fn path_for(&self, id: &str) -> Option<PathBuf> {
        is_valid_snapshot_id(id).then(|| self.dir.join(format!("{id}.{SNAPSHOT_EXTENSION}")))
    }

    fn existing_path(&self, id: &str) -> Result<PathBuf> {
        self.path_for(id)
            .ok_or_else(|| SnapshotError::NotFound { id: id.to_string() }.into())
    }

    /// Checks whether a snapshot exists. Malformed ids report false.
    ///
    /// # Errors
    ///
    /// This never fails today.
    pub async fn exists(&self, id: &str) -> Result<bool> {
        let Some(path) = self.path_for(id) else {
            return Ok(false);
        };
        Ok(fs::try_exists(&path).await.unwrap_or(false))
    }

    /// Writes a new snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if a snapshot with the same id exists or the file
    /// cannot be written.
    pub async fn save(&self, snapshot: &Snapshot) -> Result<()> {
        let path = self
            .path_for(&snapshot.id)
            .ok_or_else(|| FleetError::internal(format!("Invalid snapshot id '{}'", snapshot.id)))?;

        fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| PersistenceError::write(&self.dir, e))?;

        let content = serde_json::to_string_pretty(snapshot)
            .map_err(|e| PersistenceError::serialization(format!("Failed to serialize snapshot: {e}")))?;

        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
            .map_err(|e| PersistenceError::write(&path, e))?;
        file.write_all(content.as_bytes())
            .await
            .map_err(|e| PersistenceError::write(&path, e))?;
        file.sync_all()
            .await
            .map_err(|e| PersistenceError::write(&path, e))?;

        debug!("Wrote snapshot {}", path.display());
        Ok(())
    }

    /// Loads a snapshot by id.
    ///
    /// # Errors
    ///
    /// Returns `SnapshotNotFound` if no such snapshot exists, or an error if
    /// the file cannot be read or parsed.
    pub async fn load(&self, id: &str) -> Result<Snapshot> {
        let path = self.existing_path(id)?;

        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(SnapshotError::NotFound { id: id.to_string() }.into());
            }
            Err(e) => return Err(PersistenceError::read(&path, e).into()),
        };

        serde_json::from_str(&content).map_err(|e| PersistenceError::corrupted(&path, e).into())
    }

    /// Deletes a snapshot.
    ///
    /// # Errors
    ///
    /// Returns `SnapshotNotFound` if no such snapshot exists, or an error if
    /// the file cannot be removed.
    pub async fn delete(&self, id: &str) -> Result<()> {
        let path = self.existing_path(id)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(SnapshotError::NotFound { id: id.to_string() }.into())
            }
            Err(e) => Err(PersistenceError::write(&path, e).into()),
        }
    }

    /// Lists all readable snapshots, most recent first.
    ///
    /// Files that cannot be read or parsed are skipped with a warning.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory exists but cannot be listed.
    pub async fn list(&self) -> Result<Vec<SnapshotSummary>> {
        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(PersistenceError::read(&self.dir, e).into()),
        };

        let mut summaries = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| PersistenceError::read(&self.dir, e))?
        {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(SNAPSHOT_EXTENSION) {
                continue;
            }

            match read_snapshot(&path).await {
                Ok(snapshot) => summaries.push(snapshot.summary()),
                Err(message) => warn!("Skipping unreadable snapshot {}: {message}", path.display()),
            }
        }

        summaries.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(summaries)
    }
}

async fn read_snapshot(path: &Path) -> std::result::Result<Snapshot, String> {
    let content = fs::read_to_string(path).await.map_err(|e| e.to_string())?;
    serde_json::from_str(&content).map_err(|e| e.to_string())
}
