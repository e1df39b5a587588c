//! Snapshot manager.
//!
//! Captures and restores the (infrastructure file, fleet state) pair. Rollback
//! always captures the current pair first, so a rollback can itself be undone.

use chrono::Utc;
use serde::Serialize;
use tracing::info;

use crate::driver::{Distributor, InfraDriver};
use crate::error::{Result, SnapshotError};
use crate::state::{with_lock, StateStore};

use super::store::SnapshotStore;
use super::types::{snapshot_id, Snapshot, SnapshotSummary};

/// Description used when a backup is taken without one.
pub const DEFAULT_BACKUP_DESCRIPTION: &str = "Automatic backup";

/// Description of the backup taken before every rollback.
pub const PRE_ROLLBACK_DESCRIPTION: &str = "Pre-rollback backup";

/// Result of a rollback.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RollbackOutcome {
    /// Snapshot that was restored.
    pub restored: String,
    /// Snapshot of the state replaced by the rollback.
    pub pre_rollback: String,
}

/// Snapshot manager.
pub struct SnapshotManager<'a, S: StateStore, D: Distributor> {
    snapshots: &'a SnapshotStore,
    state_store: &'a S,
    driver: &'a InfraDriver<D>,
}

impl<'a, S: StateStore, D: Distributor> SnapshotManager<'a, S, D> {
    /// Creates a new snapshot manager.
    #[must_use]
    pub const fn new(
        snapshots: &'a SnapshotStore,
        state_store: &'a S,
        driver: &'a InfraDriver<D>,
    ) -> Self {
        Self {
            snapshots,
            state_store,
            driver,
        }
    }

    /// Captures the current infrastructure file and fleet state.
    ///
    /// # Errors
    ///
    /// Returns an error if either artifact cannot be read or the snapshot
    /// cannot be written.
    pub async fn backup(&self, description: Option<&str>) -> Result<Snapshot> {
        let infra_text = self.driver.read_text().await?;
        let fleet_state = self.state_store.load().await?.unwrap_or_default();

        let created_at = Utc::now();
        let id = self.unused_id(snapshot_id(created_at)).await?;
        let snapshot = Snapshot::new(
            id,
            created_at,
            description.unwrap_or(DEFAULT_BACKUP_DESCRIPTION),
            infra_text,
            fleet_state,
        );

        self.snapshots.save(&snapshot).await?;
        info!(
            "Backup created: {} ({} instance(s))",
            snapshot.id,
            snapshot.fleet_state.len()
        );
        Ok(snapshot)
    }

    /// Disambiguates ids generated within the same millisecond.
    async fn unused_id(&self, base: String) -> Result<String> {
        if !self.snapshots.exists(&base).await? {
            return Ok(base);
        }
        let mut n = 1u32;
        loop {
            let candidate = format!("{base}_{n}");
            if !self.snapshots.exists(&candidate).await? {
                return Ok(candidate);
            }
            n += 1;
        }
    }

    /// Lists snapshots, most recent first.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot directory cannot be listed.
    pub async fn list(&self) -> Result<Vec<SnapshotSummary>> {
        self.snapshots.list().await
    }

    /// Restores the infrastructure file and fleet state from a snapshot.
    ///
    /// # Errors
    ///
    /// Returns `SnapshotNotFound` if the id is unknown. A failure after the
    /// pre-rollback backup leaves that backup as the way back.
    pub async fn rollback(&self, id: &str) -> Result<RollbackOutcome> {
        with_lock(self.state_store, "rollback", || async move {
            if !self.snapshots.exists(id).await? {
                return Err(SnapshotError::NotFound { id: id.to_string() }.into());
            }
            let target = self.snapshots.load(id).await?;

            let pre = self.backup(Some(PRE_ROLLBACK_DESCRIPTION)).await?;
            info!("Current state backed up as {}", pre.id);

            self.state_store.save(&target.fleet_state).await?;
            self.driver
                .restore(&target.infra_text, &format!("Rollback to {id}"))
                .await?;

            info!("Rolled back to {id}");
            Ok(RollbackOutcome {
                restored: id.to_string(),
                pre_rollback: pre.id,
            })
        })
        .await
    }

    /// Deletes all but the `keep` most recent snapshots and returns the
    /// deleted ids.
    ///
    /// # Errors
    ///
    /// Returns an error if a snapshot cannot be deleted.
    pub async fn prune(&self, keep: usize) -> Result<Vec<String>> {
        let mut removed = Vec::new();
        for summary in self.snapshots.list().await?.into_iter().skip(keep) {
            self.snapshots.delete(&summary.id).await?;
            removed.push(summary.id);
        }
        if !removed.is_empty() {
            info!("Pruned {} snapshot(s), kept {keep}", removed.len());
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::driver::RecordingDistributor;
    use crate::error::ErrorKind;
    use crate::reconciler::Reconciler;
    use crate::state::LocalStateStore;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    struct Fixture {
        dir: TempDir,
        catalog: Catalog,
        store: LocalStateStore,
        driver: InfraDriver<RecordingDistributor>,
        snapshots: SnapshotStore,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = TempDir::new().unwrap();
            Self {
                catalog: Catalog::new(),
                store: LocalStateStore::with_state_path(dir.path().join("config/deployed.json")),
                driver: InfraDriver::new(dir.path().join("app.yaml"), RecordingDistributor::new()),
                snapshots: SnapshotStore::new(dir.path().join("backups")),
                dir,
            }
        }

        fn manager(&self) -> SnapshotManager<'_, LocalStateStore, RecordingDistributor> {
            SnapshotManager::new(&self.snapshots, &self.store, &self.driver)
        }

        fn reconciler(&self) -> Reconciler<'_, LocalStateStore, RecordingDistributor> {
            Reconciler::new(&self.catalog, &self.store, &self.driver)
        }

        async fn state_text(&self) -> String {
            tokio::fs::read_to_string(self.dir.path().join("config/deployed.json"))
                .await
                .unwrap()
        }
    }

    #[tokio::test]
    async fn test_backup_captures_both_artifacts() {
        let fx = Fixture::new();
        fx.reconciler().add("git", &BTreeMap::new()).await.unwrap();

        let snapshot = fx.manager().backup(None).await.unwrap();
        assert_eq!(snapshot.description, DEFAULT_BACKUP_DESCRIPTION);
        assert!(snapshot.infra_text.contains("mcp-git"));
        assert!(snapshot.fleet_state.contains("git"));
    }

    #[tokio::test]
    async fn test_backup_of_empty_fleet() {
        let fx = Fixture::new();
        let snapshot = fx.manager().backup(Some("first")).await.unwrap();
        assert!(snapshot.infra_text.is_empty());
        assert!(snapshot.fleet_state.is_empty());
    }

    #[tokio::test]
    async fn test_rapid_backups_get_distinct_ids() {
        let fx = Fixture::new();
        let manager = fx.manager();

        let a = manager.backup(None).await.unwrap();
        let b = manager.backup(None).await.unwrap();
        assert_ne!(a.id, b.id);
        assert_eq!(manager.list().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_backup_then_rollback_restores_bytes() {
        let fx = Fixture::new();
        let reconciler = fx.reconciler();
        let manager = fx.manager();

        reconciler.add("github", &BTreeMap::new()).await.unwrap();
        let infra_before = fx.driver.read_text().await.unwrap();
        let state_before = fx.state_text().await;
        let snapshot = manager.backup(Some("known good")).await.unwrap();

        reconciler.add("slack", &BTreeMap::new()).await.unwrap();
        reconciler.remove("github").await.unwrap();

        let outcome = manager.rollback(&snapshot.id).await.unwrap();
        assert_eq!(outcome.restored, snapshot.id);
        assert_eq!(fx.driver.read_text().await.unwrap(), infra_before);
        assert_eq!(fx.state_text().await, state_before);

        let pre = fx.snapshots.load(&outcome.pre_rollback).await.unwrap();
        assert_eq!(pre.description, PRE_ROLLBACK_DESCRIPTION);
        assert!(pre.fleet_state.contains("slack"));

        let messages = fx.driver.distributor().messages();
        assert_eq!(
            messages.last().map(String::as_str),
            Some(format!("Rollback to {}", snapshot.id).as_str())
        );
    }

    #[tokio::test]
    async fn test_rollback_unknown_snapshot() {
        let fx = Fixture::new();
        let manager = fx.manager();

        for id in ["backup_19990101_000000_000", "backup.2024"] {
            let err = manager.rollback(id).await.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::SnapshotNotFound);
            assert_eq!(err.exit_code(), 2);
        }
        // No pre-rollback backup is taken for an unknown id.
        assert!(manager.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_prune_keeps_most_recent() {
        let fx = Fixture::new();
        let manager = fx.manager();

        let mut ids = Vec::new();
        for _ in 0..4 {
            ids.push(manager.backup(None).await.unwrap().id);
        }

        let removed = manager.prune(2).await.unwrap();
        assert_eq!(removed.len(), 2);

        let kept: Vec<String> = manager.list().await.unwrap().into_iter().map(|s| s.id).collect();
        assert_eq!(kept, vec![ids[3].clone(), ids[2].clone()]);
        assert!(manager.prune(5).await.unwrap().is_empty());
    }
}
