//! End-to-end fleet lifecycle tests against a temporary working tree.

use std::collections::BTreeMap;
use std::path::PathBuf;

use mcp_fleet::catalog::{Catalog, CommunityRegistration};
use mcp_fleet::driver::{InfraDriver, RecordingDistributor};
use mcp_fleet::error::{ErrorKind, FleetError};
use mcp_fleet::reconciler::Reconciler;
use mcp_fleet::snapshot::{SnapshotManager, SnapshotStore};
use mcp_fleet::state::{LocalStateStore, StateStore};
use tempfile::TempDir;

const INFRA_HEADER: &str = "\
name: mcp-fleet
region: nyc
services:
  - name: web
    source_dir: /
    http_port: 3000
";

struct Workspace {
    dir: TempDir,
    catalog: Catalog,
    store: LocalStateStore,
    driver: InfraDriver<RecordingDistributor>,
    snapshots: SnapshotStore,
}

impl Workspace {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("app.yaml"), INFRA_HEADER).unwrap();
        Self::with_catalog(dir, Catalog::new())
    }

    fn with_catalog(dir: TempDir, catalog: Catalog) -> Self {
        let store = LocalStateStore::with_state_path(dir.path().join("config/deployed-servers.json"));
        let driver = InfraDriver::new(dir.path().join("app.yaml"), RecordingDistributor::new());
        let snapshots = SnapshotStore::new(dir.path().join("backups"));
        Self {
            dir,
            catalog,
            store,
            driver,
            snapshots,
        }
    }

    fn reconciler(&self) -> Reconciler<'_, LocalStateStore, RecordingDistributor> {
        Reconciler::new(&self.catalog, &self.store, &self.driver)
            .with_url_template("https://mcp-{name}.example.app")
    }

    fn manager(&self) -> SnapshotManager<'_, LocalStateStore, RecordingDistributor> {
        SnapshotManager::new(&self.snapshots, &self.store, &self.driver)
    }

    fn infra_path(&self) -> PathBuf {
        self.dir.path().join("app.yaml")
    }

    fn infra_text(&self) -> String {
        std::fs::read_to_string(self.infra_path()).unwrap()
    }

    fn state_bytes(&self) -> Vec<u8> {
        std::fs::read(self.dir.path().join("config/deployed-servers.json")).unwrap()
    }
}

fn no_overrides() -> BTreeMap<String, String> {
    BTreeMap::new()
}

#[tokio::test]
async fn add_status_remove_round_trip() {
    let ws = Workspace::new();
    let reconciler = ws.reconciler();

    let record = reconciler.add("Git", &no_overrides()).await.unwrap();
    assert_eq!(record.info.name, "git");
    assert!(ws.infra_text().contains("name: mcp-git"));

    let status = reconciler.status().await.unwrap();
    assert_eq!(status.catalog_size, 8);
    assert_eq!(status.active_count, 1);
    assert!((status.estimated_cost - 5.0).abs() < f64::EPSILON);

    let table = reconciler.address_table().await.unwrap();
    assert_eq!(table.get("git"), Some("https://mcp-git.example.app"));

    reconciler.remove("git").await.unwrap();
    assert_eq!(ws.infra_text(), INFRA_HEADER);
    assert!(reconciler.list_active().await.unwrap().is_empty());

    assert_eq!(
        ws.driver.distributor().messages(),
        vec!["Add git MCP server", "Remove git MCP server"]
    );
    assert!(!ws.store.is_locked().await.unwrap());
}

#[tokio::test]
async fn double_add_is_rejected_without_side_effects() {
    let ws = Workspace::new();
    let reconciler = ws.reconciler();

    reconciler.add("filesystem", &no_overrides()).await.unwrap();
    let infra_before = ws.infra_text();
    let state_before = ws.state_bytes();

    let err = reconciler.add("filesystem", &no_overrides()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AlreadyDeployed);
    assert_eq!(ws.infra_text(), infra_before);
    assert_eq!(ws.state_bytes(), state_before);
    assert_eq!(ws.driver.distributor().messages().len(), 1);
}

#[tokio::test]
async fn unknown_instance_lists_the_catalog() {
    let ws = Workspace::new();

    let err = ws.reconciler().add("nonexistent", &no_overrides()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnknownInstance);
    assert!(err.to_string().contains("github"));
    assert_eq!(ws.infra_text(), INFRA_HEADER);
}

#[tokio::test]
async fn remove_then_add_again_is_clean() {
    let ws = Workspace::new();
    let reconciler = ws.reconciler();

    reconciler.add("git", &no_overrides()).await.unwrap();
    let first = ws.infra_text();
    reconciler.remove("git").await.unwrap();
    reconciler.add("git", &no_overrides()).await.unwrap();

    assert_eq!(ws.infra_text(), first);
    assert!(reconciler.reconcile().await.unwrap().is_converged());
}

#[tokio::test]
async fn rollback_restores_both_artifacts_exactly() {
    let ws = Workspace::new();
    let reconciler = ws.reconciler();
    let manager = ws.manager();

    reconciler.add("git", &no_overrides()).await.unwrap();
    let infra_at_backup = ws.infra_text();
    let state_at_backup = ws.state_bytes();
    let backup = manager.backup(Some("before postgres")).await.unwrap();

    let mut overrides = BTreeMap::new();
    overrides.insert(String::from("POSTGRES_URL"), String::from("postgresql://db/app"));
    reconciler.add("postgres", &overrides).await.unwrap();
    assert_ne!(ws.infra_text(), infra_at_backup);

    let outcome = manager.rollback(&backup.id).await.unwrap();
    assert_eq!(outcome.restored, backup.id);
    assert_ne!(outcome.pre_rollback, backup.id);

    assert_eq!(ws.infra_text(), infra_at_backup);
    assert_eq!(ws.state_bytes(), state_at_backup);

    let listed = manager.list().await.unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].id, outcome.pre_rollback);
    assert_eq!(listed[0].instance_count, 2);

    let messages = ws.driver.distributor().messages();
    assert_eq!(messages.last().map(String::as_str), Some(format!("Rollback to {}", backup.id).as_str()));
}

#[tokio::test]
async fn rollback_to_unknown_snapshot_changes_nothing() {
    let ws = Workspace::new();
    ws.reconciler().add("git", &no_overrides()).await.unwrap();
    let infra_before = ws.infra_text();

    let err = ws.manager().rollback("backup_20000101_000000_000").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SnapshotNotFound);
    assert_eq!(ws.infra_text(), infra_before);
    assert!(ws.manager().list().await.unwrap().is_empty());
}

#[tokio::test]
async fn hand_edited_infra_file_is_reported_as_drift() {
    let ws = Workspace::new();
    let reconciler = ws.reconciler();
    reconciler.add("git", &no_overrides()).await.unwrap();

    // Drop the git block by hand and add a stray prefixed one.
    std::fs::write(
        ws.infra_path(),
        format!("{INFRA_HEADER}  - name: mcp-stray\n    http_port: 9999\n"),
    )
    .unwrap();

    let report = reconciler.reconcile().await.unwrap();
    assert_eq!(report.missing_blocks, vec!["git"]);
    assert_eq!(report.orphan_blocks, vec!["stray"]);
    assert!(report.has_drift());
}

#[tokio::test]
async fn community_entries_are_deployable() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("app.yaml"), INFRA_HEADER).unwrap();

    let mut catalog = Catalog::new();
    let weather = catalog
        .register_community(CommunityRegistration {
            name: String::from("weather"),
            package: String::from("mcp-weather"),
            description: String::from("Weather forecasts"),
            capabilities: vec![String::from("forecast")],
            port: None,
        })
        .unwrap()
        .clone();
    assert_eq!(weather.default_port, 8088);

    let ws = Workspace::with_catalog(dir, catalog);
    let reconciler = ws.reconciler();
    reconciler.add("weather", &no_overrides()).await.unwrap();

    assert!(ws.infra_text().contains("uvx mcp-weather"));
    let found = reconciler.search("forecast").await.unwrap();
    assert_eq!(found.len(), 1);
    assert!(found[0].deployed);
}

#[tokio::test]
async fn held_lock_blocks_mutations() {
    let ws = Workspace::new();
    let lock = ws.store.acquire_lock("someone-else", "add").await.unwrap();

    let err = ws.reconciler().add("git", &no_overrides()).await.unwrap_err();
    assert!(matches!(err, FleetError::Persistence(_)));
    assert_eq!(ws.infra_text(), INFRA_HEADER);

    ws.store.release_lock(&lock.lock_id).await.unwrap();
    ws.reconciler().add("git", &no_overrides()).await.unwrap();
}
