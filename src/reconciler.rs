//! Fleet reconciler.
//!
//! The reconciler is the sole mutator of the fleet state. Every add and remove
//! keeps the fleet state and the infrastructure file in lockstep: the driver
//! applies the change first, and the state is persisted only after the driver
//! succeeds. A crash or save failure between the two leaves drift that
//! [`Reconciler::reconcile`] reports.

use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use crate::catalog::{Catalog, InstanceDefinition};
use crate::driver::{Distributor, InfraDriver};
use crate::error::{CatalogError, ReconcileError, Result};
use crate::state::{with_lock, DeploymentRecord, FleetState, StateStore};
use crate::template::{build_address_table, build_descriptor, AddressTable, DescriptorHasher};

/// Default monthly cost of one instance.
pub const DEFAULT_MONTHLY_UNIT_COST: f64 = 5.0;

/// Default URL template for instance addresses.
pub const DEFAULT_URL_TEMPLATE: &str = "https://mcp-{name}-xyz.ondigitalocean.app";

/// Reconciler for the deployed fleet.
pub struct Reconciler<'a, S: StateStore, D: Distributor> {
    /// Instance catalog.
    catalog: &'a Catalog,
    /// Fleet state store.
    state_store: &'a S,
    /// Deployment driver.
    driver: &'a InfraDriver<D>,
    /// Descriptor hasher.
    hasher: DescriptorHasher,
    /// Template for instance URLs.
    url_template: String,
    /// Monthly cost per active instance.
    unit_cost: f64,
}

/// A catalog entry with its deployment flag.
#[derive(Debug, Clone, Serialize)]
pub struct CatalogMatch<'c> {
    /// The catalog definition.
    #[serde(flatten)]
    pub definition: &'c InstanceDefinition,
    /// Whether the instance is in the fleet.
    pub deployed: bool,
}

/// Fleet summary.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FleetStatus {
    /// Number of definitions in the catalog.
    pub catalog_size: usize,
    /// Number of active instances.
    pub active_count: usize,
    /// Estimated monthly cost of the active instances.
    pub estimated_cost: f64,
}

impl<'a, S: StateStore, D: Distributor> Reconciler<'a, S, D> {
    /// Creates a new reconciler.
    #[must_use]
    pub fn new(catalog: &'a Catalog, state_store: &'a S, driver: &'a InfraDriver<D>) -> Self {
        Self {
            catalog,
            state_store,
            driver,
            hasher: DescriptorHasher::new(),
            url_template: DEFAULT_URL_TEMPLATE.to_string(),
            unit_cost: DEFAULT_MONTHLY_UNIT_COST,
        }
    }

    /// Sets the URL template used for the address table.
    #[must_use]
    pub fn with_url_template(mut self, url_template: impl Into<String>) -> Self {
        self.url_template = url_template.into();
        self
    }

    /// Sets the monthly cost per instance.
    #[must_use]
    pub const fn with_unit_cost(mut self, unit_cost: f64) -> Self {
        self.unit_cost = unit_cost;
        self
    }

    /// Loads the fleet state, treating an absent file as an empty fleet.
    ///
    /// # Errors
    ///
    /// Returns an error if the state exists but cannot be read.
    pub async fn load_state(&self) -> Result<FleetState> {
        Ok(self.state_store.load().await?.unwrap_or_default())
    }

    /// Deploys an instance.
    ///
    /// # Errors
    ///
    /// Returns `UnknownInstance` if the name is not in the catalog,
    /// `AlreadyDeployed` if it is already in the fleet, or the driver or
    /// persistence failure that stopped the operation.
    pub async fn add(
        &self,
        name: &str,
        overrides: &BTreeMap<String, String>,
    ) -> Result<DeploymentRecord> {
        let name = name.to_lowercase();
        let name = name.as_str();

        let definition = self.catalog.lookup(name).ok_or_else(|| CatalogError::UnknownInstance {
            name: name.to_string(),
            available: self.catalog.list_names().join(", "),
        })?;

        with_lock(self.state_store, "add", || async move {
            let mut state = self.load_state().await?;
            if state.contains(name) {
                return Err(ReconcileError::AlreadyDeployed {
                    name: name.to_string(),
                }
                .into());
            }

            let descriptor = build_descriptor(definition, overrides);
            let hash = self
                .hasher
                .hash_descriptor(&self.driver.service_name(name), &descriptor);
            debug!("Descriptor hash for {name}: {}", self.hasher.short_hash(&hash));

            self.driver.apply(name, &descriptor).await?;

            let record = DeploymentRecord::active(definition.clone(), descriptor.env, hash);
            state.insert(name, record.clone());
            if let Err(e) = self.state_store.save(&state).await {
                warn!("Service block for {name} was written but the fleet state was not saved");
                return Err(e);
            }

            info!("Deployed {name} on port {}", descriptor.port);
            Ok(record)
        })
        .await
    }

    /// Removes a deployed instance.
    ///
    /// # Errors
    ///
    /// Returns `NotDeployed` if the name is not in the fleet, or the driver or
    /// persistence failure that stopped the operation.
    pub async fn remove(&self, name: &str) -> Result<DeploymentRecord> {
        let name = name.to_lowercase();
        let name = name.as_str();

        with_lock(self.state_store, "remove", || async move {
            let mut state = self.load_state().await?;
            if !state.contains(name) {
                return Err(ReconcileError::NotDeployed {
                    name: name.to_string(),
                }
                .into());
            }

            self.driver.remove(name).await?;

            let record = state.remove(name).ok_or_else(|| ReconcileError::NotDeployed {
                name: name.to_string(),
            })?;
            if let Err(e) = self.state_store.save(&state).await {
                warn!("Service block for {name} was removed but the fleet state was not saved");
                return Err(e);
            }

            info!("Removed {name}");
            Ok(record)
        })
        .await
    }

    /// Lists deployed instances in insertion order.
    ///
    /// # Errors
    ///
    /// Returns an error if the state cannot be loaded.
    pub async fn list_active(&self) -> Result<Vec<(String, DeploymentRecord)>> {
        let state = self.load_state().await?;
        Ok(state
            .iter()
            .map(|(name, record)| (name.to_string(), record.clone()))
            .collect())
    }

    /// Lists the whole catalog, flagging deployed entries.
    ///
    /// # Errors
    ///
    /// Returns an error if the state cannot be loaded.
    pub async fn list_available(&self) -> Result<Vec<CatalogMatch<'a>>> {
        let state = self.load_state().await?;
        Ok(self.flag(self.catalog.definitions().iter(), &state))
    }

    /// Searches the catalog, flagging deployed entries.
    ///
    /// # Errors
    ///
    /// Returns an error if the state cannot be loaded.
    pub async fn search(&self, query: &str) -> Result<Vec<CatalogMatch<'a>>> {
        let state = self.load_state().await?;
        Ok(self.flag(self.catalog.search(query).into_iter(), &state))
    }

    fn flag(
        &self,
        definitions: impl Iterator<Item = &'a InstanceDefinition>,
        state: &FleetState,
    ) -> Vec<CatalogMatch<'a>> {
        definitions
            .map(|definition| CatalogMatch {
                deployed: state.contains(&definition.name),
                definition,
            })
            .collect()
    }

    /// Summarizes the fleet.
    ///
    /// # Errors
    ///
    /// Returns an error if the state cannot be loaded.
    pub async fn status(&self) -> Result<FleetStatus> {
        let state = self.load_state().await?;
        let active_count = state.active_count();

        #[allow(clippy::cast_precision_loss)]
        let estimated_cost = self.unit_cost * active_count as f64;

        Ok(FleetStatus {
            catalog_size: self.catalog.len(),
            active_count,
            estimated_cost,
        })
    }

    /// Builds the address table for downstream agents.
    ///
    /// # Errors
    ///
    /// Returns an error if the state cannot be loaded.
    pub async fn address_table(&self) -> Result<AddressTable> {
        let state = self.load_state().await?;
        Ok(build_address_table(&state, &self.url_template))
    }

    /// Compares the fleet state against the infrastructure file without
    /// changing either.
    ///
    /// # Errors
    ///
    /// Returns an error if either artifact cannot be read.
    pub async fn reconcile(&self) -> Result<DriftReport> {
        let state = self.load_state().await?;
        let services = self.driver.service_names().await?;
        let prefix = self.driver.service_prefix();

        let mut report = DriftReport::default();

        for (name, record) in state.iter() {
            let service = self.driver.service_name(name);
            if !services.contains(&service) {
                report.missing_blocks.push(name.to_string());
                continue;
            }

            let Some(recorded) = record.descriptor_hash.as_deref() else {
                report.in_sync += 1;
                continue;
            };
            let definition = self.catalog.lookup(name).unwrap_or(&record.info);
            let current = self
                .hasher
                .hash_descriptor(&service, &build_descriptor(definition, &record.env_vars));
            if DescriptorHasher::hashes_match(recorded, &current) {
                report.in_sync += 1;
            } else {
                report.stale_hashes.push(name.to_string());
            }
        }

        report.orphan_blocks = services
            .iter()
            .filter_map(|service| service.strip_prefix(prefix))
            .filter(|name| !state.contains(name))
            .map(str::to_string)
            .collect();

        if report.has_drift() {
            warn!("Fleet drift detected: {}", report.summary());
        } else {
            info!("Fleet state and infrastructure file agree");
        }
        Ok(report)
    }
}

/// Differences between the fleet state and the infrastructure file.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct DriftReport {
    /// Instances in the fleet state without a service block.
    pub missing_blocks: Vec<String>,
    /// Prefixed service blocks without a fleet record.
    pub orphan_blocks: Vec<String>,
    /// Records whose descriptor no longer matches the catalog.
    pub stale_hashes: Vec<String>,
    /// Records that match their service block.
    pub in_sync: usize,
}

impl DriftReport {
    /// Returns true if any difference was found.
    #[must_use]
    pub fn has_drift(&self) -> bool {
        !(self.missing_blocks.is_empty()
            && self.orphan_blocks.is_empty()
            && self.stale_hashes.is_empty())
    }

    /// Returns true if both artifacts agree.
    #[must_use]
    pub fn is_converged(&self) -> bool {
        !self.has_drift()
    }

    fn summary(&self) -> String {
        format!(
            "{} missing, {} orphaned, {} stale",
            self.missing_blocks.len(),
            self.orphan_blocks.len(),
            self.stale_hashes.len()
        )
    }
}

impl std::fmt::Display for DriftReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if !self.has_drift() {
            return write!(f, "No drift detected - {} instance(s) in sync", self.in_sync);
        }

        writeln!(f, "Drift detected ({}):", self.summary())?;
        for name in &self.missing_blocks {
            writeln!(f, "  - {name}: recorded but no service block")?;
        }
        for name in &self.orphan_blocks {
            writeln!(f, "  - {name}: service block without a record")?;
        }
        for name in &self.stale_hashes {
            writeln!(f, "  - {name}: descriptor changed since deployment")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{MockDistributor, RecordingDistributor};
    use crate::error::{ErrorKind, FleetError, TransportError};
    use crate::state::LocalStateStore;
    use mockall::Sequence;
    use tempfile::TempDir;
    use tokio_test::assert_ok;

    struct Fixture {
        _dir: TempDir,
        catalog: Catalog,
        store: LocalStateStore,
        driver: InfraDriver<RecordingDistributor>,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = TempDir::new().expect("tempdir");
            let store = LocalStateStore::with_state_path(dir.path().join("deployed.json"));
            let driver = InfraDriver::new(dir.path().join("app.yaml"), RecordingDistributor::new());
            Self {
                _dir: dir,
                catalog: Catalog::new(),
                store,
                driver,
            }
        }

        fn reconciler(&self) -> Reconciler<'_, LocalStateStore, RecordingDistributor> {
            Reconciler::new(&self.catalog, &self.store, &self.driver)
        }
    }

    fn no_overrides() -> BTreeMap<String, String> {
        BTreeMap::new()
    }

    #[tokio::test]
    async fn test_add_status_remove() {
        let fx = Fixture::new();
        let reconciler = fx.reconciler();

        let record = reconciler.add("github", &no_overrides()).await.unwrap();
        assert!(record.is_active());
        assert_eq!(fx.driver.service_names().await.unwrap(), vec!["mcp-github"]);

        let status = reconciler.status().await.unwrap();
        assert_eq!(status.active_count, 1);
        assert_eq!(status.catalog_size, 8);
        assert!((status.estimated_cost - 5.0).abs() < f64::EPSILON);

        assert_ok!(reconciler.remove("github").await);
        assert!(fx.driver.service_names().await.unwrap().is_empty());
        assert_eq!(reconciler.status().await.unwrap().active_count, 0);
    }

    #[tokio::test]
    async fn test_add_unknown_instance() {
        let fx = Fixture::new();
        let err = fx.reconciler().add("nope", &no_overrides()).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::UnknownInstance);
        assert!(err.to_string().contains("nope"));
    }

    #[tokio::test]
    async fn test_double_add_leaves_fleet_unchanged() {
        let fx = Fixture::new();
        let reconciler = fx.reconciler();

        assert_ok!(reconciler.add("github", &no_overrides()).await);
        let before = fx.driver.read_text().await.unwrap();

        let err = reconciler.add("GitHub", &no_overrides()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyDeployed);
        assert_eq!(fx.driver.read_text().await.unwrap(), before);
        assert_eq!(reconciler.list_active().await.unwrap().len(), 1);
        assert_eq!(fx.driver.distributor().messages().len(), 1);
    }

    #[tokio::test]
    async fn test_remove_not_deployed() {
        let fx = Fixture::new();
        let err = fx.reconciler().remove("slack").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotDeployed);
    }

    #[tokio::test]
    async fn test_transport_failure_is_not_committed() {
        let dir = TempDir::new().expect("tempdir");
        let catalog = Catalog::new();
        let store = LocalStateStore::with_state_path(dir.path().join("deployed.json"));

        let mut distributor = MockDistributor::new();
        distributor.expect_channel().return_const("mock");
        distributor.expect_publish().times(1).returning(|_| {
            Err(FleetError::Transport(TransportError::Timeout {
                operation: String::from("git push origin"),
                timeout_secs: 60,
            }))
        });
        let driver = InfraDriver::new(dir.path().join("app.yaml"), distributor);
        let reconciler = Reconciler::new(&catalog, &store, &driver);

        let err = reconciler.add("stripe", &no_overrides()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TransportFailure);
        assert!(reconciler.list_active().await.unwrap().is_empty());
        assert!(!store.is_locked().await.unwrap());

        let drift = reconciler.reconcile().await.unwrap();
        assert_eq!(drift.orphan_blocks, vec!["stripe"]);
    }

    fn push_timeout() -> FleetError {
        FleetError::Transport(TransportError::Timeout {
            operation: String::from("git push origin"),
            timeout_secs: 60,
        })
    }

    /// Expects `messages` in order, failing the calls whose flag is set.
    fn scripted_distributor(messages: &[(&'static str, bool)]) -> MockDistributor {
        let mut seq = Sequence::new();
        let mut distributor = MockDistributor::new();
        distributor.expect_channel().return_const("mock");
        for &(expected, fails) in messages {
            distributor
                .expect_publish()
                .withf(move |message| message.to_string() == expected)
                .times(1)
                .in_sequence(&mut seq)
                .returning(move |_| if fails { Err(push_timeout()) } else { Ok(()) });
        }
        distributor
    }

    #[tokio::test]
    async fn test_add_retry_after_push_failure() {
        let dir = TempDir::new().expect("tempdir");
        let catalog = Catalog::new();
        let store = LocalStateStore::with_state_path(dir.path().join("deployed.json"));
        let driver = InfraDriver::new(
            dir.path().join("app.yaml"),
            scripted_distributor(&[
                ("Add stripe MCP server", true),
                ("Add stripe MCP server", false),
                ("Remove stripe MCP server", false),
            ]),
        );
        let reconciler = Reconciler::new(&catalog, &store, &driver);

        let err = reconciler.add("stripe", &no_overrides()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TransportFailure);

        let record = reconciler.add("stripe", &no_overrides()).await.unwrap();
        assert!(record.is_active());
        assert_eq!(driver.service_names().await.unwrap(), vec!["mcp-stripe"]);
        assert!(reconciler.reconcile().await.unwrap().is_converged());

        assert_ok!(reconciler.remove("stripe").await);
        assert!(driver.service_names().await.unwrap().is_empty());
        assert!(reconciler.list_active().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_remove_retry_after_push_failure() {
        let dir = TempDir::new().expect("tempdir");
        let catalog = Catalog::new();
        let store = LocalStateStore::with_state_path(dir.path().join("deployed.json"));
        let driver = InfraDriver::new(
            dir.path().join("app.yaml"),
            scripted_distributor(&[
                ("Add git MCP server", false),
                ("Remove git MCP server", true),
                ("Remove git MCP server", false),
            ]),
        );
        let reconciler = Reconciler::new(&catalog, &store, &driver);
        reconciler.add("git", &no_overrides()).await.unwrap();

        let err = reconciler.remove("git").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TransportFailure);
        assert_eq!(reconciler.list_active().await.unwrap().len(), 1);
        assert!(driver.service_names().await.unwrap().is_empty());

        let record = reconciler.remove("git").await.unwrap();
        assert_eq!(record.info.name, "git");
        assert!(reconciler.list_active().await.unwrap().is_empty());
        assert!(!store.is_locked().await.unwrap());

        let err = reconciler.remove("git").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotDeployed);
    }

    #[tokio::test]
    async fn test_remove_then_add_reproduces_descriptor() {
        let fx = Fixture::new();
        let reconciler = fx.reconciler();
        let overrides = BTreeMap::from([(String::from("READ_ONLY"), String::from("true"))]);

        let first = reconciler.add("postgres", &overrides).await.unwrap();
        let first_text = fx.driver.read_text().await.unwrap();
        reconciler.remove("postgres").await.unwrap();
        let second = reconciler.add("postgres", &overrides).await.unwrap();

        assert_eq!(first.descriptor_hash, second.descriptor_hash);
        assert_eq!(first.env_vars, second.env_vars);
        assert_eq!(fx.driver.read_text().await.unwrap(), first_text);
    }

    #[tokio::test]
    async fn test_search_flags_deployed() {
        let fx = Fixture::new();
        let reconciler = fx.reconciler();
        reconciler.add("git", &no_overrides()).await.unwrap();

        let hits = reconciler.search("GIT").await.unwrap();
        let flags: Vec<(&str, bool)> = hits
            .iter()
            .map(|h| (h.definition.name.as_str(), h.deployed))
            .collect();
        assert_eq!(flags, vec![("git", true), ("github", false)]);

        let available = reconciler.list_available().await.unwrap();
        assert_eq!(available.len(), 8);
        assert_eq!(available.iter().filter(|m| m.deployed).count(), 1);
    }

    #[tokio::test]
    async fn test_address_table_uses_template() {
        let fx = Fixture::new();
        let reconciler = fx.reconciler().with_url_template("https://{name}.example.com");
        reconciler.add("memory", &no_overrides()).await.unwrap();

        let table = reconciler.address_table().await.unwrap();
        assert_eq!(table.get("memory"), Some("https://memory.example.com"));
    }

    #[tokio::test]
    async fn test_reconcile_reports_missing_and_stale() {
        let fx = Fixture::new();
        let reconciler = fx.reconciler();
        reconciler.add("fetch", &no_overrides()).await.unwrap();
        reconciler.add("slack", &no_overrides()).await.unwrap();
        assert!(reconciler.reconcile().await.unwrap().is_converged());

        // Block removed behind the reconciler's back.
        fx.driver.remove("fetch").await.unwrap();

        // Record tampered so its hash no longer matches.
        let mut state = reconciler.load_state().await.unwrap();
        let mut record = state.get("slack").cloned().unwrap();
        record.descriptor_hash = Some(String::from("0000"));
        state.insert("slack", record);
        fx.store.save(&state).await.unwrap();

        let report = reconciler.reconcile().await.unwrap();
        assert_eq!(report.missing_blocks, vec!["fetch"]);
        assert_eq!(report.stale_hashes, vec!["slack"]);
        assert!(report.orphan_blocks.is_empty());
        assert!(report.to_string().contains("fetch: recorded but no service block"));
    }
}
