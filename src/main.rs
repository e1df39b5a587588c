//! mcp-fleet CLI entrypoint.
//!
//! This is the main entrypoint for the mcp-fleet command-line tool.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::ExitCode;

use mcp_fleet::catalog::Catalog;
use mcp_fleet::cli::{Cli, Commands, ListScope, LogFormat, OutputFormatter};
use mcp_fleet::config::{ConfigParser, ConfigValidator, DistributionMode, FleetConfig};
use mcp_fleet::driver::{
    Distributor, DistributorChain, GitDistributor, InfraDriver, PlatformDistributor,
    RecordingDistributor,
};
use mcp_fleet::error::Result;
use mcp_fleet::reconciler::Reconciler;
use mcp_fleet::snapshot::{SnapshotManager, SnapshotStore};
use mcp_fleet::state::{LocalStateStore, StateStore};
use mcp_fleet::template::instance_url;

use clap::Parser;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// Main entrypoint.
fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    init_logging(cli.verbose, cli.log_format);

    // Run async runtime
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    let formatter = OutputFormatter::new(cli.output);
    match runtime.block_on(run(cli, &formatter)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", formatter.error(&e.to_string()));
            ExitCode::from(e.exit_code())
        }
    }
}

/// Initializes the logging system. `RUST_LOG` wins over `--verbose`.
fn init_logging(verbose: bool, format: LogFormat) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

/// Everything a command needs, built once from the configuration.
struct Fleet {
    config: FleetConfig,
    catalog: Catalog,
    state_store: LocalStateStore,
    driver: InfraDriver<Box<dyn Distributor>>,
    snapshots: SnapshotStore,
}

impl Fleet {
    fn reconciler(&self) -> Reconciler<'_, LocalStateStore, Box<dyn Distributor>> {
        Reconciler::new(&self.catalog, &self.state_store, &self.driver)
            .with_url_template(self.config.naming.url_template.clone())
            .with_unit_cost(self.config.pricing.monthly_unit_cost)
    }

    fn snapshot_manager(&self) -> SnapshotManager<'_, LocalStateStore, Box<dyn Distributor>> {
        SnapshotManager::new(&self.snapshots, &self.state_store, &self.driver)
    }
}

/// Main async entry point.
async fn run(cli: Cli, formatter: &OutputFormatter) -> Result<()> {
    let fleet = load_fleet(cli.config.as_ref())?;

    match cli.command {
        Commands::Add { name, env } => {
            let overrides: BTreeMap<String, String> = Commands::overrides(&env);
            let record = fleet.reconciler().add(&name, &overrides).await?;
            let key = name.to_lowercase();
            let url = instance_url(&fleet.config.naming.url_template, &key);
            println!("{}", formatter.format_added(&key, &record, &url));
        }
        Commands::Remove { name } => {
            let record = fleet.reconciler().remove(&name).await?;
            println!("{}", formatter.format_removed(&name.to_lowercase(), &record));
        }
        Commands::List { scope } => match scope {
            ListScope::Active => {
                let records = fleet.reconciler().list_active().await?;
                println!("{}", formatter.format_active(&records));
            }
            ListScope::Available => {
                let matches = fleet.reconciler().list_available().await?;
                println!("{}", formatter.format_catalog(&matches));
            }
        },
        Commands::Search { query } => {
            let matches = fleet.reconciler().search(&query).await?;
            println!("{}", formatter.format_catalog(&matches));
        }
        Commands::Status => {
            let status = fleet.reconciler().status().await?;
            println!("{}", formatter.format_status(&status));
        }
        Commands::Addresses => {
            let table = fleet.reconciler().address_table().await?;
            println!("{}", formatter.format_addresses(&table));
        }
        Commands::Reconcile => {
            let report = fleet.reconciler().reconcile().await?;
            println!("{}", formatter.format_drift(&report));
        }
        Commands::Backup { description } => {
            let description = description.join(" ");
            let description = Some(description.as_str()).filter(|d| !d.trim().is_empty());
            let snapshot = fleet.snapshot_manager().backup(description).await?;
            println!("{}", formatter.format_snapshot_created(&snapshot));
        }
        Commands::ListBackups => {
            let snapshots = fleet.snapshot_manager().list().await?;
            println!("{}", formatter.format_snapshots(&snapshots));
        }
        Commands::Rollback { id } => {
            let outcome = fleet.snapshot_manager().rollback(&id).await?;
            println!("{}", formatter.format_rollback(&outcome));
        }
        Commands::Prune { keep } => {
            let deleted = fleet.snapshot_manager().prune(keep).await?;
            println!("{}", formatter.format_pruned(&deleted));
        }
        Commands::LockInfo => {
            let lock = fleet.state_store.get_lock_info().await?;
            println!("{}", formatter.format_lock(lock.as_ref()));
        }
        Commands::Unlock { force } => cmd_unlock(&fleet, force, formatter).await?,
    }

    Ok(())
}

/// Releases the operation lock.
async fn cmd_unlock(fleet: &Fleet, force: bool, formatter: &OutputFormatter) -> Result<()> {
    let Some(lock) = fleet.state_store.get_lock_info().await? else {
        println!("{}", formatter.success("Fleet is not locked."));
        return Ok(());
    };

    if !lock.is_expired() && !force {
        println!("{}", formatter.format_lock(Some(&lock)));
        eprintln!("Lock is still live; use --force to release it anyway.");
        return Ok(());
    }

    if !lock.is_expired() {
        warn!("Forcefully releasing lock held by {}", lock.holder);
    }
    fleet.state_store.release_lock(&lock.lock_id).await?;
    println!("{}", formatter.success("Fleet unlocked."));
    Ok(())
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Loads configuration and wires the catalog, stores, and driver.
fn load_fleet(config_path: Option<&PathBuf>) -> Result<Fleet> {
    let cwd = std::env::current_dir()?;
    let parser = ConfigParser::new().with_base_path(&cwd);
    let loaded = parser.load(config_path.map(PathBuf::as_path))?;
    match &loaded.source {
        Some(path) => debug!("Using configuration from: {}", path.display()),
        None => debug!("Using default configuration"),
    }
    let config = loaded.config;
    ConfigValidator::new().validate(&config)?;

    let mut catalog = Catalog::with_port_base(config.catalog.community_port_base);
    for registration in &config.catalog.community {
        let definition = catalog.register_community(registration.clone())?;
        debug!(
            "Registered community server {} on port {}",
            definition.name, definition.default_port
        );
    }

    let state_store = LocalStateStore::with_state_path(&config.paths.state_file);
    let snapshots = SnapshotStore::new(&config.paths.backup_dir);
    let distributor = build_distributor(&config)?;
    info!("Distributing changes via {}", distributor.channel());

    let driver = InfraDriver::new(&config.paths.infra_file, distributor)
        .with_service_prefix(config.naming.service_prefix.clone());

    Ok(Fleet {
        config,
        catalog,
        state_store,
        driver,
        snapshots,
    })
}

/// Builds the distribution side channel from configuration.
fn build_distributor(config: &FleetConfig) -> Result<Box<dyn Distributor>> {
    let mut chain = DistributorChain::new();

    if config.distribution.mode == DistributionMode::Git {
        let git = GitDistributor::new(&config.paths.repo_dir)
            .with_remote(config.distribution.remote.clone())
            .with_branch(config.distribution.branch.clone())
            .with_timeout(config.distribution.timeout_secs)
            .with_paths(vec![
                config.paths.infra_file.clone(),
                config.paths.state_file.clone(),
                config.paths.backup_dir.clone(),
            ]);
        chain = chain.then(git);
    }

    if let (Some(app_id), Some(token)) = (
        config.platform.app_id.as_deref(),
        ConfigParser::platform_token(config)?,
    ) {
        let platform = PlatformDistributor::new(
            &config.platform.api_url,
            app_id,
            &token,
            config.platform.timeout_secs,
        )?;
        chain = chain.then(platform);
    }

    if chain.is_empty() {
        debug!("No distribution configured; changes stay local");
        return Ok(Box::new(RecordingDistributor::new()));
    }
    Ok(Box::new(chain))
}
