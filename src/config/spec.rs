//! Configuration types for the fleet manager.
//!
//! This module defines the structs that map to the `fleet.yaml` file. Every
//! section is optional; an absent file yields the defaults below.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::catalog::{CommunityRegistration, DEFAULT_COMMUNITY_PORT_BASE};
use crate::driver::{DEFAULT_GIT_TIMEOUT_SECS, DEFAULT_PLATFORM_TIMEOUT_SECS, DEFAULT_SERVICE_PREFIX};
use crate::reconciler::{DEFAULT_MONTHLY_UNIT_COST, DEFAULT_URL_TEMPLATE};

/// The root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FleetConfig {
    /// Locations of the persisted artifacts.
    pub paths: PathsConfig,
    /// Service and URL naming.
    pub naming: NamingConfig,
    /// Catalog extensions.
    pub catalog: CatalogConfig,
    /// Cost estimation.
    pub pricing: PricingConfig,
    /// Distribution side channel.
    pub distribution: DistributionConfig,
    /// Optional platform deployment trigger.
    pub platform: PlatformConfig,
}

/// Locations of the persisted artifacts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PathsConfig {
    /// Declarative infrastructure file.
    pub infra_file: PathBuf,
    /// Fleet state file.
    pub state_file: PathBuf,
    /// Snapshot directory.
    pub backup_dir: PathBuf,
    /// Working tree used by the side channel.
    pub repo_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            infra_file: PathBuf::from("app.yaml"),
            state_file: PathBuf::from("config/deployed-servers.json"),
            backup_dir: PathBuf::from("backups"),
            repo_dir: PathBuf::from("."),
        }
    }
}

impl PathsConfig {
    /// Resolves every relative path against `base`.
    pub fn resolve_against(&mut self, base: &Path) {
        for path in [
            &mut self.infra_file,
            &mut self.state_file,
            &mut self.backup_dir,
            &mut self.repo_dir,
        ] {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
    }
}

/// Service and URL naming.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct NamingConfig {
    /// Prefix prepended to instance names in service blocks.
    pub service_prefix: String,
    /// Public URL template; `{name}` is replaced by the instance name.
    pub url_template: String,
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            service_prefix: DEFAULT_SERVICE_PREFIX.to_string(),
            url_template: DEFAULT_URL_TEMPLATE.to_string(),
        }
    }
}

/// Catalog extensions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CatalogConfig {
    /// First port handed out to community entries.
    pub community_port_base: u16,
    /// Community entries registered at startup, in order.
    pub community: Vec<CommunityRegistration>,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            community_port_base: DEFAULT_COMMUNITY_PORT_BASE,
            community: Vec::new(),
        }
    }
}

/// Cost estimation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PricingConfig {
    /// Monthly cost of one instance.
    pub monthly_unit_cost: f64,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            monthly_unit_cost: DEFAULT_MONTHLY_UNIT_COST,
        }
    }
}

/// Distribution modes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum DistributionMode {
    /// Commit and push with git.
    #[default]
    Git,
    /// Keep changes local.
    None,
}

impl std::str::FromStr for DistributionMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "git" => Ok(Self::Git),
            "none" => Ok(Self::None),
            other => Err(format!("unknown distribution mode '{other}'")),
        }
    }
}

/// Distribution side channel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DistributionConfig {
    /// How changes are propagated.
    pub mode: DistributionMode,
    /// Git remote to push to.
    pub remote: String,
    /// Branch to push; the current branch when unset.
    pub branch: Option<String>,
    /// Timeout for each git command.
    pub timeout_secs: u64,
}

impl Default for DistributionConfig {
    fn default() -> Self {
        Self {
            mode: DistributionMode::Git,
            remote: String::from("origin"),
            branch: None,
            timeout_secs: DEFAULT_GIT_TIMEOUT_SECS,
        }
    }
}

/// Platform deployment trigger.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PlatformConfig {
    /// Base URL of the platform API.
    pub api_url: String,
    /// App to redeploy; the trigger is skipped when unset.
    pub app_id: Option<String>,
    /// Environment variable holding the API token.
    pub token_env: String,
    /// Request timeout.
    pub timeout_secs: u64,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            api_url: String::from("https://api.digitalocean.com/v2"),
            app_id: None,
            token_env: String::from("DIGITALOCEAN_TOKEN"),
            timeout_secs: DEFAULT_PLATFORM_TIMEOUT_SECS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = FleetConfig::default();
        assert_eq!(config.paths.infra_file, PathBuf::from("app.yaml"));
        assert_eq!(config.naming.service_prefix, "mcp-");
        assert_eq!(config.catalog.community_port_base, 8088);
        assert_eq!(config.distribution.mode, DistributionMode::Git);
        assert!(config.platform.app_id.is_none());
    }

    #[test]
    fn test_resolve_against_keeps_absolute_paths() {
        let mut paths = PathsConfig {
            infra_file: PathBuf::from("/srv/app.yaml"),
            ..PathsConfig::default()
        };
        paths.resolve_against(Path::new("/work"));

        assert_eq!(paths.infra_file, PathBuf::from("/srv/app.yaml"));
        assert_eq!(paths.state_file, PathBuf::from("/work/config/deployed-servers.json"));
        assert_eq!(paths.repo_dir, PathBuf::from("/work/."));
    }

    #[test]
    fn test_distribution_mode_from_str() {
        assert_eq!("GIT".parse::<DistributionMode>(), Ok(DistributionMode::Git));
        assert_eq!("none".parse::<DistributionMode>(), Ok(DistributionMode::None));
        assert!("svn".parse::<DistributionMode>().is_err());
    }
}
