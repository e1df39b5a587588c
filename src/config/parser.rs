//! Configuration parser for loading and merging configuration files.
//!
//! This module handles loading configuration from YAML files, a `.env` file,
//! and `FLEET_*` environment variables, with later sources taking precedence.

use crate::error::{ConfigError, FleetError, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::spec::FleetConfig;

/// Directory name under the user config dir.
const APP_DIR: &str = "mcp-fleet";

/// Configuration parser for loading fleet configuration.
#[derive(Debug, Default)]
pub struct ConfigParser {
    /// Base path for resolving relative paths.
    base_path: Option<PathBuf>,
}

/// A configuration together with where it came from.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// The resolved configuration.
    pub config: FleetConfig,
    /// The file it was read from, if any.
    pub source: Option<PathBuf>,
}

impl ConfigParser {
    /// Creates a new configuration parser.
    #[must_use]
    pub const fn new() -> Self {
        Self { base_path: None }
    }

    /// Sets the base path for resolving relative paths.
    #[must_use]
    pub fn with_base_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.base_path = Some(path.into());
        self
    }

    fn base_dir(&self) -> PathBuf {
        self.base_path.clone().unwrap_or_else(|| PathBuf::from("."))
    }

    /// Loads configuration from a YAML file. Relative paths in the file are
    /// resolved against the file's directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<FleetConfig> {
        let path = path.as_ref();
        info!("Loading configuration from: {}", path.display());

        if !path.exists() {
            return Err(FleetError::Config(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            }));
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            FleetError::Config(ConfigError::ParseError {
                message: format!("Failed to read file: {e}"),
                location: Some(path.display().to_string()),
            })
        })?;

        let mut config = self.parse_yaml(&content, Some(path))?;
        let base = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map_or_else(|| self.base_dir(), Path::to_path_buf);
        config.paths.resolve_against(&base);
        Ok(config)
    }

    /// Parses configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is invalid.
    pub fn parse_yaml(&self, content: &str, source: Option<&Path>) -> Result<FleetConfig> {
        debug!("Parsing YAML configuration");

        // An empty file is a valid, all-defaults configuration.
        if content.trim().is_empty() {
            return Ok(FleetConfig::default());
        }

        serde_yaml::from_str(content).map_err(|e| {
            let location = source.map(|p| p.display().to_string());
            FleetError::Config(ConfigError::ParseError {
                message: format!("YAML parse error: {e}"),
                location,
            })
        })
    }

    /// Resolves the configuration for this process.
    ///
    /// An explicit path must exist. Otherwise the working directory and its
    /// parents are searched, then the user config directory; when nothing is
    /// found the defaults apply, resolved against the base path. A `.env`
    /// next to the resolved file is loaded before the environment overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if a configuration file cannot be read or parsed, or
    /// an environment override is invalid.
    pub fn load(&self, explicit: Option<&Path>) -> Result<LoadedConfig> {
        let source = match explicit {
            Some(path) => Some(path.to_path_buf()),
            None => find_config_file(self.base_dir())
                .ok()
                .or_else(user_config_file),
        };

        load_dotenv(&self.dotenv_path(source.as_deref()))?;

        let mut config = match &source {
            Some(path) => self.load_file(path)?,
            None => {
                debug!("No configuration file found, using defaults");
                let mut config = FleetConfig::default();
                config.paths.resolve_against(&self.base_dir());
                config
            }
        };

        Self::apply_overrides(&mut config, |key| std::env::var(key).ok())?;
        Ok(LoadedConfig { config, source })
    }

    /// Applies `FLEET_*` overrides using `lookup` to read variables.
    ///
    /// # Errors
    ///
    /// Returns an error if an override has an unusable value.
    pub fn apply_overrides(
        config: &mut FleetConfig,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<()> {
        if let Some(path) = lookup("FLEET_INFRA_FILE") {
            debug!("Overriding paths.infra_file from environment");
            config.paths.infra_file = PathBuf::from(path);
        }

        if let Some(path) = lookup("FLEET_STATE_FILE") {
            debug!("Overriding paths.state_file from environment");
            config.paths.state_file = PathBuf::from(path);
        }

        if let Some(path) = lookup("FLEET_BACKUP_DIR") {
            debug!("Overriding paths.backup_dir from environment");
            config.paths.backup_dir = PathBuf::from(path);
        }

        if let Some(path) = lookup("FLEET_REPO_DIR") {
            debug!("Overriding paths.repo_dir from environment");
            config.paths.repo_dir = PathBuf::from(path);
        }

        if let Some(template) = lookup("FLEET_URL_TEMPLATE") {
            debug!("Overriding naming.url_template from environment");
            config.naming.url_template = template;
        }

        if let Some(mode) = lookup("FLEET_DISTRIBUTION_MODE") {
            debug!("Overriding distribution.mode from environment");
            config.distribution.mode = mode.parse().map_err(|_| ConfigError::InvalidEnvVar {
                name: String::from("FLEET_DISTRIBUTION_MODE"),
                value: mode.clone(),
            })?;
        }

        if let Some(app_id) = lookup("FLEET_PLATFORM_APP_ID") {
            debug!("Overriding platform.app_id from environment");
            config.platform.app_id = Some(app_id).filter(|id| !id.is_empty());
        }

        Ok(())
    }

    /// Returns the `.env` file that belongs to a configuration source: the
    /// one beside the file, or in the base path when there is no file.
    #[must_use]
    pub fn dotenv_path(&self, source: Option<&Path>) -> PathBuf {
        source
            .and_then(Path::parent)
            .filter(|p| !p.as_os_str().is_empty())
            .map_or_else(|| self.base_dir(), Path::to_path_buf)
            .join(".env")
    }

    /// Reads the platform API token when a platform app is configured.
    ///
    /// # Errors
    ///
    /// Returns an error if an app is configured but the token is not set.
    pub fn platform_token(config: &FleetConfig) -> Result<Option<String>> {
        if config.platform.app_id.is_none() {
            return Ok(None);
        }

        let name = &config.platform.token_env;
        std::env::var(name).map(Some).map_err(|_| {
            FleetError::Config(ConfigError::MissingEnvVar {
                name: name.clone(),
            })
        })
    }
}

/// Loads a .env file if present. Variables already set are kept.
fn load_dotenv(env_path: &Path) -> Result<()> {
    if env_path.exists() {
        info!("Loading environment from: {}", env_path.display());
        dotenvy::from_path(env_path).map_err(|e| {
            FleetError::Config(ConfigError::ParseError {
                message: format!("Failed to load .env file: {e}"),
                location: Some(env_path.display().to_string()),
            })
        })?;
    } else {
        debug!(".env file not found at: {}", env_path.display());
    }

    Ok(())
}

/// Default configuration file names to search for.
pub const DEFAULT_CONFIG_FILES: &[&str] = &["fleet.yaml", "fleet.yml", ".mcp-fleet.yaml"];

/// Finds the configuration file in the given directory or its parents.
///
/// # Errors
///
/// Returns an error if no configuration file is found.
pub fn find_config_file(start_dir: impl AsRef<Path>) -> Result<PathBuf> {
    let start = start_dir.as_ref();
    let mut current = start.to_path_buf();

    loop {
        for filename in DEFAULT_CONFIG_FILES {
            let config_path = current.join(filename);
            if config_path.exists() {
                info!("Found configuration file: {}", config_path.display());
                return Ok(config_path);
            }
        }

        if !current.pop() {
            break;
        }
    }

    Err(FleetError::Config(ConfigError::FileNotFound {
        path: start.join(DEFAULT_CONFIG_FILES[0]),
    }))
}

/// Returns the per-user configuration file, if it exists.
#[must_use]
pub fn user_config_file() -> Option<PathBuf> {
    let path = dirs::config_dir()?.join(APP_DIR).join(DEFAULT_CONFIG_FILES[0]);
    path.exists().then_some(path)
}
