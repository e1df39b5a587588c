//! Configuration module for the fleet manager.
//!
//! This module handles all configuration-related functionality:
//! - Parsing and deserializing `fleet.yaml`
//! - Layering `.env` and `FLEET_*` environment overrides
//! - Validation of configuration values

mod spec;
mod parser;
mod validator;

pub use spec::{
    CatalogConfig, DistributionConfig, DistributionMode, FleetConfig, NamingConfig, PathsConfig,
    PlatformConfig, PricingConfig,
};
pub use parser::{find_config_file, user_config_file, ConfigParser, LoadedConfig, DEFAULT_CONFIG_FILES};
pub use validator::{ConfigValidator, ValidationError, ValidationResult};
