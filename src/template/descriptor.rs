//! Deployment descriptor templating.
//!
//! Turns a catalog definition plus caller overrides into the concrete,
//! resolved configuration for one instance. Pure and deterministic.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::catalog::{InstanceDefinition, TrustTier};

/// Health-check path served by every instance.
pub const HEALTH_CHECK_PATH: &str = "/health";

/// Address the instance binds to.
const BIND_HOST: &str = "0.0.0.0";

/// Resolved configuration for deploying one instance.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DeploymentDescriptor {
    /// Human-readable name.
    pub display_name: String,
    /// Human description.
    pub description: String,
    /// Full run command including host and port.
    pub run_command: String,
    /// Resolved port.
    pub port: u16,
    /// Defaults merged with overrides; overrides win.
    pub env: BTreeMap<String, String>,
    /// Capability tags.
    pub capabilities: Vec<String>,
    /// Health-check path.
    pub health_check_path: String,
    /// Trust tier of the source definition.
    pub tier: TrustTier,
}

/// Builds a descriptor from a definition and environment overrides.
#[must_use]
pub fn build_descriptor(
    definition: &InstanceDefinition,
    overrides: &BTreeMap<String, String>,
) -> DeploymentDescriptor {
    let port = definition.default_port;

    DeploymentDescriptor {
        display_name: definition.display_name.clone(),
        description: definition.description.clone(),
        run_command: format!("{} --host {BIND_HOST} --port {port}", definition.run_command),
        port,
        env: merge_env(&definition.env, overrides),
        capabilities: definition.capabilities.clone(),
        health_check_path: HEALTH_CHECK_PATH.to_string(),
        tier: definition.tier,
    }
}

/// Right-biased union of two environment maps.
#[must_use]
pub fn merge_env(
    defaults: &BTreeMap<String, String>,
    overrides: &BTreeMap<String, String>,
) -> BTreeMap<String, String> {
    let mut merged = defaults.clone();
    merged.extend(overrides.iter().map(|(k, v)| (k.clone(), v.clone())));
    merged
}
