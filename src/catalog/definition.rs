//! Instance definition types.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Trust tier of an instance definition.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TrustTier {
    /// Shipped with the catalog.
    Official,
    /// Registered at runtime.
    Community,
}

/// A deployable MCP server definition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InstanceDefinition {
    /// Unique lowercase catalog key (e.g. `github`).
    pub name: String,
    /// Human-readable name.
    pub display_name: String,
    /// Package reference run by the launcher.
    pub package: String,
    /// Human description.
    pub description: String,
    /// Trust tier.
    pub tier: TrustTier,
    /// Optional container image reference.
    #[serde(default)]
    pub image: Option<String>,
    /// Run command template, without host/port arguments.
    pub run_command: String,
    /// Default network port.
    pub default_port: u16,
    /// Default environment variables.
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    /// Capability tags, in declaration order.
    #[serde(default)]
    pub capabilities: Vec<String>,
    /// Optional source repository (`owner/repo`).
    #[serde(default)]
    pub source_repo: Option<String>,
}

impl InstanceDefinition {
    /// Returns true for built-in definitions.
    #[must_use]
    pub const fn is_official(&self) -> bool {
        matches!(self.tier, TrustTier::Official)
    }

    /// Checks whether a lowercase query occurs in the display name,
    /// the description, or any capability tag.
    #[must_use]
    pub fn matches(&self, needle: &str) -> bool {
        self.display_name.to_lowercase().contains(needle)
            || self.description.to_lowercase().contains(needle)
            || self
                .capabilities
                .iter()
                .any(|cap| cap.to_lowercase().contains(needle))
    }
}

impl std::fmt::Display for TrustTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tier = match self {
            Self::Official => "official",
            Self::Community => "community",
        };
        write!(f, "{tier}")
    }
}

/// Validates that a name follows the naming convention.
/// Names must be lowercase alphanumeric with hyphens, starting with a letter.
#[must_use]
pub fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();

    match chars.next() {
        Some(first) if first.is_ascii_lowercase() => {}
        _ => return false,
    }

    if !chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-') {
        return false;
    }

    !name.ends_with('-') && !name.contains("--")
}
