//! The instance catalog.
//!
//! Built-in entries come first in their declared order; community entries
//! are appended as they are registered and live only for the process lifetime.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, info};

use crate::error::{CatalogError, Result};

use super::builtin::{builtin_definitions, DEFAULT_COMMUNITY_PORT_BASE};
use super::definition::{is_valid_name, InstanceDefinition, TrustTier};

/// A request to add a community definition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CommunityRegistration {
    /// Catalog key.
    pub name: String,
    /// Package reference.
    pub package: String,
    /// Human description.
    pub description: String,
    /// Capability tags.
    #[serde(default)]
    pub capabilities: Vec<String>,
    /// Explicit port; auto-assigned when absent.
    #[serde(default)]
    pub port: Option<u16>,
}

/// Catalog of deployable instance definitions.
#[derive(Debug, Clone)]
pub struct Catalog {
    /// Definitions in listing order.
    entries: Vec<InstanceDefinition>,
    /// Lowest port considered for auto-assignment.
    port_base: u16,
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new()
    }
}

impl Catalog {
    /// Creates a catalog holding the built-in definitions.
    #[must_use]
    pub fn new() -> Self {
        Self::with_port_base(DEFAULT_COMMUNITY_PORT_BASE)
    }

    /// Creates a catalog with a custom community port base.
    #[must_use]
    pub fn with_port_base(port_base: u16) -> Self {
        Self {
            entries: builtin_definitions(),
            port_base,
        }
    }

    /// Looks up a definition by name, ignoring case.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<&InstanceDefinition> {
        let key = name.to_lowercase();
        self.entries.iter().find(|d| d.name == key)
    }

    /// Returns all names in listing order.
    #[must_use]
    pub fn list_names(&self) -> Vec<&str> {
        self.entries.iter().map(|d| d.name.as_str()).collect()
    }

    /// Returns all definitions in listing order.
    #[must_use]
    pub fn definitions(&self) -> &[InstanceDefinition] {
        &self.entries
    }

    /// Number of definitions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the catalog has no definitions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Searches display names, descriptions and capability tags.
    ///
    /// Matching is a case-insensitive substring test; every definition
    /// appears at most once, in listing order.
    #[must_use]
    pub fn search(&self, query: &str) -> Vec<&InstanceDefinition> {
        let needle = query.to_lowercase();
        self.entries.iter().filter(|d| d.matches(&needle)).collect()
    }

    /// Registers (or silently replaces) a community definition.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is invalid, belongs to a built-in
    /// definition, or no free port can be assigned.
    pub fn register_community(
        &mut self,
        registration: CommunityRegistration,
    ) -> Result<&InstanceDefinition> {
        let name = registration.name.to_lowercase();

        if !is_valid_name(&name) {
            return Err(CatalogError::InvalidName {
                reason: String::from("must be lowercase alphanumeric with hyphens"),
                name,
            }
            .into());
        }

        let existing = self.entries.iter().position(|d| d.name == name);
        if let Some(idx) = existing
            && self.entries[idx].is_official()
        {
            return Err(CatalogError::BuiltinCollision { name }.into());
        }

        let port = match registration.port {
            Some(port) => port,
            None => self.next_free_port(existing).ok_or_else(|| CatalogError::NoFreePort {
                name: name.clone(),
                base: self.port_base,
            })?,
        };

        let definition = InstanceDefinition {
            display_name: name.clone(),
            run_command: format!("uvx {}", registration.package),
            package: registration.package,
            description: registration.description,
            tier: TrustTier::Community,
            image: None,
            default_port: port,
            env: BTreeMap::new(),
            capabilities: registration.capabilities,
            source_repo: None,
            name,
        };

        let idx = if let Some(idx) = existing {
            debug!("Replacing community definition '{}'", definition.name);
            self.entries[idx] = definition;
            idx
        } else {
            self.entries.push(definition);
            self.entries.len() - 1
        };

        let registered = &self.entries[idx];
        info!(
            "Registered community instance '{}' on port {}",
            registered.name, registered.default_port
        );
        Ok(registered)
    }

    /// Smallest port at or above the base not used by any definition,
    /// ignoring the entry at `replacing`.
    fn next_free_port(&self, replacing: Option<usize>) -> Option<u16> {
        let taken: HashSet<u16> = self
            .entries
            .iter()
            .enumerate()
            .filter(|(i, _)| Some(*i) != replacing)
            .map(|(_, d)| d.default_port)
            .collect();

        (self.port_base..=u16::MAX).find(|p| !taken.contains(p))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FleetError;

    fn registration(name: &str, port: Option<u16>) -> CommunityRegistration {
        CommunityRegistration {
            name: name.to_string(),
            package: format!("{name}-mcp"),
            description: format!("Community {name} server"),
            capabilities: vec![String::from("weather_lookup")],
            port,
        }
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let catalog = Catalog::new();
        assert_eq!(catalog.lookup("GitHub").map(|d| d.default_port), Some(8085));
        assert!(catalog.lookup("gitlab").is_none());
    }

    #[test]
    fn test_list_names_keeps_builtin_order() {
        let catalog = Catalog::new();
        let names = catalog.list_names();
        assert_eq!(names.first(), Some(&"fetch"));
        assert_eq!(names.last(), Some(&"stripe"));
        assert_eq!(names.len(), 8);
    }

    #[test]
    fn test_search_git_matches_name_description_and_tags() {
        let catalog = Catalog::new();
        let names: Vec<&str> = catalog.search("git").iter().map(|d| d.name.as_str()).collect();
        // "git" matches both the git-operations entry and GitHub by display name.
        assert_eq!(names, vec!["git", "github"]);
    }

    #[test]
    fn test_search_by_capability() {
        let catalog = Catalog::new();
        let results = catalog.search("SUBSCRIPTIONS");
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].name, "stripe");
    }

    #[test]
    fn test_search_returns_each_definition_once() {
        let catalog = Catalog::new();
        // "slack" appears in the name, description and every tag.
        assert_eq!(catalog.search("slack").len(), 1);
    }

    #[test]
    fn test_register_assigns_next_free_port() {
        let mut catalog = Catalog::new();
        let first = catalog
            .register_community(registration("weather", None))
            .map(|d| d.default_port)
            .expect("registration failed");
        assert_eq!(first, 8088);

        catalog
            .register_community(registration("pinned", Some(8089)))
            .expect("registration failed");
        let third = catalog
            .register_community(registration("calendar", None))
            .map(|d| d.default_port)
            .expect("registration failed");
        assert_eq!(third, 8090);

        assert_eq!(catalog.list_names().last(), Some(&"calendar"));
    }

    #[test]
    fn test_register_replaces_community_entry_in_place() {
        let mut catalog = Catalog::new();
        catalog
            .register_community(registration("weather", None))
            .expect("registration failed");
        let mut updated = registration("weather", None);
        updated.description = String::from("Updated");
        let def = catalog.register_community(updated).expect("replace failed");

        assert_eq!(def.description, "Updated");
        assert_eq!(def.default_port, 8088);
        assert_eq!(catalog.len(), 9);
    }

    #[test]
    fn test_register_rejects_builtin_name() {
        let mut catalog = Catalog::new();
        let result = catalog.register_community(registration("GIT", None));
        assert!(matches!(
            result,
            Err(FleetError::Catalog(CatalogError::BuiltinCollision { .. }))
        ));
        assert_eq!(catalog.len(), 8);
    }

    #[test]
    fn test_register_fails_without_free_port() {
        let mut catalog = Catalog::with_port_base(u16::MAX);
        catalog
            .register_community(registration("first", None))
            .expect("first registration should take the last port");
        let result = catalog.register_community(registration("second", None));
        assert!(matches!(
            result,
            Err(FleetError::Catalog(CatalogError::NoFreePort { .. }))
        ));
    }
}
