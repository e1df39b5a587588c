//! Fleet state types.
//!
//! The fleet state is the single authoritative record of which instances are
//! deployed. On disk it is a JSON object keyed by instance name, written and
//! read as a whole. Entry order is preserved across a round trip.

use chrono::{DateTime, Utc};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

use crate::catalog::InstanceDefinition;

/// Deployment status of a record.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    /// Deployed and serving.
    Active,
    /// Marked failed by an operator or external tooling.
    Failed,
}

/// A single deployed instance.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeploymentRecord {
    /// Snapshot of the catalog definition at deploy time.
    pub info: InstanceDefinition,
    /// Environment after merging overrides.
    pub env_vars: BTreeMap<String, String>,
    /// When the instance was deployed.
    pub deployed_at: DateTime<Utc>,
    /// Current status.
    pub status: RecordStatus,
    /// Hash of the descriptor that was applied.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub descriptor_hash: Option<String>,
}

/// The set of deployed instances, in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FleetState {
    records: Vec<(String, DeploymentRecord)>,
}

impl DeploymentRecord {
    /// Creates an active record stamped with the current time.
    #[must_use]
    pub fn active(
        info: InstanceDefinition,
        env_vars: BTreeMap<String, String>,
        descriptor_hash: String,
    ) -> Self {
        Self {
            info,
            env_vars,
            deployed_at: Utc::now(),
            status: RecordStatus::Active,
            descriptor_hash: Some(descriptor_hash),
        }
    }

    /// Checks if the record is active.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        matches!(self.status, RecordStatus::Active)
    }
}

impl FleetState {
    /// Creates an empty fleet state.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            records: Vec::new(),
        }
    }

    /// Gets a record by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&DeploymentRecord> {
        self.records
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, record)| record)
    }

    /// Checks whether a name is present.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Inserts a record, replacing an existing one in place.
    pub fn insert(&mut self, name: impl Into<String>, record: DeploymentRecord) {
        let name = name.into();
        if let Some(slot) = self.records.iter_mut().find(|(n, _)| *n == name) {
            slot.1 = record;
        } else {
            self.records.push((name, record));
        }
    }

    /// Removes a record by name.
    pub fn remove(&mut self, name: &str) -> Option<DeploymentRecord> {
        let idx = self.records.iter().position(|(n, _)| n == name)?;
        Some(self.records.remove(idx).1)
    }

    /// Iterates over `(name, record)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &DeploymentRecord)> {
        self.records.iter().map(|(n, r)| (n.as_str(), r))
    }

    /// Returns all names in insertion order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.records.iter().map(|(n, _)| n.as_str()).collect()
    }

    /// Returns the number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if no instance is deployed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Returns the number of active records.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.records.iter().filter(|(_, r)| r.is_active()).count()
    }
}

impl Serialize for FleetState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.records.len()))?;
        for (name, record) in &self.records {
            map.serialize_entry(name, record)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for FleetState {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(FleetStateVisitor)
    }
}

struct FleetStateVisitor;

impl<'de> Visitor<'de> for FleetStateVisitor {
    type Value = FleetState;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a map of instance name to deployment record")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut state = FleetState::new();
        while let Some((name, record)) = access.next_entry::<String, DeploymentRecord>()? {
            state.insert(name, record);
        }
        Ok(state)
    }
}

impl fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = match self {
            Self::Active => "active",
            Self::Failed => "failed",
        };
        write!(f, "{status}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;

    fn record(name: &str) -> DeploymentRecord {
        let catalog = Catalog::new();
        let info = catalog.lookup(name).cloned().expect("builtin exists");
        let env = info.env.clone();
        DeploymentRecord::active(info, env, String::from("abc"))
    }

    #[test]
    fn test_serialization_preserves_insertion_order() {
        let mut state = FleetState::new();
        state.insert("stripe", record("stripe"));
        state.insert("fetch", record("fetch"));
        state.insert("memory", record("memory"));

        let json = serde_json::to_string(&state).expect("serialize");
        let parsed: FleetState = serde_json::from_str(&json).expect("deserialize");

        assert_eq!(parsed.names(), vec!["stripe", "fetch", "memory"]);
        assert_eq!(parsed, state);
    }

    #[test]
    fn test_wire_format_is_keyed_by_name() {
        let mut state = FleetState::new();
        state.insert("github", record("github"));

        let value = serde_json::to_value(&state).expect("serialize");
        let entry = &value["github"];
        assert_eq!(entry["status"], "active");
        assert_eq!(entry["info"]["default_port"], 8085);
        assert!(entry["deployed_at"].is_string());
        assert!(entry["env_vars"].is_object());
    }

    #[test]
    fn test_record_without_hash_parses() {
        let mut value = serde_json::to_value(record("git")).expect("serialize");
        value
            .as_object_mut()
            .expect("record is an object")
            .remove("descriptor_hash");

        let parsed: DeploymentRecord = serde_json::from_value(value).expect("deserialize");
        assert!(parsed.descriptor_hash.is_none());
    }

    #[test]
    fn test_insert_replaces_in_place_and_remove() {
        let mut state = FleetState::new();
        state.insert("git", record("git"));
        state.insert("slack", record("slack"));
        state.insert("git", record("git"));

        assert_eq!(state.names(), vec!["git", "slack"]);
        assert!(state.remove("git").is_some());
        assert!(state.remove("git").is_none());
        assert_eq!(state.len(), 1);
    }
}
