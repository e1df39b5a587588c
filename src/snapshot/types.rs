//! Snapshot types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::state::FleetState;

/// Prefix of every generated snapshot id.
pub const SNAPSHOT_ID_PREFIX: &str = "backup_";

/// Immutable capture of the infrastructure file and fleet state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Snapshot {
    /// Time-ordered identifier.
    pub id: String,
    /// When the snapshot was taken.
    #[serde(rename = "timestamp")]
    pub created_at: DateTime<Utc>,
    /// Free-text description.
    pub description: String,
    /// Captured infrastructure file text.
    #[serde(rename = "app_yaml")]
    pub infra_text: String,
    /// Captured fleet state.
    #[serde(rename = "deployed_servers")]
    pub fleet_state: FleetState,
}

/// Listing entry for a snapshot.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SnapshotSummary {
    /// Snapshot id.
    pub id: String,
    /// When the snapshot was taken.
    pub created_at: DateTime<Utc>,
    /// Free-text description.
    pub description: String,
    /// Number of instances in the captured fleet.
    pub instance_count: usize,
}

impl Snapshot {
    /// Creates a snapshot stamped with `created_at`.
    #[must_use]
    pub fn new(
        id: String,
        created_at: DateTime<Utc>,
        description: impl Into<String>,
        infra_text: String,
        fleet_state: FleetState,
    ) -> Self {
        Self {
            id,
            created_at,
            description: description.into(),
            infra_text,
            fleet_state,
        }
    }

    /// Returns the listing entry for this snapshot.
    #[must_use]
    pub fn summary(&self) -> SnapshotSummary {
        SnapshotSummary {
            id: self.id.clone(),
            created_at: self.created_at,
            description: self.description.clone(),
            instance_count: self.fleet_state.len(),
        }
    }
}

/// Builds the id for a snapshot taken at `at`.
///
/// Ids sort lexicographically in creation order.
#[must_use]
pub fn snapshot_id(at: DateTime<Utc>) -> String {
    format!("{SNAPSHOT_ID_PREFIX}{}", at.format("%Y%m%d_%H%M%S_%3f"))
}

/// Checks that an id is safe to use as a file name.
#[must_use]
pub fn is_valid_snapshot_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}
