//! Snapshot and rollback module.
//!
//! Snapshots are append-only captures of the infrastructure file and the
//! fleet state. Retention is manual: nothing is deleted unless `prune` is
//! called.

mod manager;
mod store;
mod types;

pub use manager::{
    RollbackOutcome, SnapshotManager, DEFAULT_BACKUP_DESCRIPTION, PRE_ROLLBACK_DESCRIPTION,
};
pub use store::SnapshotStore;
pub use types::{is_valid_snapshot_id, snapshot_id, Snapshot, SnapshotSummary, SNAPSHOT_ID_PREFIX};
