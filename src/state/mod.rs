//! State management module for the fleet manager.
//!
//! This module provides persistent storage for the fleet record, which
//! instances are deployed and with what configuration, plus the operation
//! lock that serializes mutating commands.

mod store;
mod local;
mod lock;
mod types;

pub use store::StateStore;
pub use local::LocalStateStore;
pub use lock::{generate_holder_id, with_lock, LockInfo, LOCK_EXPIRY_SECS};
pub use types::{DeploymentRecord, FleetState, RecordStatus};
