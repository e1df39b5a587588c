//! State store trait definition.
//!
//! This module defines the common interface for fleet state backends.

use async_trait::async_trait;

use crate::error::Result;
use super::types::FleetState;
use super::lock::LockInfo;

/// Trait for fleet state storage backends.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Loads the fleet state.
    ///
    /// Returns `None` if no state exists yet.
    async fn load(&self) -> Result<Option<FleetState>>;

    /// Saves the fleet state as a whole.
    async fn save(&self, state: &FleetState) -> Result<()>;

    /// Acquires the fleet lock for an operation.
    ///
    /// Returns lock information if successful.
    async fn acquire_lock(&self, holder: &str, operation: &str) -> Result<LockInfo>;

    /// Releases the fleet lock.
    async fn release_lock(&self, lock_id: &str) -> Result<()>;

    /// Gets current lock information if locked.
    async fn get_lock_info(&self) -> Result<Option<LockInfo>>;

    /// Checks if the fleet is locked.
    async fn is_locked(&self) -> Result<bool>;
}
