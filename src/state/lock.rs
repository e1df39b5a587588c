//! Operation locking for the fleet.
//!
//! Mutating operations (add, remove, rollback) run under a lock so that at
//! most one of them is in flight, whether the callers share a process or not.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;
use tracing::warn;
use uuid::Uuid;

use crate::error::Result;

use super::store::StateStore;

/// Lock expiry duration in seconds.
pub const LOCK_EXPIRY_SECS: i64 = 300; // 5 minutes

/// Information about a fleet lock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockInfo {
    /// Unique lock identifier.
    pub lock_id: String,
    /// Who holds the lock.
    pub holder: String,
    /// Operation being performed under the lock.
    #[serde(default)]
    pub operation: String,
    /// When the lock was acquired.
    pub acquired_at: DateTime<Utc>,
    /// When the lock expires.
    pub expires_at: DateTime<Utc>,
}

impl LockInfo {
    /// Creates a new lock info.
    #[must_use]
    pub fn new(holder: &str, operation: &str) -> Self {
        let now = Utc::now();
        Self {
            lock_id: Uuid::new_v4().to_string(),
            holder: holder.to_string(),
            operation: operation.to_string(),
            acquired_at: now,
            expires_at: now + chrono::Duration::seconds(LOCK_EXPIRY_SECS),
        }
    }

    /// Checks if the lock has expired.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }

    /// Returns the remaining time until expiry in seconds.
    #[must_use]
    pub fn remaining_secs(&self) -> i64 {
        let remaining = self.expires_at - Utc::now();
        remaining.num_seconds().max(0)
    }
}

/// Generates a unique holder identifier for the current process.
#[must_use]
pub fn generate_holder_id() -> String {
    let hostname = hostname::get().map_or_else(|_| String::from("unknown"), |h| h.to_string_lossy().to_string());

    let pid = std::process::id();
    let uuid = &Uuid::new_v4().to_string()[..8];

    format!("{hostname}-{pid}-{uuid}")
}

/// Runs `op` while holding the store's lock.
///
/// The lock is released whether `op` succeeds or fails. A failure to release
/// is logged; the lock then expires on its own.
///
/// # Errors
///
/// Returns an error if the lock is held elsewhere, or whatever `op` returns.
pub async fn with_lock<S, T, F, Fut>(store: &S, operation: &str, op: F) -> Result<T>
where
    S: StateStore + ?Sized,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let lock = store.acquire_lock(&generate_holder_id(), operation).await?;
    let result = op().await;
    if let Err(e) = store.release_lock(&lock.lock_id).await {
        warn!("Failed to release fleet lock {}: {e}", lock.lock_id);
    }
    result
}
