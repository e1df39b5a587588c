//! Deployment driver module.
//!
//! This module turns descriptors into infrastructure file mutations and
//! propagates them through a distribution side channel.

mod distributor;
mod git;
mod infra;
mod platform;

pub use distributor::{Distributor, DistributorChain, RecordingDistributor};
#[cfg(test)]
pub use distributor::MockDistributor;
pub use git::{GitDistributor, DEFAULT_GIT_TIMEOUT_SECS};
pub use infra::{InfraDriver, DEFAULT_SERVICE_PREFIX};
pub use platform::{PlatformDistributor, DEFAULT_PLATFORM_TIMEOUT_SECS};
