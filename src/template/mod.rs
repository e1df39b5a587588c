//! Descriptor templating module.
//!
//! Pure functions that turn catalog definitions into deployment descriptors
//! and turn the fleet state into the address table for downstream agents.

mod address;
mod descriptor;
mod hash;

pub use address::{build_address_table, instance_url, AddressTable, NAME_PLACEHOLDER};
pub use descriptor::{build_descriptor, merge_env, DeploymentDescriptor, HEALTH_CHECK_PATH};
pub use hash::DescriptorHasher;
