//! Descriptor hashing for change detection.
//!
//! A deterministic hash of a descriptor is recorded with each deployment so
//! that a re-add can be compared byte-for-byte and drift can be reported.

use sha2::{Digest, Sha256};

use super::descriptor::DeploymentDescriptor;

/// Hasher for computing descriptor hashes.
#[derive(Debug, Default)]
pub struct DescriptorHasher;

impl DescriptorHasher {
    /// Creates a new descriptor hasher.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Computes a hash of the descriptor together with its service name.
    #[must_use]
    pub fn hash_descriptor(&self, service_name: &str, descriptor: &DeploymentDescriptor) -> String {
        let mut hasher = Sha256::new();

        // Length-prefix every field so adjacent values cannot collide
        let mut field = |bytes: &[u8]| {
            hasher.update((bytes.len() as u64).to_be_bytes());
            hasher.update(bytes);
        };

        field(service_name.as_bytes());
        field(descriptor.display_name.as_bytes());
        field(descriptor.description.as_bytes());
        field(descriptor.run_command.as_bytes());
        field(&descriptor.port.to_be_bytes());
        field(descriptor.health_check_path.as_bytes());
        field(descriptor.tier.to_string().as_bytes());

        // Counts keep entries from sliding between env and capabilities.
        // BTreeMap iteration is already sorted.
        field(&(descriptor.env.len() as u64).to_be_bytes());
        for (key, value) in &descriptor.env {
            field(key.as_bytes());
            field(value.as_bytes());
        }

        field(&(descriptor.capabilities.len() as u64).to_be_bytes());
        for cap in &descriptor.capabilities {
            field(cap.as_bytes());
        }

        hex::encode(hasher.finalize())
    }

    /// Computes a short hash (first 8 characters) for display purposes.
    #[must_use]
    pub fn short_hash(&self, hash: &str) -> String {
        hash.chars().take(8).collect()
    }

    /// Compares two hashes to determine if they are equal.
    #[must_use]
    pub fn hashes_match(hash1: &str, hash2: &str) -> bool {
        if hash1.len() != hash2.len() {
            return false;
        }

        hash1
            .bytes()
            .zip(hash2.bytes())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
    }
}
