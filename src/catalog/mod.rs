//! Instance catalog for the fleet manager.
//!
//! This module holds the table of deployable MCP server definitions:
//! - The built-in official entries
//! - Community entries registered at runtime (memory only)
//! - Case-insensitive lookup and substring search

mod builtin;
mod definition;
mod registry;

pub use builtin::{builtin_definitions, DEFAULT_COMMUNITY_PORT_BASE};
pub use definition::{is_valid_name, InstanceDefinition, TrustTier};
pub use registry::{Catalog, CommunityRegistration};
