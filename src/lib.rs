// ============================================================================
// Strict linting - Dangerous or non-idiomatic practices are forbidden
// ============================================================================

#![deny(unsafe_code)]                 // Unsafe code is forbidden
#![warn(missing_docs)]                // All public items must be documented
#![warn(dead_code)]                   // Unused code is flagged
#![deny(non_camel_case_types)]        // Types must follow CamelCase convention

// Additional strictness - Leave nothing unchecked
#![warn(unused_imports)]              // Unused imports are flagged
#![warn(unused_variables)]            // Unused variables are flagged
#![deny(unused_must_use)]             // Must handle Result and Option explicitly
#![deny(non_snake_case)]              // Variables and functions must be snake_case
#![deny(non_upper_case_globals)]      // Constants must be UPPER_CASE
#![deny(nonstandard_style)]           // Non-standard code style is forbidden
#![forbid(unsafe_op_in_unsafe_fn)]    // Unsafe ops in unsafe fns are forbidden

// Clippy lints (warnings only)
#![warn(clippy::all)]                 // All standard Clippy lints
#![warn(clippy::pedantic)]            // Very strict Clippy lints
#![warn(clippy::nursery)]             // Experimental lints
#![warn(clippy::unwrap_used)]         // unwrap() warning
#![warn(clippy::expect_used)]         // expect() warning
#![warn(clippy::panic)]               // panic!() warning
#![warn(clippy::print_stdout)]        // println!() warning
#![warn(clippy::todo)]                // TODO warning
#![warn(clippy::unimplemented)]       // unimplemented!() warning
#![warn(clippy::missing_const_for_fn)] // Force const when possible
#![warn(clippy::unwrap_in_result)]    // unwrap() in Result warning
#![warn(clippy::module_inception)]    // Module with same name as crate warning
#![warn(clippy::redundant_clone)]     // Useless clones warning
#![warn(clippy::shadow_unrelated)]    // Shadowing unrelated variables warning
#![warn(clippy::too_many_arguments)]  // Limit function arguments
#![warn(clippy::cognitive_complexity)] // Limit cognitive complexity

// Safety and robustness lints
#![deny(overflowing_literals)]        // Overflowing literals are forbidden
#![deny(arithmetic_overflow)]         // Arithmetic overflow is forbidden

// ============================================================================
// Crate Documentation
// ============================================================================

//! # MCP Fleet
//!
//! A catalog-driven fleet manager for Model Context Protocol (MCP) server
//! instances hosted on a git-driven application platform.
//!
//! ## Overview
//!
//! The fleet manager lets an operator:
//!
//! - Pick MCP servers from a catalog of official and community definitions
//! - Deploy and remove them by editing one declarative infrastructure file
//! - Publish every change through a git push (and optionally a platform API call)
//! - Snapshot the fleet and roll back to any earlier snapshot
//!
//! ## Architecture
//!
//! Two artifacts must always agree:
//!
//! 1. **Fleet state**: `config/deployed-servers.json`, the authoritative record
//! 2. **Infrastructure file**: `app.yaml`, one service block per instance
//!
//! The [`reconciler`] is the only component that mutates either, and it does so
//! under a lock.
//!
//! ## Modules
//!
//! - [`catalog`]: Built-in and community instance definitions
//! - [`template`]: Descriptor templating, hashing, and the address table
//! - [`infra`]: Format-preserving edits of the infrastructure file
//! - [`driver`]: File driver and distribution side channels (git, platform API)
//! - [`state`]: Fleet state storage and the operation lock
//! - [`reconciler`]: Add, remove, query, and drift detection
//! - [`snapshot`]: Backups, rollback, and pruning
//! - [`config`]: Configuration parsing and validation
//! - [`cli`]: Command-line interface
//!
//! ## Example
//!
//! ```yaml
//! naming:
//!   service_prefix: mcp-
//!   url_template: "https://mcp-{name}-xyz.ondigitalocean.app"
//!
//! catalog:
//!   community:
//!     - name: weather
//!       package: mcp-weather
//!       description: Weather forecasts
//!
//! distribution:
//!   mode: git
//!   remote: origin
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod catalog;
pub mod cli;
pub mod config;
pub mod driver;
pub mod error;
pub mod infra;
pub mod reconciler;
pub mod snapshot;
pub mod state;
pub mod template;

// ============================================================================
// Re-exports
// ============================================================================

pub use catalog::{Catalog, CommunityRegistration, InstanceDefinition, TrustTier};
pub use cli::{Cli, Commands, OutputFormatter};
pub use config::{ConfigParser, ConfigValidator, FleetConfig};
pub use driver::{Distributor, GitDistributor, InfraDriver, PlatformDistributor, RecordingDistributor};
pub use error::{FleetError, Result};
pub use reconciler::{DriftReport, FleetStatus, Reconciler};
pub use snapshot::{RollbackOutcome, Snapshot, SnapshotManager, SnapshotStore};
pub use state::{DeploymentRecord, FleetState, LocalStateStore, StateStore};
pub use template::{build_descriptor, AddressTable, DeploymentDescriptor};
