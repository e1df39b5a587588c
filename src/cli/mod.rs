//! CLI module for the fleet manager.
//!
//! This module provides the command-line interface for deploying,
//! removing, and rolling back MCP server instances.

mod commands;
mod output;

pub use commands::{Cli, Commands, ListScope, LogFormat, OutputFormat};
pub use output::OutputFormatter;
