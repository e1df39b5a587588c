//! CLI command definitions.
//!
//! This module defines all CLI commands and their arguments using clap.

use clap::{Parser, Subcommand};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// mcp-fleet - Catalog, deploy, and roll back MCP server instances.
#[derive(Parser, Debug)]
#[command(name = "mcp-fleet")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the configuration file.
    #[arg(short, long, global = true, env = "FLEET_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json).
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    /// Log format (text, json).
    #[arg(long, global = true, default_value = "text")]
    pub log_format: LogFormat,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Deploy an instance from the catalog.
    Add {
        /// Instance name.
        name: String,

        /// Environment override, repeatable.
        #[arg(short, long = "env", value_name = "KEY=VALUE", value_parser = parse_env_pair)]
        env: Vec<(String, String)>,
    },

    /// Remove a deployed instance.
    Remove {
        /// Instance name.
        name: String,
    },

    /// List deployed instances, or the whole catalog.
    List {
        /// What to list.
        #[arg(value_enum, default_value = "active")]
        scope: ListScope,
    },

    /// Search the catalog.
    Search {
        /// Case-insensitive text matched against names, descriptions, and capabilities.
        query: String,
    },

    /// Show fleet size and estimated cost.
    Status,

    /// Print the address table for downstream agents.
    Addresses,

    /// Compare the fleet state against the infrastructure file.
    Reconcile,

    /// Snapshot the infrastructure file and fleet state.
    Backup {
        /// Free-text description.
        description: Vec<String>,
    },

    /// List snapshots, most recent first.
    ListBackups,

    /// Restore a snapshot.
    Rollback {
        /// Snapshot id.
        id: String,
    },

    /// Delete old snapshots.
    Prune {
        /// Number of most recent snapshots to keep.
        #[arg(long)]
        keep: usize,
    },

    /// Show the operation lock.
    LockInfo,

    /// Release the operation lock.
    Unlock {
        /// Release even if another operation holds it (dangerous).
        #[arg(long)]
        force: bool,
    },
}

/// Scope of the `list` command.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum ListScope {
    /// Deployed instances.
    #[default]
    Active,
    /// Every catalog entry.
    Available,
}

/// Output format options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
}

/// Log format options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

impl Commands {
    /// Collects `--env` pairs into an override map; later pairs win.
    #[must_use]
    pub fn overrides(pairs: &[(String, String)]) -> BTreeMap<String, String> {
        pairs.iter().cloned().collect()
    }
}

fn parse_env_pair(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{s}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty variable name in '{s}'"));
    }
    Ok((key.to_string(), value.to_string()))
}
