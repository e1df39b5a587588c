//! Output formatting for CLI commands.
//!
//! This module provides formatting utilities for displaying
//! information to the user in various formats.

use colored::Colorize;
use std::fmt::Write;
use tabled::{Table, Tabled};

use crate::reconciler::{CatalogMatch, DriftReport, FleetStatus};
use crate::snapshot::{RollbackOutcome, Snapshot, SnapshotSummary};
use crate::state::{DeploymentRecord, LockInfo, RecordStatus};
use crate::template::AddressTable;

use super::commands::OutputFormat;

/// Output formatter for CLI.
#[derive(Debug)]
pub struct OutputFormatter {
    /// Output format.
    format: OutputFormat,
}

/// Deployed instance row for table display.
#[derive(Tabled)]
struct InstanceRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Port")]
    port: u16,
    #[tabled(rename = "Package")]
    package: String,
    #[tabled(rename = "Deployed")]
    deployed_at: String,
}

/// Catalog entry row for table display.
#[derive(Tabled)]
struct CatalogRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Tier")]
    tier: String,
    #[tabled(rename = "Port")]
    port: u16,
    #[tabled(rename = "Deployed")]
    deployed: String,
    #[tabled(rename = "Description")]
    description: String,
}

/// Snapshot row for table display.
#[derive(Tabled)]
struct SnapshotRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Created")]
    created_at: String,
    #[tabled(rename = "Instances")]
    instances: usize,
    #[tabled(rename = "Description")]
    description: String,
}

impl OutputFormatter {
    /// Creates a new output formatter.
    #[must_use]
    pub const fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Formats the result of a successful `add`.
    #[must_use]
    pub fn format_added(&self, name: &str, record: &DeploymentRecord, url: &str) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(&serde_json::json!({
                "status": "added",
                "name": name,
                "url": url,
                "record": record,
            }))
            .unwrap_or_default(),
            OutputFormat::Text => {
                let mut output = format!(
                    "{} Added {} ({})\n",
                    "✓".green(),
                    record.info.display_name.bold(),
                    name
                );
                let _ = writeln!(output, "   Port: {}", record.info.default_port);
                let _ = writeln!(output, "   URL:  {url}");
                if !record.env_vars.is_empty() {
                    let keys: Vec<&str> = record.env_vars.keys().map(String::as_str).collect();
                    let _ = writeln!(output, "   Env:  {}", keys.join(", "));
                }
                output
            }
        }
    }

    /// Formats the result of a successful `remove`.
    #[must_use]
    pub fn format_removed(&self, name: &str, record: &DeploymentRecord) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(&serde_json::json!({
                "status": "removed",
                "name": name,
                "record": record,
            }))
            .unwrap_or_default(),
            OutputFormat::Text => format!(
                "{} Removed {} ({})\n",
                "✓".green(),
                record.info.display_name.bold(),
                name
            ),
        }
    }

    /// Formats the deployed instances.
    #[must_use]
    pub fn format_active(&self, records: &[(String, DeploymentRecord)]) -> String {
        match self.format {
            OutputFormat::Json => {
                let map: serde_json::Map<String, serde_json::Value> = records
                    .iter()
                    .map(|(name, record)| {
                        (name.clone(), serde_json::to_value(record).unwrap_or_default())
                    })
                    .collect();
                serde_json::to_string_pretty(&map).unwrap_or_default()
            }
            OutputFormat::Text => {
                if records.is_empty() {
                    return String::from("No MCP servers deployed.\n");
                }

                let rows: Vec<InstanceRow> = records
                    .iter()
                    .map(|(name, record)| InstanceRow {
                        name: name.clone(),
                        status: Self::format_record_status(record.status),
                        port: record.info.default_port,
                        package: Self::truncate(&record.info.package, 40),
                        deployed_at: record.deployed_at.format("%Y-%m-%d %H:%M").to_string(),
                    })
                    .collect();

                let mut output = format!("\nDeployed MCP servers ({}):\n\n", records.len());
                output.push_str(&Table::new(rows).to_string());
                output.push('\n');
                output
            }
        }
    }

    /// Formats catalog entries.
    #[must_use]
    pub fn format_catalog(&self, matches: &[CatalogMatch<'_>]) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(matches).unwrap_or_default(),
            OutputFormat::Text => {
                if matches.is_empty() {
                    return String::from("No matching MCP servers.\n");
                }

                let rows: Vec<CatalogRow> = matches
                    .iter()
                    .map(|m| CatalogRow {
                        name: m.definition.name.clone(),
                        tier: m.definition.tier.to_string(),
                        port: m.definition.default_port,
                        deployed: if m.deployed {
                            "✓".green().to_string()
                        } else {
                            String::new()
                        },
                        description: Self::truncate(&m.definition.description, 50),
                    })
                    .collect();

                let mut output = Table::new(rows).to_string();
                output.push('\n');
                output
            }
        }
    }

    /// Formats the fleet summary.
    #[must_use]
    pub fn format_status(&self, status: &FleetStatus) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(status).unwrap_or_default(),
            OutputFormat::Text => {
                let mut output = String::from("\nMCP fleet status\n\n");
                let _ = writeln!(output, "   Available: {}", status.catalog_size);
                let _ = writeln!(output, "   Deployed:  {}", status.active_count);
                let _ = writeln!(
                    output,
                    "   Estimated monthly cost: ${:.2}",
                    status.estimated_cost
                );
                output
            }
        }
    }

    /// Formats the address table.
    ///
    /// Text output is the `name=url` block consumed by agent configuration.
    #[must_use]
    pub fn format_addresses(&self, table: &AddressTable) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(table).unwrap_or_default(),
            OutputFormat::Text => table.to_key_value_block(),
        }
    }

    /// Formats a drift report.
    #[must_use]
    pub fn format_drift(&self, report: &DriftReport) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(report).unwrap_or_default(),
            OutputFormat::Text => {
                if report.is_converged() {
                    format!("{} {report}\n", "✓".green())
                } else {
                    format!("{} {report}", "⚠".yellow())
                }
            }
        }
    }

    /// Formats a newly taken snapshot.
    #[must_use]
    pub fn format_snapshot_created(&self, snapshot: &Snapshot) -> String {
        let summary = snapshot.summary();
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(&summary).unwrap_or_default(),
            OutputFormat::Text => format!(
                "{} Backup created: {} ({} instance(s))\n",
                "✓".green(),
                summary.id.bold(),
                summary.instance_count
            ),
        }
    }

    /// Formats the snapshot listing.
    #[must_use]
    pub fn format_snapshots(&self, snapshots: &[SnapshotSummary]) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(snapshots).unwrap_or_default(),
            OutputFormat::Text => {
                if snapshots.is_empty() {
                    return String::from("No backups found.\n");
                }

                let rows: Vec<SnapshotRow> = snapshots
                    .iter()
                    .map(|s| SnapshotRow {
                        id: s.id.clone(),
                        created_at: s.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                        instances: s.instance_count,
                        description: Self::truncate(&s.description, 40),
                    })
                    .collect();

                let mut output = Table::new(rows).to_string();
                output.push('\n');
                output
            }
        }
    }

    /// Formats a completed rollback.
    #[must_use]
    pub fn format_rollback(&self, outcome: &RollbackOutcome) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(outcome).unwrap_or_default(),
            OutputFormat::Text => {
                let mut output = format!(
                    "{} Rolled back to {}\n",
                    "✓".green(),
                    outcome.restored.bold()
                );
                let _ = writeln!(output, "   Previous state saved as {}", outcome.pre_rollback);
                output
            }
        }
    }

    /// Formats the ids removed by `prune`.
    #[must_use]
    pub fn format_pruned(&self, deleted: &[String]) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(deleted).unwrap_or_default(),
            OutputFormat::Text => {
                if deleted.is_empty() {
                    return String::from("Nothing to prune.\n");
                }
                let mut output = format!("{} Pruned {} backup(s):\n", "✓".green(), deleted.len());
                for id in deleted {
                    let _ = writeln!(output, "   - {id}");
                }
                output
            }
        }
    }

    /// Formats the operation lock.
    #[must_use]
    pub fn format_lock(&self, lock: Option<&LockInfo>) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(&lock).unwrap_or_default(),
            OutputFormat::Text => match lock {
                None => String::from("Fleet is not locked.\n"),
                Some(lock) => {
                    let mut output = format!("{} Fleet is locked\n", "⚠".yellow());
                    let _ = writeln!(output, "   Holder:    {}", lock.holder);
                    let _ = writeln!(output, "   Operation: {}", lock.operation);
                    let _ = writeln!(output, "   Acquired:  {}", lock.acquired_at);
                    if lock.is_expired() {
                        let _ = writeln!(output, "   Expired:   {}", "yes".red());
                    } else {
                        let _ = writeln!(output, "   Expires in {}s", lock.remaining_secs());
                    }
                    output
                }
            },
        }
    }

    /// Formats a record status with color.
    fn format_record_status(status: RecordStatus) -> String {
        match status {
            RecordStatus::Active => "active".green().to_string(),
            RecordStatus::Failed => "failed".red().to_string(),
        }
    }

    /// Truncates a string to a maximum number of characters.
    fn truncate(s: &str, max_len: usize) -> String {
        if s.chars().count() <= max_len {
            s.to_string()
        } else {
            let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
            format!("{head}...")
        }
    }

    /// Formats a success message.
    #[must_use]
    pub fn success(&self, message: &str) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(
                &serde_json::json!({ "status": "success", "message": message }),
            )
            .unwrap_or_default(),
            OutputFormat::Text => format!("{} {message}", "✓".green()),
        }
    }

    /// Formats an error message.
    #[must_use]
    pub fn error(&self, message: &str) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(
                &serde_json::json!({ "status": "error", "message": message }),
            )
            .unwrap_or_default(),
            OutputFormat::Text => format!("{} {message}", "✗".red()),
        }
    }
}
