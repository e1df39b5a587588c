//! Service block synthesis.
//!
//! Renders a deployment descriptor as one entry of the `services` list of an
//! app-platform style app description.

use serde::Serialize;

use crate::error::{PersistenceError, Result};
use crate::template::DeploymentDescriptor;

/// Environment variable identifying the instance inside its container.
const SERVER_TYPE_VAR: &str = "MCP_SERVER_TYPE";

/// Smallest instance size offered by the platform.
const INSTANCE_SIZE_SLUG: &str = "basic-xxs";

#[derive(Serialize)]
struct ServiceSpec<'a> {
    name: &'a str,
    source_dir: &'static str,
    run_command: &'a str,
    http_port: u16,
    instance_count: u32,
    instance_size_slug: &'static str,
    health_check: HealthCheckSpec<'a>,
    envs: Vec<EnvSpec<'a>>,
}

#[derive(Serialize)]
struct HealthCheckSpec<'a> {
    http_path: &'a str,
}

#[derive(Serialize)]
struct EnvSpec<'a> {
    key: &'a str,
    value: &'a str,
}

/// Renders the lines of a service block, each ending in a newline.
///
/// The block opens with a blank separator and a comment naming the server,
/// then the list item itself indented by `indent` spaces.
///
/// # Errors
///
/// Returns an error if the block cannot be serialized.
pub fn render_service_block(
    service_name: &str,
    instance_name: &str,
    descriptor: &DeploymentDescriptor,
    indent: usize,
) -> Result<Vec<String>> {
    let mut envs: Vec<EnvSpec<'_>> = descriptor
        .env
        .iter()
        .map(|(key, value)| EnvSpec { key, value })
        .collect();
    if !descriptor.env.contains_key(SERVER_TYPE_VAR) {
        envs.push(EnvSpec {
            key: SERVER_TYPE_VAR,
            value: instance_name,
        });
    }

    let spec = ServiceSpec {
        name: service_name,
        source_dir: "/",
        run_command: &descriptor.run_command,
        http_port: descriptor.port,
        instance_count: 1,
        instance_size_slug: INSTANCE_SIZE_SLUG,
        health_check: HealthCheckSpec {
            http_path: &descriptor.health_check_path,
        },
        envs,
    };

    let yaml = serde_yaml::to_string(&[spec])
        .map_err(|e| PersistenceError::serialization(format!("Failed to render service {service_name}: {e}")))?;

    let pad = " ".repeat(indent);
    let mut lines = vec![
        String::from("\n"),
        format!("{pad}# {} Server\n", descriptor.display_name),
    ];
    lines.extend(yaml.lines().map(|line| format!("{pad}{line}\n")));
    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::template::build_descriptor;
    use std::collections::BTreeMap;

    fn github_block(overrides: &BTreeMap<String, String>) -> Vec<String> {
        let catalog = Catalog::new();
        let descriptor = build_descriptor(catalog.lookup("github").expect("builtin"), overrides);
        render_service_block("mcp-github", "github", &descriptor, 2).expect("render")
    }

    #[test]
    fn test_block_layout() {
        let lines = github_block(&BTreeMap::new());

        assert_eq!(lines[0], "\n");
        assert_eq!(lines[1], "  # GitHub Integration Server\n");
        assert_eq!(lines[2], "  - name: mcp-github\n");
        assert!(lines.iter().all(|l| l.ends_with('\n')));
        assert!(lines.iter().any(|l| l.trim() == "http_port: 8085"));
        assert!(lines.iter().any(|l| l.trim() == "http_path: /health"));
        assert!(lines.iter().any(|l| l.trim() == "value: github"));
    }

    #[test]
    fn test_block_is_valid_yaml() {
        let text: String = github_block(&BTreeMap::new()).concat();
        let value: serde_yaml::Value = serde_yaml::from_str(&text).expect("valid yaml");

        let service = &value[0];
        assert_eq!(service["name"].as_str(), Some("mcp-github"));
        assert_eq!(service["http_port"].as_u64(), Some(8085));
        assert_eq!(
            service["run_command"].as_str(),
            Some("uvx mcp-server-github --host 0.0.0.0 --port 8085")
        );
        let envs = service["envs"].as_sequence().expect("envs list");
        assert_eq!(envs.len(), 3);
        assert_eq!(envs[2]["key"].as_str(), Some("MCP_SERVER_TYPE"));
    }

    #[test]
    fn test_explicit_server_type_is_not_duplicated() {
        let overrides = BTreeMap::from([(String::from("MCP_SERVER_TYPE"), String::from("custom"))]);
        let text: String = github_block(&overrides).concat();
        assert_eq!(text.matches("MCP_SERVER_TYPE").count(), 1);
    }
}
