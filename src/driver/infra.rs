//! Deployment driver.
//!
//! Applies descriptors to the infrastructure file and hands the result to
//! the distribution side channel.

use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, error, info, warn};

use crate::error::{PersistenceError, Result};
use crate::infra::{render_service_block, InfraDocument};
use crate::template::DeploymentDescriptor;

use super::distributor::Distributor;

/// Default prefix prepended to instance names to form service names.
pub const DEFAULT_SERVICE_PREFIX: &str = "mcp-";

/// Writes service blocks into the infrastructure file and publishes them.
pub struct InfraDriver<D> {
    infra_path: PathBuf,
    service_prefix: String,
    distributor: D,
}

impl<D: Distributor> InfraDriver<D> {
    /// Creates a driver for the infrastructure file at `infra_path`.
    pub fn new(infra_path: impl Into<PathBuf>, distributor: D) -> Self {
        Self {
            infra_path: infra_path.into(),
            service_prefix: DEFAULT_SERVICE_PREFIX.to_string(),
            distributor,
        }
    }

    /// Sets the service name prefix.
    #[must_use]
    pub fn with_service_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.service_prefix = prefix.into();
        self
    }

    /// Returns the path of the infrastructure file.
    #[must_use]
    pub fn infra_path(&self) -> &Path {
        &self.infra_path
    }

    /// Returns the service name prefix.
    #[must_use]
    pub fn service_prefix(&self) -> &str {
        &self.service_prefix
    }

    /// Returns the service name for an instance.
    #[must_use]
    pub fn service_name(&self, name: &str) -> String {
        format!("{}{name}", self.service_prefix)
    }

    /// Returns the distribution side channel.
    pub const fn distributor(&self) -> &D {
        &self.distributor
    }

    /// Reads the infrastructure file. An absent file reads as empty.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read.
    pub async fn read_text(&self) -> Result<String> {
        match fs::read_to_string(&self.infra_path).await {
            Ok(text) => Ok(text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No infrastructure file at {}", self.infra_path.display());
                Ok(String::new())
            }
            Err(e) => Err(PersistenceError::read(&self.infra_path, e).into()),
        }
    }

    /// Reads and parses the infrastructure file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read.
    pub async fn read_document(&self) -> Result<InfraDocument> {
        Ok(InfraDocument::parse(&self.read_text().await?))
    }

    /// Returns the service names currently in the infrastructure file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read.
    pub async fn service_names(&self) -> Result<Vec<String>> {
        let doc = self.read_document().await?;
        Ok(doc.service_names().into_iter().map(str::to_string).collect())
    }

    /// Writes the service block for `name` and publishes the change.
    ///
    /// A block left behind by an earlier attempt whose publish failed is
    /// replaced, so retrying converges.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or written, or if
    /// publishing fails. A publish failure leaves the file written.
    pub async fn apply(&self, name: &str, descriptor: &DeploymentDescriptor) -> Result<()> {
        let service = self.service_name(name);
        let mut doc = self.read_document().await?;

        let lines = render_service_block(&service, name, descriptor, doc.item_indent())?;
        if doc.insert_service(&service, lines).is_some() {
            warn!("Replaced existing service block {service}");
        } else {
            info!("Added service block {service}");
        }
        self.write_text(&doc.render()).await?;

        self.publish(&format!("Add {name} MCP server")).await
    }

    /// Removes the service block for `name` and publishes the change.
    ///
    /// An already-absent block leaves the file untouched but still
    /// publishes.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or written, or if
    /// publishing fails.
    pub async fn remove(&self, name: &str) -> Result<()> {
        let service = self.service_name(name);
        let mut doc = self.read_document().await?;

        if doc.remove_service(&service).is_some() {
            self.write_text(&doc.render()).await?;
            info!("Removed service block {service}");
        } else {
            warn!("Service block {service} already absent");
        }

        self.publish(&format!("Remove {name} MCP server")).await
    }

    /// Overwrites the infrastructure file with captured text and publishes it.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or publishing fails.
    pub async fn restore(&self, text: &str, message: &str) -> Result<()> {
        self.write_text(text).await?;
        info!("Restored {}", self.infra_path.display());
        self.publish(message).await
    }

    async fn publish(&self, message: &str) -> Result<()> {
        self.distributor.publish(message).await.inspect_err(|e| {
            error!(
                "Failed to distribute '{message}' via {}: {e}",
                self.distributor.channel()
            );
        })
    }

    async fn write_text(&self, text: &str) -> Result<()> {
        if let Some(parent) = self.infra_path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| PersistenceError::write(parent, e))?;
        }

        let mut temp_name = self.infra_path.clone().into_os_string();
        temp_name.push(".tmp");
        let temp_path = PathBuf::from(temp_name);

        fs::write(&temp_path, text)
            .await
            .map_err(|e| PersistenceError::write(&temp_path, e))?;
        fs::rename(&temp_path, &self.infra_path)
            .await
            .map_err(|e| PersistenceError::write(&self.infra_path, e))?;

        debug!("Wrote {}", self.infra_path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::driver::{MockDistributor, RecordingDistributor};
    use crate::error::{FleetError, TransportError};
    use crate::template::build_descriptor;
    use std::collections::BTreeMap;
    use tempfile::TempDir;
    use tokio_test::{assert_err, assert_ok};

    const APP_YAML: &str = "name: fleet\nservices:\n  - name: web\n    http_port: 80\n";

    fn descriptor(name: &str) -> DeploymentDescriptor {
        let catalog = Catalog::new();
        build_descriptor(catalog.lookup(name).expect("builtin"), &BTreeMap::new())
    }

    async fn driver_with(text: Option<&str>) -> (TempDir, InfraDriver<RecordingDistributor>) {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("app.yaml");
        if let Some(text) = text {
            fs::write(&path, text).await.expect("write");
        }
        let driver = InfraDriver::new(path, RecordingDistributor::new());
        (dir, driver)
    }

    #[tokio::test]
    async fn test_apply_then_remove() {
        let (_dir, driver) = driver_with(Some(APP_YAML)).await;

        assert_ok!(driver.apply("github", &descriptor("github")).await);
        assert_eq!(driver.service_names().await.unwrap(), vec!["web", "mcp-github"]);

        assert_ok!(driver.remove("github").await);
        assert_eq!(driver.read_text().await.unwrap(), APP_YAML);
        assert_eq!(
            driver.distributor().messages(),
            vec!["Add github MCP server", "Remove github MCP server"]
        );
    }

    #[tokio::test]
    async fn test_apply_creates_missing_file() {
        let (_dir, driver) = driver_with(None).await;

        assert_ok!(driver.apply("fetch", &descriptor("fetch")).await);
        let text = driver.read_text().await.unwrap();
        assert!(text.starts_with("services:\n"));
        assert!(text.contains("- name: mcp-fetch\n"));
    }

    #[tokio::test]
    async fn test_reapply_and_absent_remove_converge() {
        let (_dir, driver) = driver_with(Some(APP_YAML)).await;

        assert_ok!(driver.apply("git", &descriptor("git")).await);
        let once = driver.read_text().await.unwrap();
        assert_ok!(driver.apply("git", &descriptor("git")).await);
        assert_eq!(driver.read_text().await.unwrap(), once);
        assert_eq!(driver.service_names().await.unwrap(), vec!["web", "mcp-git"]);

        assert_ok!(driver.remove("slack").await);
        assert_eq!(driver.read_text().await.unwrap(), once);
        assert_eq!(
            driver.distributor().messages(),
            vec!["Add git MCP server", "Add git MCP server", "Remove slack MCP server"]
        );
    }

    #[tokio::test]
    async fn test_publish_failure_leaves_file_written() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("app.yaml");

        let mut distributor = MockDistributor::new();
        distributor.expect_channel().return_const("mock");
        distributor
            .expect_publish()
            .withf(|message| message.to_string() == "Add git MCP server")
            .times(1)
            .returning(|_| {
                Err(FleetError::Transport(TransportError::CommandFailed {
                    command: String::from("git push origin"),
                    stderr: String::from("rejected"),
                }))
            });

        let driver = InfraDriver::new(&path, distributor);
        assert_err!(driver.apply("git", &descriptor("git")).await);
        assert_eq!(driver.service_names().await.unwrap(), vec!["mcp-git"]);
    }

    #[tokio::test]
    async fn test_restore_overwrites_text() {
        let (_dir, driver) = driver_with(Some(APP_YAML)).await;

        assert_ok!(driver.restore("services:\n", "Rollback to backup_1").await);
        assert_eq!(driver.read_text().await.unwrap(), "services:\n");
        assert_eq!(driver.distributor().messages(), vec!["Rollback to backup_1"]);
    }
}
