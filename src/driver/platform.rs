//! Hosting platform deployment trigger.
//!
//! After the infrastructure file has been pushed, the platform can be asked to
//! rebuild the app immediately instead of waiting for its own poll.

use async_trait::async_trait;
use reqwest::{header, Client};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{Result, TransportError};

use super::distributor::Distributor;

/// Default request timeout in seconds.
pub const DEFAULT_PLATFORM_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Serialize)]
struct CreateDeploymentRequest {
    force_build: bool,
}

/// Triggers a deployment through the platform API.
#[derive(Debug, Clone)]
pub struct PlatformDistributor {
    client: Client,
    api_url: String,
    app_id: String,
    token: String,
    timeout_secs: u64,
}

impl PlatformDistributor {
    /// Creates a new platform client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(
        api_url: &str,
        app_id: &str,
        token: &str,
        timeout_secs: u64,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| TransportError::network(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            app_id: app_id.to_string(),
            token: token.to_string(),
            timeout_secs,
        })
    }

    fn deployments_url(&self) -> String {
        format!("{}/apps/{}/deployments", self.api_url, self.app_id)
    }
}

#[async_trait]
impl Distributor for PlatformDistributor {
    async fn publish(&self, message: &str) -> Result<()> {
        let url = self.deployments_url();
        debug!("Triggering platform deployment: {url}");

        let response = self
            .client
            .post(&url)
            .header(header::AUTHORIZATION, format!("Bearer {}", self.token))
            .json(&CreateDeploymentRequest { force_build: true })
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TransportError::Timeout {
                        operation: String::from("Platform deployment request"),
                        timeout_secs: self.timeout_secs,
                    }
                } else {
                    TransportError::network(format!("Request failed: {e}"))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::api_error(status.as_u16(), body).into());
        }

        info!("Platform deployment triggered for '{message}'");
        Ok(())
    }

    fn channel(&self) -> &'static str {
        "platform"
    }
}
