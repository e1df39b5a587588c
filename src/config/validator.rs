//! Configuration validation for the fleet manager.
//!
//! Collects every problem in one pass; the first error is reported and the
//! rest are logged.

use crate::error::{ConfigError, FleetError, Result};
use crate::template::NAME_PLACEHOLDER;
use std::collections::HashSet;
use tracing::{debug, warn};

use super::spec::{CatalogConfig, DistributionConfig, FleetConfig, NamingConfig, PlatformConfig};

/// Validator for fleet configurations.
#[derive(Debug, Default)]
pub struct ConfigValidator;

/// Validation result containing all errors found.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// List of validation errors.
    pub errors: Vec<ValidationError>,
    /// List of warnings (non-fatal issues).
    pub warnings: Vec<String>,
}

/// A single validation error.
#[derive(Debug)]
pub struct ValidationError {
    /// The field path that failed validation.
    pub field: String,
    /// The error message.
    pub message: String,
}

impl ValidationResult {
    fn error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ValidationError {
            field: field.into(),
            message: message.into(),
        });
    }
}

impl ConfigValidator {
    /// Creates a new validator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Validates a fleet configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if validation fails.
    pub fn validate(&self, config: &FleetConfig) -> Result<ValidationResult> {
        let mut result = ValidationResult::default();

        Self::validate_naming(&config.naming, &mut result);
        Self::validate_catalog(&config.catalog, &mut result);
        Self::validate_pricing(config.pricing.monthly_unit_cost, &mut result);
        Self::validate_distribution(&config.distribution, &mut result);
        Self::validate_platform(&config.platform, &mut result);

        for warning in &result.warnings {
            warn!("{warning}");
        }

        if result.errors.is_empty() {
            debug!("Configuration validation passed");
            Ok(result)
        } else {
            for extra in result.errors.iter().skip(1) {
                debug!("Also invalid: {}: {}", extra.field, extra.message);
            }
            let first_error = &result.errors[0];
            Err(FleetError::Config(ConfigError::ValidationError {
                message: first_error.message.clone(),
                field: Some(first_error.field.clone()),
            }))
        }
    }

    fn validate_naming(naming: &NamingConfig, result: &mut ValidationResult) {
        let prefix = &naming.service_prefix;
        if prefix.is_empty() {
            result.error("naming.service_prefix", "Service prefix cannot be empty");
        } else if !prefix
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        {
            result.error(
                "naming.service_prefix",
                format!("Service prefix '{prefix}' must be lowercase alphanumeric with hyphens"),
            );
        }

        if !naming.url_template.contains(NAME_PLACEHOLDER) {
            result.error(
                "naming.url_template",
                format!("URL template must contain {NAME_PLACEHOLDER}"),
            );
        }
    }

    fn validate_catalog(catalog: &CatalogConfig, result: &mut ValidationResult) {
        if catalog.community_port_base == 0 {
            result.error("catalog.community_port_base", "Port base must be non-zero");
        }

        let mut seen = HashSet::new();
        for (i, entry) in catalog.community.iter().enumerate() {
            let name = entry.name.to_lowercase();
            if !seen.insert(name.clone()) {
                result.warnings.push(format!(
                    "catalog.community[{i}]: '{name}' is listed more than once; the last entry wins"
                ));
            }
            if entry.package.trim().is_empty() {
                result.error(
                    format!("catalog.community[{i}].package"),
                    format!("Community entry '{name}' has no package"),
                );
            }
            if entry.port == Some(0) {
                result.error(
                    format!("catalog.community[{i}].port"),
                    format!("Community entry '{name}' has port 0"),
                );
            }
        }
    }

    fn validate_pricing(unit_cost: f64, result: &mut ValidationResult) {
        if !unit_cost.is_finite() || unit_cost < 0.0 {
            result.error(
                "pricing.monthly_unit_cost",
                "Monthly unit cost must be a non-negative number",
            );
        }
    }

    fn validate_distribution(distribution: &DistributionConfig, result: &mut ValidationResult) {
        if distribution.timeout_secs == 0 {
            result.error("distribution.timeout_secs", "Timeout must be at least 1 second");
        }
        if distribution.remote.trim().is_empty() {
            result.error("distribution.remote", "Remote cannot be empty");
        }
    }

    fn validate_platform(platform: &PlatformConfig, result: &mut ValidationResult) {
        if platform.timeout_secs == 0 {
            result.error("platform.timeout_secs", "Timeout must be at least 1 second");
        }

        if platform.app_id.is_none() {
            return;
        }

        if platform.token_env.trim().is_empty() {
            result.error(
                "platform.token_env",
                "A token variable is required when platform.app_id is set",
            );
        }
        if !platform.api_url.starts_with("http://") && !platform.api_url.starts_with("https://") {
            result.error(
                "platform.api_url",
                format!("API URL '{}' must be http(s)", platform.api_url),
            );
        }
    }
}
