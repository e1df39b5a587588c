//! Error types for the MCP fleet manager.
//!
//! This module provides the error hierarchy for every operation in the fleet
//! lifecycle: catalog lookups, reconciliation, snapshots, the distribution
//! side channel, and local persistence.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for the fleet manager.
#[derive(Debug, Error)]
pub enum FleetError {
    /// Configuration-related errors.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Catalog lookup and registration errors.
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    /// Fleet reconciliation errors.
    #[error("Reconciliation error: {0}")]
    Reconcile(#[from] ReconcileError),

    /// Snapshot errors.
    #[error("Snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),

    /// Errors from the distribution side channel or the platform API.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Local read/write errors.
    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    /// IO errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file was not found.
    #[error("Configuration file not found: {path}")]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// The configuration file could not be parsed.
    #[error("Failed to parse configuration: {message}")]
    ParseError {
        /// Description of the parse error.
        message: String,
        /// Optional source location.
        location: Option<String>,
    },

    /// Validation failed.
    #[error("Configuration validation failed: {message}")]
    ValidationError {
        /// Description of the validation error.
        message: String,
        /// Field that failed validation.
        field: Option<String>,
    },

    /// Environment variable is missing.
    #[error("Missing environment variable: {name}")]
    MissingEnvVar {
        /// Name of the missing variable.
        name: String,
    },

    /// An environment override carried an unusable value.
    #[error("Invalid value '{value}' for environment variable {name}")]
    InvalidEnvVar {
        /// Name of the variable.
        name: String,
        /// The rejected value.
        value: String,
    },
}

/// Catalog lookup and registration errors.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The instance name is not in the catalog.
    #[error("Unknown instance '{name}' (available: {available})")]
    UnknownInstance {
        /// Requested name.
        name: String,
        /// Comma-separated list of known names.
        available: String,
    },

    /// A community registration tried to replace a built-in definition.
    #[error("Cannot register '{name}': the name belongs to a built-in instance")]
    BuiltinCollision {
        /// The colliding name.
        name: String,
    },

    /// No free port remained above the community base.
    #[error("No free port available for '{name}' at or above {base}")]
    NoFreePort {
        /// Name being registered.
        name: String,
        /// The port base searched from.
        base: u16,
    },

    /// The instance name is not usable as a service identifier.
    #[error("Invalid instance name '{name}': {reason}")]
    InvalidName {
        /// The rejected name.
        name: String,
        /// Why it was rejected.
        reason: String,
    },
}

/// Fleet reconciliation errors.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// The instance already has a deployment record.
    #[error("Instance '{name}' is already deployed")]
    AlreadyDeployed {
        /// Name of the instance.
        name: String,
    },

    /// The instance has no deployment record.
    #[error("Instance '{name}' is not currently deployed")]
    NotDeployed {
        /// Name of the instance.
        name: String,
    },
}

/// Snapshot errors.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// No snapshot with the given id exists.
    #[error("Snapshot not found: {id}")]
    NotFound {
        /// The requested snapshot id.
        id: String,
    },
}

/// Distribution side channel and platform API errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// A version-control command exited unsuccessfully.
    #[error("Command `{command}` failed: {stderr}")]
    CommandFailed {
        /// Command line that was run.
        command: String,
        /// Captured standard error.
        stderr: String,
    },

    /// A version-control command could not be started.
    #[error("Failed to spawn `{command}`: {message}")]
    SpawnFailed {
        /// Command line that was attempted.
        command: String,
        /// Underlying error.
        message: String,
    },

    /// An out-of-process call exceeded its timeout.
    #[error("{operation} timed out after {timeout_secs}s")]
    Timeout {
        /// Operation that timed out.
        operation: String,
        /// Configured timeout.
        timeout_secs: u64,
    },

    /// The platform API rejected the request.
    #[error("Platform API request failed: {status} - {message}")]
    ApiRequestFailed {
        /// HTTP status code.
        status: u16,
        /// Error message from the API.
        message: String,
    },

    /// Network error reaching the platform API.
    #[error("Network error communicating with the platform: {message}")]
    NetworkError {
        /// Description of the network error.
        message: String,
    },
}

/// Local persistence errors.
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// A file could not be read.
    #[error("Failed to read {path}: {message}")]
    ReadFailed {
        /// Path being read.
        path: PathBuf,
        /// Underlying error.
        message: String,
    },

    /// A file could not be written.
    #[error("Failed to write {path}: {message}")]
    WriteFailed {
        /// Path being written.
        path: PathBuf,
        /// Underlying error.
        message: String,
    },

    /// Persisted content is not valid.
    #[error("{path} is corrupted: {message}")]
    Corrupted {
        /// Path of the corrupted file.
        path: PathBuf,
        /// Description of the corruption.
        message: String,
    },

    /// Serialization error.
    #[error("Serialization error: {message}")]
    SerializationError {
        /// Description of the serialization error.
        message: String,
    },

    /// Another operation holds the fleet lock.
    #[error("Fleet is locked by another operation (lock holder: {holder}, since: {since})")]
    LockedByOther {
        /// Identifier of the lock holder.
        holder: String,
        /// When the lock was acquired.
        since: String,
    },
}

/// Coarse classification of errors, used for exit codes and reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Name is not in the catalog.
    UnknownInstance,
    /// Name is already in the fleet.
    AlreadyDeployed,
    /// Name is not in the fleet.
    NotDeployed,
    /// Snapshot id is unknown.
    SnapshotNotFound,
    /// Provisioning or push call failed.
    TransportFailure,
    /// Local read/write failed.
    PersistenceFailure,
    /// Invalid configuration or registration input.
    Invalid,
}

/// Result type alias for fleet operations.
pub type Result<T> = std::result::Result<T, FleetError>;

impl FleetError {
    /// Creates a new internal error with the given message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Classifies this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Catalog(CatalogError::UnknownInstance { .. }) => ErrorKind::UnknownInstance,
            Self::Reconcile(ReconcileError::AlreadyDeployed { .. }) => ErrorKind::AlreadyDeployed,
            Self::Reconcile(ReconcileError::NotDeployed { .. }) => ErrorKind::NotDeployed,
            Self::Snapshot(SnapshotError::NotFound { .. }) => ErrorKind::SnapshotNotFound,
            Self::Transport(_) => ErrorKind::TransportFailure,
            Self::Persistence(_) | Self::Io(_) => ErrorKind::PersistenceFailure,
            Self::Config(_) | Self::Catalog(_) | Self::Internal(_) => ErrorKind::Invalid,
        }
    }

    /// Returns the process exit code for this error.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self.kind() {
            ErrorKind::UnknownInstance | ErrorKind::NotDeployed | ErrorKind::SnapshotNotFound => 2,
            ErrorKind::AlreadyDeployed => 3,
            ErrorKind::TransportFailure => 4,
            ErrorKind::PersistenceFailure => 5,
            ErrorKind::Invalid => 1,
        }
    }
}

impl ConfigError {
    /// Creates a validation error for a specific field.
    #[must_use]
    pub fn validation(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
            field: Some(field.into()),
        }
    }
}

impl PersistenceError {
    /// Creates a read error for the given path.
    #[must_use]
    pub fn read(path: impl Into<PathBuf>, err: impl std::fmt::Display) -> Self {
        Self::ReadFailed {
            path: path.into(),
            message: err.to_string(),
        }
    }

    /// Creates a write error for the given path.
    #[must_use]
    pub fn write(path: impl Into<PathBuf>, err: impl std::fmt::Display) -> Self {
        Self::WriteFailed {
            path: path.into(),
            message: err.to_string(),
        }
    }

    /// Creates a corruption error for the given path.
    #[must_use]
    pub fn corrupted(path: impl Into<PathBuf>, err: impl std::fmt::Display) -> Self {
        Self::Corrupted {
            path: path.into(),
            message: err.to_string(),
        }
    }

    /// Creates a serialization error with the given message.
    #[must_use]
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::SerializationError {
            message: message.into(),
        }
    }
}

impl TransportError {
    /// Creates an API request error.
    #[must_use]
    pub fn api_error(status: u16, message: impl Into<String>) -> Self {
        Self::ApiRequestFailed {
            status,
            message: message.into(),
        }
    }

    /// Creates a network error.
    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self::NetworkError {
            message: message.into(),
        }
    }
}
