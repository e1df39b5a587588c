//! Distribution side channel abstraction.
//!
//! A distributor propagates the locally written infrastructure file to the
//! platform that provisions instances. Publishing is a single call that either
//! succeeds or reports a transport failure; nothing is retried.

use async_trait::async_trait;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;

use crate::error::Result;

/// Trait for distribution side channels.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Distributor: Send + Sync {
    /// Publishes the current working tree with the given change message.
    async fn publish(&self, message: &str) -> Result<()>;

    /// Returns a short name for logging.
    fn channel(&self) -> &'static str;
}

#[async_trait]
impl Distributor for Box<dyn Distributor> {
    async fn publish(&self, message: &str) -> Result<()> {
        (**self).publish(message).await
    }

    fn channel(&self) -> &'static str {
        (**self).channel()
    }
}

/// Runs several distributors in order, stopping at the first failure.
#[derive(Default)]
pub struct DistributorChain {
    stages: Vec<Box<dyn Distributor>>,
}

impl DistributorChain {
    /// Creates an empty chain.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a stage.
    #[must_use]
    pub fn then(mut self, stage: impl Distributor + 'static) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    /// Returns the number of stages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Returns true if the chain has no stages.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

#[async_trait]
impl Distributor for DistributorChain {
    async fn publish(&self, message: &str) -> Result<()> {
        for stage in &self.stages {
            debug!("Publishing via {}", stage.channel());
            stage.publish(message).await?;
        }
        Ok(())
    }

    fn channel(&self) -> &'static str {
        "chain"
    }
}

/// Distributor that only records messages.
///
/// Used when distribution is disabled, and in tests. Clones share the same
/// message log.
#[derive(Debug, Clone, Default)]
pub struct RecordingDistributor {
    messages: Arc<Mutex<Vec<String>>>,
}

impl RecordingDistributor {
    /// Creates a new recording distributor.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every message published so far.
    #[must_use]
    pub fn messages(&self) -> Vec<String> {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl Distributor for RecordingDistributor {
    async fn publish(&self, message: &str) -> Result<()> {
        debug!("Recording publish: {message}");
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message.to_string());
        Ok(())
    }

    fn channel(&self) -> &'static str {
        "none"
    }
}
