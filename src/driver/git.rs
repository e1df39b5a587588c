//! Version-control side channel.
//!
//! Stages, commits, and pushes the working tree with the `git` binary. Each
//! command runs under a timeout, and a timeout is a hard failure.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::time::Duration;
use tokio::fs;
use tokio::process::Command;
use tracing::{debug, info};

use crate::error::{Result, TransportError};

use super::distributor::Distributor;

/// Default timeout for a single git command in seconds.
pub const DEFAULT_GIT_TIMEOUT_SECS: u64 = 60;

/// Commits and pushes the repository holding the infrastructure file.
#[derive(Debug, Clone)]
pub struct GitDistributor {
    repo_dir: PathBuf,
    remote: String,
    branch: Option<String>,
    paths: Vec<PathBuf>,
    timeout_secs: u64,
}

impl GitDistributor {
    /// Creates a distributor for the repository at `repo_dir`.
    #[must_use]
    pub fn new(repo_dir: impl Into<PathBuf>) -> Self {
        Self {
            repo_dir: repo_dir.into(),
            remote: String::from("origin"),
            branch: None,
            paths: Vec::new(),
            timeout_secs: DEFAULT_GIT_TIMEOUT_SECS,
        }
    }

    /// Sets the remote to push to.
    #[must_use]
    pub fn with_remote(mut self, remote: impl Into<String>) -> Self {
        self.remote = remote.into();
        self
    }

    /// Sets the branch to push. The current branch is pushed when unset.
    #[must_use]
    pub fn with_branch(mut self, branch: Option<String>) -> Self {
        self.branch = branch;
        self
    }

    /// Restricts staging to these paths. Everything is staged when empty.
    #[must_use]
    pub fn with_paths(mut self, paths: Vec<PathBuf>) -> Self {
        self.paths = paths;
        self
    }

    /// Sets the per-command timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Returns the repository directory.
    #[must_use]
    pub fn repo_dir(&self) -> &Path {
        &self.repo_dir
    }

    /// Runs a git command and returns its standard output.
    async fn git(&self, args: &[&str]) -> Result<String> {
        let (command_line, output) = self.run(args).await?;
        if !output.status.success() {
            return Err(command_failed(command_line, &output).into());
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Returns true if the index differs from `HEAD`. Untracked files do not
    /// count.
    async fn has_staged_changes(&self) -> Result<bool> {
        let (command_line, output) = self.run(&["diff", "--cached", "--quiet"]).await?;
        match output.status.code() {
            Some(0) => Ok(false),
            Some(1) => Ok(true),
            _ => Err(command_failed(command_line, &output).into()),
        }
    }

    async fn run(&self, args: &[&str]) -> Result<(String, Output)> {
        let command_line = format!("git {}", args.join(" "));

        let mut cmd = Command::new("git");
        cmd.args(args)
            .current_dir(&self.repo_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(command = %command_line, dir = %self.repo_dir.display(), "Running git");

        let output = tokio::time::timeout(Duration::from_secs(self.timeout_secs), cmd.output())
            .await
            .map_err(|_| TransportError::Timeout {
                operation: command_line.clone(),
                timeout_secs: self.timeout_secs,
            })?
            .map_err(|e| TransportError::SpawnFailed {
                command: command_line.clone(),
                message: e.to_string(),
            })?;

        Ok((command_line, output))
    }
}

fn command_failed(command: String, output: &Output) -> TransportError {
    TransportError::CommandFailed {
        command,
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
    }
}

#[async_trait]
impl Distributor for GitDistributor {
    async fn publish(&self, message: &str) -> Result<()> {
        let mut add: Vec<String> = vec![String::from("add"), String::from("--all")];
        if !self.paths.is_empty() {
            add.push(String::from("--"));
            for path in &self.paths {
                if fs::try_exists(path).await.unwrap_or(false) {
                    add.push(path.to_string_lossy().into_owned());
                }
            }
        }
        let add: Vec<&str> = add.iter().map(String::as_str).collect();
        self.git(&add).await?;

        if self.has_staged_changes().await? {
            self.git(&["commit", "-m", message]).await?;
        } else {
            debug!("Nothing staged, skipping commit");
        }

        match &self.branch {
            Some(branch) => self.git(&["push", &self.remote, branch]).await?,
            None => self.git(&["push", &self.remote]).await?,
        };

        info!("Pushed '{message}' to {}", self.remote);
        Ok(())
    }

    fn channel(&self) -> &'static str {
        "git"
    }
}
