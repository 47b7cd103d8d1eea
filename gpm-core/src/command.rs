//! External process execution.
//!
//! Every call to `git`, `docker` or the in-container generator goes through a
//! [`CommandRunner`], so the pipeline can be exercised with a mock instead of
//! real binaries. A runner only fails when the process cannot be launched or
//! times out; a non-zero exit is reported in [`CommandOutput`] and turned into
//! an error by [`CommandOutput::check`] where the caller needs one.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
#[cfg(any(test, feature = "test-export-mocks"))]
use mockall::automock;
use tracing::debug;

use crate::error::{GpmError, Result};

const REDACTED: &str = "***";

/// A fully described process invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub working_dir: Option<PathBuf>,
    secret: Option<String>,
}

impl Invocation {
    pub fn new<I, S>(program: &str, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.to_string(),
            args: args.into_iter().map(Into::into).collect(),
            working_dir: None,
            secret: None,
        }
    }

    pub fn in_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Marks a value that must never appear in logs or error messages.
    pub fn with_secret(mut self, secret: Option<&str>) -> Self {
        self.secret = secret.filter(|s| !s.is_empty()).map(str::to_string);
        self
    }

    pub fn redact(&self, text: &str) -> String {
        match &self.secret {
            Some(secret) => text.replace(secret.as_str(), REDACTED),
            None => text.to_string(),
        }
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let line = std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ");
        f.write_str(&self.redact(&line))
    }
}

/// Result of a finished process. `output` holds stdout followed by stderr.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub success: bool,
    pub status: String,
    pub output: String,
}

impl CommandOutput {
    pub fn succeeded(output: impl Into<String>) -> Self {
        Self {
            success: true,
            status: "exit status: 0".to_string(),
            output: output.into(),
        }
    }

    pub fn failed(status: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            success: false,
            status: status.into(),
            output: output.into(),
        }
    }

    /// Turns a non-zero exit into [`GpmError::CommandFailed`] carrying the output.
    pub fn check(self, invocation: &Invocation) -> Result<Self> {
        if self.success {
            return Ok(self);
        }
        Err(GpmError::CommandFailed {
            command: invocation.to_string(),
            status: self.status,
            output: invocation.redact(&self.output),
        })
    }
}

#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Runs the invocation to completion and captures its output.
    async fn run(&self, invocation: Invocation) -> Result<CommandOutput>;
}

/// Runs commands on the host with `tokio::process`.
#[derive(Debug, Clone, Default)]
pub struct SystemCommandRunner {
    timeout: Option<Duration>,
}

impl SystemCommandRunner {
    pub fn new(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl CommandRunner for SystemCommandRunner {
    async fn run(&self, invocation: Invocation) -> Result<CommandOutput> {
        let mut command = tokio::process::Command::new(&invocation.program);
        command.args(&invocation.args).kill_on_drop(true);
        if let Some(dir) = &invocation.working_dir {
            command.current_dir(dir);
        }
        debug!(command = %invocation, working_dir = ?invocation.working_dir, "executing command");

        let pending = command.output();
        let finished = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, pending).await.map_err(|_| {
                GpmError::CommandTimeout {
                    command: invocation.to_string(),
                    timeout: limit,
                }
            })?,
            None => pending.await,
        };
        let finished = finished.map_err(|source| GpmError::CommandLaunch {
            command: invocation.to_string(),
            source,
        })?;

        let mut output = String::from_utf8_lossy(&finished.stdout).into_owned();
        output.push_str(&String::from_utf8_lossy(&finished.stderr));
        debug!(
            command = %invocation,
            status = %finished.status,
            output = %invocation.redact(&output),
            "execution finished"
        );

        Ok(CommandOutput {
            success: finished.status.success(),
            status: finished.status.to_string(),
            output,
        })
    }
}
