//! # repository: downstream repositories holding the generated code
//!
//! A [`RepositoryProvider`] knows how to address, clone, inspect and publish
//! the per-language repositories. There is a single git implementation,
//! [`GitRepositoryProvider`], parameterised by an [`AuthStrategy`]:
//!
//! - [`AuthStrategy::Ssh`] relies on SSH keys and the global git identity of
//!   the machine;
//! - [`AuthStrategy::HttpsToken`] embeds the access token in the URL and sets
//!   the pusher identity on every clone, as ephemeral CI containers have no
//!   global git identity.
//!
//! Publishing is a fixed sequence of git commands that stops at the first
//! failure. Nothing is rolled back, so a push that succeeded before a failed
//! tag leaves the repository updated but untagged.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
#[cfg(any(test, feature = "test-export-mocks"))]
use mockall::automock;
use tracing::{debug, info};

use crate::command::{CommandOutput, CommandRunner, Invocation};
use crate::config::{mask, ProviderKind, ServiceConfig};
use crate::error::{GpmError, Result};
use crate::version::Version;

pub const COMMIT_MESSAGE: &str = "gpm automatic publish";

#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait RepositoryProvider: Send + Sync {
    /// Sets the identity that appears as author of the published commits, and
    /// the token used to reach the repositories.
    fn configure_pusher(
        &mut self,
        username: Option<String>,
        email: Option<String>,
        access_token: Option<String>,
    ) -> Result<()>;

    /// URL used for clone and push operations.
    fn repo_url(&self, organization: &str, repo_name: &str) -> Result<String>;

    /// Clones `repo_url` into `output_path`, replacing anything already there.
    async fn clone_repository(&self, repo_url: &str, output_path: &Path) -> Result<()>;

    /// Latest version tag of the clone, or [`Version::empty`] if it has none.
    async fn last_version(&self, repo_path: &Path) -> Result<Version>;

    /// Commits everything in the clone, pushes it and tags it with `version`.
    async fn publish(&self, repo_path: &Path, version: Version) -> Result<()>;
}

/// How the downstream repositories are reached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthStrategy {
    Ssh { host: String },
    HttpsToken { host: String },
}

impl AuthStrategy {
    pub fn for_provider(kind: ProviderKind, host: impl Into<String>) -> Self {
        let host = host.into();
        match kind {
            ProviderKind::GitHub => AuthStrategy::Ssh { host },
            ProviderKind::GitHubAction => AuthStrategy::HttpsToken { host },
        }
    }

    pub fn repo_url(&self, organization: &str, repo_name: &str, token: Option<&str>) -> String {
        match self {
            AuthStrategy::Ssh { host } => format!("git@{host}:{organization}/{repo_name}.git"),
            AuthStrategy::HttpsToken { host } => match token.filter(|t| !t.is_empty()) {
                Some(token) => format!("https://{token}@{host}/{organization}/{repo_name}.git"),
                None => format!("https://{host}/{organization}/{repo_name}.git"),
            },
        }
    }

    /// Whether the pusher identity must be written into each clone's config.
    pub fn forces_local_identity(&self) -> bool {
        matches!(self, AuthStrategy::HttpsToken { .. })
    }
}

pub struct GitRepositoryProvider {
    auth: AuthStrategy,
    username: Option<String>,
    email: Option<String>,
    access_token: Option<String>,
    runner: Arc<dyn CommandRunner>,
}

impl GitRepositoryProvider {
    pub fn new(auth: AuthStrategy, runner: Arc<dyn CommandRunner>) -> Self {
        debug!(auth = ?auth, "using git repository provider");
        Self {
            auth,
            username: None,
            email: None,
            access_token: None,
            runner,
        }
    }

    /// Builds the provider for the configured kind. Fails if no kind is configured.
    pub fn from_config(config: &ServiceConfig, runner: Arc<dyn CommandRunner>) -> Result<Self> {
        let kind = config.repository_provider.ok_or_else(|| {
            GpmError::InvalidConfig("repositoryProvider cannot be empty".into())
        })?;
        Ok(Self::new(
            AuthStrategy::for_provider(kind, config.repository_host.clone()),
            runner,
        ))
    }

    pub fn auth(&self) -> &AuthStrategy {
        &self.auth
    }

    fn invocation(&self, args: &[&str]) -> Invocation {
        Invocation::new("git", args.iter().copied()).with_secret(self.access_token.as_deref())
    }

    async fn git(&self, args: &[&str], repo_path: &Path) -> Result<CommandOutput> {
        let invocation = self.invocation(args).in_dir(repo_path);
        self.runner.run(invocation.clone()).await?.check(&invocation)
    }

    async fn set_pusher_info(&self, repo_path: &Path) -> Result<()> {
        if !self.auth.forces_local_identity() {
            return Ok(());
        }
        if let Some(username) = self.username.as_deref() {
            self.git(&["config", "user.name", username], repo_path).await?;
        }
        if let Some(email) = self.email.as_deref() {
            self.git(&["config", "user.email", email], repo_path).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl RepositoryProvider for GitRepositoryProvider {
    fn configure_pusher(
        &mut self,
        username: Option<String>,
        email: Option<String>,
        access_token: Option<String>,
    ) -> Result<()> {
        let non_empty = |value: Option<String>| value.filter(|v| !v.trim().is_empty());
        self.username = non_empty(username);
        self.email = non_empty(email);
        self.access_token = non_empty(access_token);
        debug!(
            username = ?self.username,
            email = ?self.email,
            access_token = %self.access_token.as_deref().map(mask).unwrap_or_default(),
            "setting pusher information"
        );
        Ok(())
    }

    fn repo_url(&self, organization: &str, repo_name: &str) -> Result<String> {
        Ok(self
            .auth
            .repo_url(organization, repo_name, self.access_token.as_deref()))
    }

    async fn clone_repository(&self, repo_url: &str, output_path: &Path) -> Result<()> {
        let target = output_path.to_string_lossy();
        let invocation = self.invocation(&["clone", repo_url, target.as_ref()]);
        debug!(
            repo_url = %invocation.redact(repo_url),
            output_path = %output_path.display(),
            "cloning repository"
        );
        if output_path.exists() {
            std::fs::remove_dir_all(output_path)
                .map_err(|e| GpmError::io("unable to remove previous clone", output_path, e))?;
        } else if let Some(parent) = output_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| GpmError::io("unable to create clone parent directory", parent, e))?;
        }

        let finished = self.runner.run(invocation.clone()).await?.check(&invocation)?;
        debug!(output = %invocation.redact(&finished.output), "repo successfully cloned");
        Ok(())
    }

    async fn last_version(&self, repo_path: &Path) -> Result<Version> {
        debug!(repo_path = %repo_path.display(), "obtaining latest tag");
        let invocation = self
            .invocation(&["describe", "--abbrev=0", "--tags"])
            .in_dir(repo_path);
        let finished = self.runner.run(invocation.clone()).await?;
        match Version::from_describe_output(finished.success, &finished.output) {
            Some(Ok(version)) => {
                debug!(version = %version, "latest tag");
                Ok(version)
            }
            Some(Err(source)) => Err(GpmError::Version {
                repo: repo_path.to_path_buf(),
                source,
            }),
            None => finished.check(&invocation).map(|_| Version::empty()),
        }
    }

    async fn publish(&self, repo_path: &Path, version: Version) -> Result<()> {
        let tag = version.to_string();
        debug!(repo_path = %repo_path.display(), version = %tag, "publishing version");
        self.set_pusher_info(repo_path).await?;

        let tag_message = format!("new version {tag} generated by GPM");
        let steps: [&[&str]; 5] = [
            &["add", "-A"],
            &["commit", "-a", "-m", COMMIT_MESSAGE],
            &["push"],
            &["tag", "-a", tag.as_str(), "-m", tag_message.as_str()],
            &["push", "origin", "--tags"],
        ];
        for step in steps {
            self.git(step, repo_path).await?;
        }
        info!(repo_path = %repo_path.display(), version = %tag, "version published");
        Ok(())
    }
}
