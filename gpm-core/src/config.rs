use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{GpmError, Result};

pub const DEFAULT_TEMP_PATH: &str = "/tmp/gpm";
pub const DEFAULT_DOCKER_IMAGE: &str = "namely/protoc-all:1.51_2";
pub const DEFAULT_REPOSITORY_HOST: &str = "github.com";

/// Implementation used to generate the proto stubs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum GeneratorKind {
    /// Launches the generator image through `docker run`.
    #[default]
    Docker,
    /// gpm itself runs inside the generator image and calls the tool directly.
    Dockerized,
}

impl GeneratorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            GeneratorKind::Docker => "docker",
            GeneratorKind::Dockerized => "dockerized",
        }
    }

    pub fn runs_in_container(self) -> bool {
        matches!(self, GeneratorKind::Dockerized)
    }
}

impl FromStr for GeneratorKind {
    type Err = GpmError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "docker" => Ok(GeneratorKind::Docker),
            "dockerized" => Ok(GeneratorKind::Dockerized),
            other => Err(GpmError::UnsupportedGenerator(other.to_string())),
        }
    }
}

/// Hosting flavour of the downstream repositories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ProviderKind {
    /// SSH access with keys already provisioned on the machine.
    GitHub,
    /// HTTPS access with a token, for ephemeral CI containers such as GitHub actions.
    GitHubAction,
}

impl ProviderKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ProviderKind::GitHub => "github",
            ProviderKind::GitHubAction => "githubaction",
        }
    }
}

impl FromStr for ProviderKind {
    type Err = GpmError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "github" => Ok(ProviderKind::GitHub),
            "githubaction" => Ok(ProviderKind::GitHubAction),
            _ => Err(GpmError::UnsupportedProvider(s.to_string())),
        }
    }
}

macro_rules! string_conversions {
    ($kind:ty) => {
        impl TryFrom<String> for $kind {
            type Error = GpmError;

            fn try_from(value: String) -> Result<Self> {
                value.parse()
            }
        }

        impl From<$kind> for String {
            fn from(kind: $kind) -> Self {
                kind.as_str().to_string()
            }
        }

        impl fmt::Display for $kind {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

string_conversions!(GeneratorKind);
string_conversions!(ProviderKind);

/// Effective configuration of a run. Built by the caller, read-only for the pipeline.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Version of the gpm binary, for the startup summary.
    pub tool_version: String,
    /// Commit the gpm binary was built from, when known.
    pub tool_commit: Option<String>,
    /// Root of the proto project being analysed.
    pub project_path: PathBuf,
    /// Scratch area for clones of the downstream repositories.
    pub temp_path: PathBuf,
    /// Language used when a directory has no `.protolangs` file.
    pub default_language: String,
    pub repository_provider: Option<ProviderKind>,
    /// Organization owning the generated repositories.
    pub repository_organization: String,
    pub repository_host: String,
    /// Required when gpm runs inside the generator container.
    pub repository_pusher_username: Option<String>,
    /// Required when gpm runs inside the generator container.
    pub repository_pusher_email: Option<String>,
    /// Token embedded in HTTPS clone URLs.
    pub repository_access_token: Option<String>,
    pub generator: GeneratorKind,
    /// Image used by [`GeneratorKind::Docker`].
    pub docker_image: String,
    pub skip_publish: bool,
    /// Keep temporary clones and generated output, for local debugging only.
    pub skip_temp_removal: bool,
    /// Regenerate every directory even if its protos did not change.
    pub force_regeneration: bool,
    /// Upper bound for any single external command.
    pub command_timeout: Option<Duration>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
            tool_commit: None,
            project_path: PathBuf::new(),
            temp_path: PathBuf::from(DEFAULT_TEMP_PATH),
            default_language: String::new(),
            repository_provider: None,
            repository_organization: String::new(),
            repository_host: DEFAULT_REPOSITORY_HOST.to_string(),
            repository_pusher_username: None,
            repository_pusher_email: None,
            repository_access_token: None,
            generator: GeneratorKind::default(),
            docker_image: DEFAULT_DOCKER_IMAGE.to_string(),
            skip_publish: false,
            skip_temp_removal: false,
            force_regeneration: false,
            command_timeout: None,
        }
    }
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, |v| v.trim().is_empty())
}

pub(crate) fn mask(secret: &str) -> String {
    "*".repeat(secret.len())
}

impl ServiceConfig {
    /// Checks required fields and makes sure the temp path exists.
    pub fn validate(&self) -> Result<()> {
        if self.project_path.as_os_str().is_empty() {
            return Err(GpmError::InvalidConfig("projectPath cannot be empty".into()));
        }
        if self.repository_provider.is_none() {
            return Err(GpmError::InvalidConfig(
                "repositoryProvider cannot be empty".into(),
            ));
        }
        if self.repository_organization.trim().is_empty() {
            return Err(GpmError::InvalidConfig(
                "repositoryOrganization cannot be empty".into(),
            ));
        }
        if self.repository_host.trim().is_empty() {
            return Err(GpmError::InvalidConfig("repositoryHost cannot be empty".into()));
        }
        if self.default_language.trim().is_empty() {
            return Err(GpmError::InvalidConfig("defaultLanguage cannot be empty".into()));
        }
        if self.temp_path.as_os_str().is_empty() {
            return Err(GpmError::InvalidConfig("tempPath cannot be empty".into()));
        }
        if !self.temp_path.exists() {
            std::fs::create_dir_all(&self.temp_path)
                .map_err(|e| GpmError::io("unable to create temp directory", &self.temp_path, e))?;
        }
        Ok(())
    }

    /// Pusher identity is mandatory when there is no global git identity to fall back on.
    pub fn require_pusher_identity(&self) -> Result<()> {
        if is_blank(&self.repository_pusher_username) {
            return Err(GpmError::MissingPusherIdentity("repository-pusher-username"));
        }
        if is_blank(&self.repository_pusher_email) {
            return Err(GpmError::MissingPusherIdentity("repository-pusher-email"));
        }
        Ok(())
    }

    pub fn log_summary(&self) {
        info!(
            version = %self.tool_version,
            commit = self.tool_commit.as_deref().unwrap_or("unknown"),
            "app config"
        );
        info!(
            project = %self.project_path.display(),
            temp = %self.temp_path.display(),
            "paths"
        );
        info!(
            repository = self.repository_provider.map_or("<unset>", ProviderKind::as_str),
            host = %self.repository_host,
            generator = %self.generator,
            "providers"
        );
        if self.generator == GeneratorKind::Docker {
            info!(image = %self.docker_image, "generator image");
        }
        info!(language = %self.default_language, "defaults");
        if self.skip_publish {
            warn!("proto publication is disabled");
        }
        if self.force_regeneration {
            warn!("regeneration is forced for every directory");
        }
        if self.skip_temp_removal {
            warn!("temporary directories will not be removed");
        }
        info!(organization = %self.repository_organization, "generated code repository");
        info!(
            username = self
                .repository_pusher_username
                .as_deref()
                .unwrap_or("<system default>"),
            email = self
                .repository_pusher_email
                .as_deref()
                .unwrap_or("<system default>"),
            access_token = %self.repository_access_token.as_deref().map(mask).unwrap_or_default(),
            "pusher information"
        );
    }
}
