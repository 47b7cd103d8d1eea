//! `load_config` module: resolves the effective [`ServiceConfig`] of a run.
//!
//! Sources, lowest precedence first:
//! 1. built-in defaults ([`ServiceConfig::default`])
//! 2. `<base_path>/.gpm.yaml`, camelCase keys
//! 3. `GPM_<KEY>` environment variables, e.g. `GPM_REPOSITORY_ACCESS_TOKEN`
//!    (or `GPM_REPOSITORYACCESSTOKEN`)
//! 4. command line flags ([`GenerateOptions`])
//!
//! A missing config file is only a warning; a file that cannot be parsed, or
//! any value that cannot be converted, is an error. Required fields are not
//! checked here: that is `ServiceConfig::validate`, run by the orchestrator.

use std::fmt::Display;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use gpm_core::config::{GeneratorKind, ProviderKind, ServiceConfig};
use serde::Deserialize;
use tracing::{info, warn};

use crate::cli::GenerateOptions;

pub const CONFIG_FILE_NAME: &str = ".gpm.yaml";
pub const ENV_PREFIX: &str = "GPM_";

/// Content of `.gpm.yaml`. Every key is optional.
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileConfig {
    pub repository_provider: Option<ProviderKind>,
    pub repository_organization: Option<String>,
    pub repository_host: Option<String>,
    pub repository_pusher_username: Option<String>,
    pub repository_pusher_email: Option<String>,
    pub repository_access_token: Option<String>,
    pub default_language: Option<String>,
    pub temp_path: Option<PathBuf>,
    pub generator_name: Option<GeneratorKind>,
    pub docker_cmd_image: Option<String>,
    pub skip_publish: Option<bool>,
    pub skip_temp_removal: Option<bool>,
    pub force_regeneration: Option<bool>,
    pub command_timeout_secs: Option<u64>,
}

/// Loads the layered configuration of a `generate` run on `base_path`.
pub fn load_config(base_path: &Path, options: &GenerateOptions) -> Result<ServiceConfig> {
    let mut layered = read_config_file(&base_path.join(CONFIG_FILE_NAME))?;
    layered.apply_env(|key| std::env::var(key).ok())?;
    layered.apply_options(options);
    Ok(layered.into_service_config(base_path.to_path_buf()))
}

/// Reads `path`, or returns an empty configuration if it does not exist.
pub fn read_config_file(path: &Path) -> Result<FileConfig> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!(
                config_path = %path.display(),
                "No config file found on given path, create a .gpm.yaml file for consistent results."
            );
            return Ok(FileConfig::default());
        }
        Err(e) => {
            return Err(e)
                .with_context(|| format!("unable to read configuration file {}", path.display()))
        }
    };

    if content.trim().is_empty() {
        warn!(config_path = %path.display(), "config file is empty");
        return Ok(FileConfig::default());
    }
    let parsed: FileConfig = serde_yaml::from_str(&content)
        .with_context(|| format!("unable to parse configuration file {}", path.display()))?;
    info!(config_path = %path.display(), "configuration loaded");
    Ok(parsed)
}

/// Parses the `GPM_<key>` variable, ignoring it when unset or empty. The
/// spelling without inner underscores (`GPM_REPOSITORYACCESSTOKEN`) is read
/// when the underscored one is absent.
fn env_value<T, F>(lookup: &F, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: Display,
    F: Fn(&str) -> Option<String>,
{
    let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
    let name = format!("{ENV_PREFIX}{key}");
    let compact = format!("{ENV_PREFIX}{}", key.replace('_', ""));
    let found = match non_empty(&name) {
        Some(raw) => Some((name, raw)),
        None => non_empty(&compact).map(|raw| (compact, raw)),
    };
    match found {
        Some((name, raw)) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| anyhow::anyhow!("invalid value for {name}: {e}")),
        None => Ok(None),
    }
}

fn override_with<T>(slot: &mut Option<T>, value: Option<T>) {
    if value.is_some() {
        *slot = value;
    }
}

impl FileConfig {
    /// Overrides every key that has a non-empty `GPM_*` variable in `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        override_with(&mut self.repository_provider, env_value(&lookup, "REPOSITORY_PROVIDER")?);
        override_with(
            &mut self.repository_organization,
            env_value(&lookup, "REPOSITORY_ORGANIZATION")?,
        );
        override_with(&mut self.repository_host, env_value(&lookup, "REPOSITORY_HOST")?);
        override_with(
            &mut self.repository_pusher_username,
            env_value(&lookup, "REPOSITORY_PUSHER_USERNAME")?,
        );
        override_with(
            &mut self.repository_pusher_email,
            env_value(&lookup, "REPOSITORY_PUSHER_EMAIL")?,
        );
        override_with(
            &mut self.repository_access_token,
            env_value(&lookup, "REPOSITORY_ACCESS_TOKEN")?,
        );
        override_with(&mut self.default_language, env_value(&lookup, "DEFAULT_LANGUAGE")?);
        override_with(&mut self.temp_path, env_value(&lookup, "TEMP_PATH")?);
        override_with(&mut self.generator_name, env_value(&lookup, "GENERATOR_NAME")?);
        override_with(&mut self.docker_cmd_image, env_value(&lookup, "DOCKER_CMD_IMAGE")?);
        override_with(&mut self.skip_publish, env_value(&lookup, "SKIP_PUBLISH")?);
        override_with(&mut self.skip_temp_removal, env_value(&lookup, "SKIP_TEMP_REMOVAL")?);
        override_with(&mut self.force_regeneration, env_value(&lookup, "FORCE_REGENERATION")?);
        override_with(
            &mut self.command_timeout_secs,
            env_value(&lookup, "COMMAND_TIMEOUT_SECS")?,
        );
        Ok(())
    }

    /// Flags always win. Boolean flags can only switch a setting on.
    pub fn apply_options(&mut self, options: &GenerateOptions) {
        override_with(&mut self.temp_path, options.temp_path.clone());
        override_with(&mut self.generator_name, options.proto_generator);
        override_with(&mut self.docker_cmd_image, options.docker_cmd_image.clone());
        override_with(
            &mut self.repository_access_token,
            options.repository_access_token.clone(),
        );
        override_with(
            &mut self.repository_pusher_username,
            options.repository_pusher_username.clone(),
        );
        override_with(
            &mut self.repository_pusher_email,
            options.repository_pusher_email.clone(),
        );
        if options.skip_publish {
            self.skip_publish = Some(true);
        }
        if options.skip_temp_removal {
            self.skip_temp_removal = Some(true);
        }
        if options.force_regeneration {
            self.force_regeneration = Some(true);
        }
    }

    pub fn into_service_config(self, project_path: PathBuf) -> ServiceConfig {
        let defaults = ServiceConfig::default();
        ServiceConfig {
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
            tool_commit: option_env!("GPM_COMMIT").map(str::to_string),
            project_path,
            temp_path: self.temp_path.unwrap_or(defaults.temp_path),
            default_language: self.default_language.unwrap_or_default(),
            repository_provider: self.repository_provider,
            repository_organization: self.repository_organization.unwrap_or_default(),
            repository_host: self.repository_host.unwrap_or(defaults.repository_host),
            repository_pusher_username: self.repository_pusher_username,
            repository_pusher_email: self.repository_pusher_email,
            repository_access_token: self.repository_access_token,
            generator: self.generator_name.unwrap_or(defaults.generator),
            docker_image: self.docker_cmd_image.unwrap_or(defaults.docker_image),
            skip_publish: self.skip_publish.unwrap_or(defaults.skip_publish),
            skip_temp_removal: self.skip_temp_removal.unwrap_or(defaults.skip_temp_removal),
            force_regeneration: self.force_regeneration.unwrap_or(defaults.force_regeneration),
            command_timeout: self.command_timeout_secs.map(Duration::from_secs),
        }
    }
}
