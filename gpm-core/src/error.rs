//! Error types shared by every stage of the pipeline.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, GpmError>;

/// Failure while turning a tag string into a [`crate::version::Version`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum VersionError {
    #[error("version {tag:?} does not match v<major>.<minor>.<patch>")]
    Malformed { tag: String },
    #[error("version component {component:?} in {tag:?} is out of range")]
    OutOfRange { tag: String, component: String },
    #[error("minor component of {tag} cannot be incremented")]
    Overflow { tag: String },
}

#[derive(Debug, Error)]
pub enum GpmError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("unsupported generator {0:?}, valid values: docker, dockerized")]
    UnsupportedGenerator(String),
    #[error("unsupported repository provider {0:?}, valid values: github, githubaction")]
    UnsupportedProvider(String),
    #[error("--{0} is required when running in a containerized environment")]
    MissingPusherIdentity(&'static str),
    #[error("{context} ({path}): {source}")]
    Io {
        context: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("unable to launch {command}: {source}")]
    CommandLaunch {
        command: String,
        #[source]
        source: io::Error,
    },
    #[error("{command} exited with {status}: {output}")]
    CommandFailed {
        command: String,
        status: String,
        output: String,
    },
    #[error("{command} did not finish within {timeout:?}")]
    CommandTimeout { command: String, timeout: Duration },
    #[error("unable to obtain latest tag from {repo}: {source}")]
    Version {
        repo: PathBuf,
        #[source]
        source: VersionError,
    },
    #[error("{stage} failed for {repository} (directory {directory}, language {language}): {source}")]
    Unit {
        stage: &'static str,
        directory: String,
        language: String,
        repository: String,
        #[source]
        source: Box<GpmError>,
    },
}

impl GpmError {
    pub(crate) fn io(context: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        GpmError::Io {
            context,
            path: path.into(),
            source,
        }
    }
}
