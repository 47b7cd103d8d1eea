//! High-level pipeline: detect → generate → version → publish for every proto directory.
//!
//! The [`Orchestrator`] walks the immediate subdirectories of a proto project and,
//! for each target language of each directory:
//!   - clones the downstream repository `grpc-<directory>-<language>` into the temp path
//!   - compares the `.proto` files of the directory with the ones in the clone
//!   - when they differ, generates the stubs into the clone
//!   - reads the latest version tag, bumps its minor component and publishes
//!
//! # Responsibilities
//! - Strictly sequential, fail-fast processing: the first failing unit aborts the run
//! - Errors are wrapped with the directory, language and repository they belong to
//! - Temporary state (clones, `<root>/generated`) is removed on success and on error
//! - Publishing already done for earlier directories is never rolled back
//!
//! # Navigation
//! - Main entrypoint: [`Orchestrator::run`]
//! - Result of a run: [`RunReport`]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::command::{CommandRunner, SystemCommandRunner};
use crate::config::ServiceConfig;
use crate::error::{GpmError, Result};
use crate::files;
use crate::generator::{Generator, ProtoGenerator, GENERATED_DIR};
use crate::repository::{GitRepositoryProvider, RepositoryProvider};
use crate::version::Version;

/// File listing the target languages of a directory, one per line.
pub const PROTO_LANGS_FILE: &str = ".protolangs";
/// Directories of the project root that never contain protos.
pub const EXCLUDED_DIRS: &[&str] = &[".git", ".github"];
/// Only files with this extension take part in change detection.
pub const PROTO_EXTENSION: &str = ".proto";

/// A directory of the project holding proto definitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtoDirectory {
    pub name: String,
    pub path: PathBuf,
}

/// Name of the repository receiving the `language` stubs of `directory`.
pub fn repo_name(directory: &str, language: &str) -> String {
    format!("grpc-{directory}-{language}")
}

/// Lists the immediate subdirectories of `root`, skipping [`EXCLUDED_DIRS`].
/// The order is the one returned by the filesystem.
pub fn list_proto_directories(root: &Path) -> Result<Vec<ProtoDirectory>> {
    let entries =
        std::fs::read_dir(root).map_err(|e| GpmError::io("unable to list project", root, e))?;
    let mut directories = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| GpmError::io("unable to list project", root, e))?;
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            warn!(path = %path.display(), "skipping directory with a non UTF-8 name");
            continue;
        };
        if EXCLUDED_DIRS.contains(&name.as_str()) {
            debug!(name, "excluded directory");
            continue;
        }
        directories.push(ProtoDirectory { name, path });
    }
    Ok(directories)
}

/// Target languages of a directory: the lines of its [`PROTO_LANGS_FILE`], or
/// `default_language` when the file does not exist. Blank lines are ignored,
/// so an empty file yields no language at all.
pub fn load_proto_langs(directory: &Path, default_language: &str) -> Result<Vec<String>> {
    let langs_file = directory.join(PROTO_LANGS_FILE);
    if !langs_file.exists() {
        return Ok(vec![default_language.to_string()]);
    }
    let content = std::fs::read_to_string(&langs_file)
        .map_err(|e| GpmError::io("unable to read language file", &langs_file, e))?;
    let languages: Vec<String> = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect();
    if languages.is_empty() {
        warn!(path = %langs_file.display(), "language file is empty, directory will not be generated");
    }
    Ok(languages)
}

/// What happened to one (directory, language) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum UnitOutcome {
    /// Protos identical to the published ones; nothing generated.
    Unchanged,
    /// Stubs generated but publication is disabled.
    Generated { previous: Version },
    /// Stubs generated and pushed with a new tag.
    Published { previous: Version, version: Version },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnitReport {
    pub directory: String,
    pub language: String,
    pub repository: String,
    #[serde(flatten)]
    pub outcome: UnitOutcome,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub units: Vec<UnitReport>,
}

impl RunReport {
    pub fn published(&self) -> impl Iterator<Item = &UnitReport> {
        self.units
            .iter()
            .filter(|unit| matches!(unit.outcome, UnitOutcome::Published { .. }))
    }
}

/// Working context of one (directory, language) pair.
struct GenerationUnit<'d> {
    directory: &'d ProtoDirectory,
    language: String,
    repository: String,
    clone_path: PathBuf,
}

impl GenerationUnit<'_> {
    fn fail(&self, stage: &'static str) -> impl FnOnce(GpmError) -> GpmError + '_ {
        move |source| GpmError::Unit {
            stage,
            directory: self.directory.name.clone(),
            language: self.language.clone(),
            repository: self.repository.clone(),
            source: Box::new(source),
        }
    }

    fn report(&self, outcome: UnitOutcome) -> UnitReport {
        UnitReport {
            directory: self.directory.name.clone(),
            language: self.language.clone(),
            repository: self.repository.clone(),
            outcome,
        }
    }
}

/// Removes the temporary paths of a run when dropped, whatever the outcome.
struct CleanupGuard {
    paths: Vec<PathBuf>,
    enabled: bool,
}

impl Drop for CleanupGuard {
    fn drop(&mut self) {
        if !self.enabled {
            warn!(paths = ?self.paths, "skipping removal of temporary directories");
            return;
        }
        debug!(paths = ?self.paths, "cleaning temporary directories");
        for path in &self.paths {
            remove_dir_best_effort(path);
        }
    }
}

fn remove_dir_best_effort(path: &Path) {
    if !path.exists() {
        return;
    }
    if let Err(e) = std::fs::remove_dir_all(path) {
        warn!(path = %path.display(), error = %e, "unable to delete temporary directory");
    }
}

pub struct Orchestrator<'a> {
    config: &'a ServiceConfig,
    generator: Box<dyn Generator>,
    provider: Box<dyn RepositoryProvider>,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        config: &'a ServiceConfig,
        generator: Box<dyn Generator>,
        provider: Box<dyn RepositoryProvider>,
    ) -> Self {
        Self {
            config,
            generator,
            provider,
        }
    }

    /// Wires the protoc-all generator and the git provider selected in `config`.
    pub fn from_config(config: &'a ServiceConfig) -> Result<Self> {
        let runner: Arc<dyn CommandRunner> = Arc::new(SystemCommandRunner::new(config.command_timeout));
        let generator = ProtoGenerator::from_config(config, Arc::clone(&runner));
        let provider = GitRepositoryProvider::from_config(config, runner)?;
        Ok(Self::new(config, Box::new(generator), Box::new(provider)))
    }

    /// Processes every proto directory of `project_root`.
    pub async fn run(&mut self, project_root: &Path) -> Result<RunReport> {
        debug!(project_root = %project_root.display(), "launching gpm");
        self.config.validate()?;
        self.config.log_summary();

        let _cleanup = CleanupGuard {
            paths: vec![
                project_root.join(GENERATED_DIR),
                self.config.temp_path.clone(),
            ],
            enabled: !self.config.skip_temp_removal,
        };

        self.prepare()?;

        // docker needs an absolute path for the volume mount
        let root = std::fs::canonicalize(project_root)
            .map_err(|e| GpmError::io("unable to resolve project root", project_root, e))?;

        let mut report = RunReport::default();
        for directory in list_proto_directories(&root)? {
            let span = info_span!("directory", name = %directory.name);
            self.process_directory(&root, &directory, &mut report)
                .instrument(span)
                .await?;
        }
        info!(
            units = report.units.len(),
            published = report.published().count(),
            "generation finished"
        );
        Ok(report)
    }

    /// Environment checks and provider setup done before touching any directory.
    fn prepare(&mut self) -> Result<()> {
        if self.config.generator.runs_in_container() {
            self.config.require_pusher_identity()?;
        }
        self.provider.configure_pusher(
            self.config.repository_pusher_username.clone(),
            self.config.repository_pusher_email.clone(),
            self.config.repository_access_token.clone(),
        )
    }

    /// Runs every target language of `directory` in order.
    pub async fn process_directory(
        &self,
        root: &Path,
        directory: &ProtoDirectory,
        report: &mut RunReport,
    ) -> Result<()> {
        info!(path = %directory.path.display(), "processing proto directory");
        let languages = load_proto_langs(&directory.path, &self.config.default_language)?;
        debug!(?languages, "target languages");

        for language in languages {
            let repository = repo_name(&directory.name, &language);
            let unit = GenerationUnit {
                directory,
                clone_path: self.config.temp_path.join(&repository),
                language,
                repository,
            };
            let outcome = self.process_unit(root, &unit).await;
            if !self.config.skip_temp_removal {
                remove_dir_best_effort(&unit.clone_path);
            }
            report.units.push(unit.report(outcome?));
        }
        Ok(())
    }

    async fn process_unit(&self, root: &Path, unit: &GenerationUnit<'_>) -> Result<UnitOutcome> {
        let repo_url = self
            .provider
            .repo_url(&self.config.repository_organization, &unit.repository)
            .map_err(unit.fail("resolve repository URL"))?;

        // Generated files carry timestamps, so only the protos are compared.
        self.provider
            .clone_repository(&repo_url, &unit.clone_path)
            .await
            .map_err(unit.fail("clone"))?;

        if self.config.force_regeneration {
            info!(repo = %unit.repository, "regeneration forced");
        } else {
            let unchanged =
                files::directories_equal(PROTO_EXTENSION, &unit.directory.path, &unit.clone_path)
                    .map_err(unit.fail("compare"))?;
            if unchanged {
                info!(repo = %unit.repository, "no changes detected, skipping generation");
                return Ok(UnitOutcome::Unchanged);
            }
        }

        self.generator
            .generate(root, &unit.directory.name, &unit.clone_path, &unit.language)
            .await
            .map_err(unit.fail("generate"))?;

        let previous = self
            .provider
            .last_version(&unit.clone_path)
            .await
            .map_err(unit.fail("read version"))?;
        debug!(previous = %previous, "version");

        if self.config.skip_publish {
            warn!(repo = %unit.repository, "changes will not be published");
            return Ok(UnitOutcome::Generated { previous });
        }

        let version = previous
            .increment_minor()
            .map_err(|source| GpmError::Version {
                repo: unit.clone_path.clone(),
                source,
            })
            .map_err(unit.fail("publish"))?;
        info!(new_version = %version, repo = %unit.repository, "publishing new version");
        self.provider
            .publish(&unit.clone_path, version)
            .await
            .map_err(unit.fail("publish"))?;
        Ok(UnitOutcome::Published { previous, version })
    }
}
