//! # generator: turn a proto directory into language stubs
//!
//! Generation is delegated to the `namely/protoc-all` tool chain, either by
//! launching its image with `docker run` or, when gpm already runs inside that
//! image, by calling its entrypoint directly. Both variants share the same
//! flags and the same post-processing:
//!
//! 1. every file of the source directory is copied next to the generated code,
//!    so the published repository also carries the proto definitions;
//! 2. the tool output under `<root>/generated` is moved into the working copy
//!    and the `generated` tree is deleted.
//!
//! The [`Generator`] trait is the seam used by the orchestrator and is mocked in tests.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
#[cfg(any(test, feature = "test-export-mocks"))]
use mockall::automock;
use tracing::{debug, info};

use crate::command::{CommandRunner, Invocation};
use crate::config::{GeneratorKind, ServiceConfig};
use crate::error::Result;
use crate::files;

/// Directory, relative to the project root, where the tool writes its output.
pub const GENERATED_DIR: &str = "generated";
/// Mount point of the project root inside the generator container.
pub const CONTAINER_DEFS_PATH: &str = "/defs";
/// Generator entrypoint available on the PATH inside the generator image.
pub const IN_CONTAINER_ENTRYPOINT: &str = "entrypoint.sh";

const GATEWAY_LANGUAGE: &str = "go";
const VALIDATOR_LANGUAGES: &[&str] = &["go", "gogo", "cpp", "java", "python"];

#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait Generator: Send + Sync {
    /// Generates the stubs of `root_path/target_name` for `language` into `output_path`.
    async fn generate(
        &self,
        root_path: &Path,
        target_name: &str,
        output_path: &Path,
        language: &str,
    ) -> Result<()>;
}

/// Extra tool flags for a language: grpc-gateway stubs for Go, validators
/// for the languages protoc-gen-validate supports.
pub fn language_flags(language: &str) -> Vec<&'static str> {
    let mut flags = Vec::new();
    if language == GATEWAY_LANGUAGE {
        flags.push("--with-gateway");
    }
    if VALIDATOR_LANGUAGES.contains(&language) {
        flags.push("--with-validator");
    }
    flags
}

/// Generator backed by the protoc-all tool, in either of its two launch modes.
pub struct ProtoGenerator {
    kind: GeneratorKind,
    image: String,
    runner: Arc<dyn CommandRunner>,
}

impl ProtoGenerator {
    pub fn new(kind: GeneratorKind, image: impl Into<String>, runner: Arc<dyn CommandRunner>) -> Self {
        debug!(generator = %kind, "using proto generator");
        Self {
            kind,
            image: image.into(),
            runner,
        }
    }

    pub fn from_config(config: &ServiceConfig, runner: Arc<dyn CommandRunner>) -> Self {
        Self::new(config.generator, config.docker_image.clone(), runner)
    }

    pub fn kind(&self) -> GeneratorKind {
        self.kind
    }

    /// Command line that generates `target_name` for `language`.
    pub fn invocation(&self, root_path: &Path, target_name: &str, language: &str) -> Invocation {
        let mut args: Vec<String> = Vec::new();
        let program = match self.kind {
            GeneratorKind::Docker => {
                args.extend([
                    "run".to_string(),
                    "--rm".to_string(),
                    "-v".to_string(),
                    format!("{}:{}", root_path.display(), CONTAINER_DEFS_PATH),
                    self.image.clone(),
                ]);
                "docker"
            }
            GeneratorKind::Dockerized => IN_CONTAINER_ENTRYPOINT,
        };
        args.extend(
            ["-l", language, "-d", target_name, "-i", ".", "-o", GENERATED_DIR]
                .into_iter()
                .map(str::to_string),
        );
        args.extend(language_flags(language).into_iter().map(str::to_string));

        let invocation = Invocation::new(program, args);
        match self.kind {
            GeneratorKind::Docker => invocation,
            GeneratorKind::Dockerized => invocation.in_dir(root_path),
        }
    }
}

#[async_trait]
impl Generator for ProtoGenerator {
    async fn generate(
        &self,
        root_path: &Path,
        target_name: &str,
        output_path: &Path,
        language: &str,
    ) -> Result<()> {
        debug!(
            root_path = %root_path.display(),
            target_name,
            output_path = %output_path.display(),
            language,
            "generating protos"
        );
        let invocation = self.invocation(root_path, target_name, language);
        let finished = self.runner.run(invocation.clone()).await?.check(&invocation)?;
        debug!(output = %finished.output, "protos successfully generated");

        files::copy_all_source_files(&root_path.join(target_name), output_path)?;
        files::move_generated_files(&root_path.join(GENERATED_DIR), output_path)?;
        info!(target_name, language, output_path = %output_path.display(), "stubs generated");
        Ok(())
    }
}
