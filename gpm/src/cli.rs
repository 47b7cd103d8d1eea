//! # gpm CLI
//!
//! Command parsing and the async [`run`] entrypoint shared by `main` and the
//! integration tests. Everything past configuration loading lives in `gpm-core`.
//!
//! Flag names are kebab-case; the camelCase spellings of the first releases
//! (`--tempPath`, `--skipPublish`, ...) are kept as aliases.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use gpm_core::config::GeneratorKind;
use gpm_core::orchestrator::Orchestrator;
use tracing::info;

use crate::load_config::load_config;

/// gRPC proto manager: orchestrates the generation of gRPC protos.
#[derive(Debug, Parser)]
#[command(
    name = "gpm",
    version,
    about = "gRPC proto manager",
    long_about = "A simple manager to orchestrate the generation of gRPC protos"
)]
pub struct Cli {
    /// Enable debug log
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Generate the resulting stubs for a collection of proto specs
    ///
    /// Example: `gpm generate .` generates all the protos from the current directory.
    Generate {
        /// Root of the proto project, also where `.gpm.yaml` is read from
        base_path: PathBuf,

        #[command(flatten)]
        options: GenerateOptions,
    },
}

/// Flags of `generate`. They take precedence over `.gpm.yaml` and `GPM_*` variables.
#[derive(Debug, Clone, Default, Args)]
pub struct GenerateOptions {
    /// Temporal directory for the generation of intermediate data [default: /tmp/gpm]
    #[arg(long, alias = "tempPath")]
    pub temp_path: Option<PathBuf>,

    /// Implementation used to generate the proto code: docker, or dockerized [default: docker]
    #[arg(long, alias = "protoGenerator")]
    pub proto_generator: Option<GeneratorKind>,

    /// Image used to generate the protos in docker mode [default: namely/protoc-all:1.51_2]
    #[arg(long, alias = "dockerCmdImage")]
    pub docker_cmd_image: Option<String>,

    /// Access token of the repository provider. Use this for GitHub actions.
    #[arg(long, alias = "repositoryAccessToken")]
    pub repository_access_token: Option<String>,

    /// Author name of the published commits, required when running in a container
    #[arg(long, alias = "repositoryPusherUsername")]
    pub repository_pusher_username: Option<String>,

    /// Author email of the published commits, required when running in a container
    #[arg(long, alias = "repositoryPusherEmail")]
    pub repository_pusher_email: Option<String>,

    /// Skip publishing the generated protos
    #[arg(long, alias = "skipPublish")]
    pub skip_publish: bool,

    /// Keep the temporal directories. Intended for local development only.
    #[arg(long, alias = "skipTempRemoval")]
    pub skip_temp_removal: bool,

    /// Force the regeneration of all target protos
    #[arg(long, alias = "forceRegeneration")]
    pub force_regeneration: bool,
}

/// Async CLI entrypoint for `main` and integration tests.
pub async fn run(cli: Cli) -> Result<()> {
    tracing::info!("trace_initialised");

    match cli.command {
        Commands::Generate { base_path, options } => {
            let config = load_config(&base_path, &options)?;
            info!(command = "generate", path = %base_path.display(), "starting generation");

            let mut orchestrator = Orchestrator::from_config(&config)?;
            let report = orchestrator.run(&base_path).await?;

            let report = serde_json::to_string(&report).context("unable to serialise run report")?;
            info!(command = "generate", %report, "generation complete");
            Ok(())
        }
    }
}
