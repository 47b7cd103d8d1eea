use anyhow::Result;
use clap::Parser;
use gpm::cli::{run, Cli};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let _log_guard = gpm::logging::init(cli.debug);
    tracing::debug!("CLI arguments parsed, invoking run");

    let result = run(cli).await;
    if let Err(e) = &result {
        tracing::error!("generation failed: {e:#}");
    }
    result
}
