//! `slim` binary entry point.

use clap::Parser;
use slim_cli::cli::Cli;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("slim=info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();

    let output = slim_cli::run(cli).await?;
    if !output.is_empty() {
        println!("{output}");
    }
    Ok(())
}
