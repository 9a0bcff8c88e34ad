//! CLI entry point - the composition root.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use shark_cli::{Cli, handlers};
use shark_core::Settings;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let settings = Settings::from_env()?;
    let shark = handlers::open(&cli, &settings).await?;
    let output = handlers::run(&cli.command, &shark).await;
    shark.close().await;

    print!("{}", output?);
    Ok(())
}
