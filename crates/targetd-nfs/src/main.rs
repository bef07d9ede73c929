#![warn(missing_docs)]

//! targetd NFS export management command

use clap::Parser;
use targetd_nfs::cli::Cli;
use targetd_nfs::config::TargetdConfig;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = TargetdConfig::load(&cli.config)?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    if !cli.config.exists() {
        tracing::warn!("Config file not found, using defaults: {}", cli.config.display());
    }
    tracing::debug!(config = ?config, "targetd-nfs starting");

    cli.run(config).await
}
