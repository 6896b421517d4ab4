#![forbid(unsafe_code)]

use anyhow::Result;
use clap::Parser;
use tracing::info;

use dualstore::config::Config;
use dualstore::db::DatabaseManager;
use dualstore::utils;

mod cli;

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Cli::parse();

    let config = match &args.config {
        Some(path) => Config::load_from_file(path)?,
        None => Config::load()?,
    };
    utils::logging::init_tracing(&config.logging);
    info!("dualstore starting up mode={:?}", config.database.mode);

    let manager = DatabaseManager::connect(&config).await?;
    let outcome = cli::run(args.command, &manager).await;
    manager.shutdown().await;

    info!("dualstore shutting down");
    outcome
}
