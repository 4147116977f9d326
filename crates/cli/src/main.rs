mod cli;
mod evaluate;
mod status;
mod train;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use motifguard_core::config::{load_dotenv, StorageConfig};
use motifguard_core::Config;

use crate::cli::{CliArgs, Command};

fn load_config(args: &CliArgs) -> Result<Config> {
    load_dotenv();
    let mut config = Config::load(args.config.as_deref()).context("failed to load configuration")?;
    if let Some(dir) = &args.data_dir {
        config.storage = StorageConfig::new(dir);
    }
    if let Command::Train {
        threads: Some(threads),
        ..
    } = args.command
    {
        config.worker.threads = threads;
    }
    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = CliArgs::parse();
    let config = load_config(&args)?;
    config.log_summary();

    match &args.command {
        Command::Train { input, .. } => train::train(&config, input),
        Command::Evaluate {
            input,
            policy,
            threshold,
        } => evaluate::evaluate(&config, input, *policy, *threshold),
        Command::Status => status::status(&config),
    }
}
