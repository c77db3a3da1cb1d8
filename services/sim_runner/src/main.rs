//! Simulation runner entry point

use anyhow::{Context, Result};
use clap::Parser;
use runner_config::ConfigLoader;
use sim_runner::{modes, Cli, Mode};
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn default_filter(verbose: u8) -> &'static str {
    match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Results go to stdout; logs go to stderr
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter(cli.verbose).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!("Booting up");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let mut loader = ConfigLoader::new();
    if let Some(path) = &cli.config {
        loader = loader.file(path);
    }

    match cli.mode {
        Mode::Wss(args) => {
            let config = args.apply(loader).load().context("loading configuration")?;
            modes::run_worker(&config).await?;
            Ok(ExitCode::SUCCESS)
        }
        Mode::Cli(args) => {
            let config = args.apply(loader).load().context("loading configuration")?;
            config.validate()?;
            let outcome = if args.new {
                modes::run_local_batch(&args.opcodes).await?
            } else {
                modes::run_remote_batch(&config, &args.opcodes).await?
            };
            Ok(if outcome.is_success() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Mode::ShowConfig => {
            let config = loader.load().context("loading configuration")?;
            print!("{}", config.to_toml()?);
            Ok(ExitCode::SUCCESS)
        }
    }
}
