mod config;
mod logging;
mod statsd;

use clap::{Args, Parser};
use config::{Config, ConfigError};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "studio", version, about = "Studio website back office")]
enum CliCommand {
    /// Serve the back office HTTP API.
    Serve(ConfigArgs),
    /// Parse and validate a config file, then exit.
    ValidateConfig(ConfigArgs),
}

#[derive(Args)]
struct ConfigArgs {
    #[arg(long, short)]
    config: PathBuf,
}

#[derive(thiserror::Error, Debug)]
enum StudioError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Metrics(#[from] statsd::MetricsError),
    #[error("could not start runtime: {0}")]
    Runtime(#[from] std::io::Error),
    #[error(transparent)]
    Backoffice(#[from] backoffice::BackofficeError),
}

fn load_config(args: &ConfigArgs) -> Result<Config, ConfigError> {
    let config = Config::from_file(&args.config)?;
    config.validate()?;
    Ok(config)
}

fn serve(args: &ConfigArgs) -> Result<(), StudioError> {
    let config = load_config(args)?;

    let _sentry = logging::init(&config.common.logging);
    if let Some(metrics_config) = &config.common.metrics {
        statsd::init(metrics_config)?;
    }

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(backoffice::run(config.backoffice))?;
    Ok(())
}

fn main() -> ExitCode {
    let cli = CliCommand::parse();

    let result = match &cli {
        CliCommand::Serve(args) => serve(args),
        CliCommand::ValidateConfig(args) => load_config(args)
            .map(|_| println!("{} is valid", args.config.display()))
            .map_err(StudioError::from),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "studio exited with an error");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
