use std::{path::PathBuf, process};

use clap::{Parser, Subcommand};
use newsroom::{
    application::error::AppError,
    cache::Region,
    config,
    infra::{bootstrap, error::InfraError, telemetry},
};
use tracing::{Dispatch, Level, dispatcher, error, info};
use tracing_subscriber::fmt as tracing_fmt;

/// Command-line arguments for the newsroom binary.
#[derive(Debug, Parser)]
#[command(name = "newsroom", version, about = "Newsroom cache and deletion core")]
struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "NEWSROOM_CONFIG_FILE", value_name = "PATH")]
    config_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone, Copy)]
enum Command {
    /// Resolve configuration, wire the services and report the cache layout.
    Check,
}

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, chain = ?error.chain(), "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, chain = ?error.chain(), "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let args = CliArgs::parse();
    let settings = config::load(args.config_file.as_deref()).map_err(InfraError::from)?;

    telemetry::init(&settings.logging)?;

    match args.command.unwrap_or(Command::Check) {
        Command::Check => {
            let (context, _store) = bootstrap::in_memory(&settings)?;
            for region in Region::ALL {
                info!(
                    region = %region,
                    active = context.cache.generation(region).is_some(),
                    "Cache region"
                );
            }
            Ok(())
        }
    }
}
