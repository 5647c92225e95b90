mod build_client;
mod chain;
mod commands;
mod config;
mod forge;
mod keystore;
mod server;
mod services;

use clap::Parser;
use color_eyre::eyre::{eyre, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use commands::Command;

#[derive(Parser)]
#[command(name = "kiln")]
#[command(about = "Build, deploy and call smart contracts from the terminal")]
#[command(version)]
struct Cli {
    /// More log output on stderr (-v info, -vv debug, -vvv trace). RUST_LOG wins when set.
    #[arg(long, short, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

fn init_logging(verbose: u8) -> Result<()> {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().or_else(|_| {
        EnvFilter::try_new(format!(
            "warn,kiln_cli={level},kiln_core={level},kiln_db={level}"
        ))
    })?;

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(verbose > 1)
                .with_writer(std::io::stderr),
        )
        .try_init()
        .map_err(|e| eyre!("Failed to initialize logging: {}", e))
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    init_logging(cli.verbose)?;

    cli.command.run().await
}
