use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use wayfinder::config::Config;
use wayfinder::gateway;

#[derive(Parser)]
#[command(name = "wayfinder", version, about = "Assistive navigation backend")]
struct Cli {
    /// Path to a TOML config file. Environment variables override it.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP gateway (the default).
    Serve,
    /// Load the config, validate provider credentials, and exit.
    CheckConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => gateway::run_gateway(config).await,
        Command::CheckConfig => {
            config.validate_keys()?;
            println!(
                "config ok: environment={}, listening on {}:{}",
                config.environment, config.server.host, config.server.port
            );
            Ok(())
        }
    }
}
