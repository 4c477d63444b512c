//! PORTCULLIS CLI
//!
//! Validates gateway configurations and decides synthesized requests
//! against the configured rules.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod commands;
mod config;
mod logging;

use clap::{Parser, Subcommand};
use color_eyre::eyre::WrapErr;
use color_eyre::Result;
use commands::DecideArgs;
use config::{Gateway, GatewayConfig};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "portcullis")]
#[command(about = "PORTCULLIS - Access-control rule pipeline", long_about = None)]
struct Cli {
    /// Path to the gateway configuration
    #[arg(short, long, global = true, default_value = "portcullis.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load the configuration, every mechanism and the rule set
    Validate,
    /// Run a rule against a request and print the decision as JSON
    Decide(DecideArgs),
}

fn load(path: &Path) -> Result<Gateway> {
    let config = GatewayConfig::load(path)?;
    logging::init(&config.log)?;
    tracing::debug!(config = %path.display(), "configuration loaded");
    Gateway::build(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    let gateway = load(&cli.config)?;

    match cli.command {
        Commands::Validate => {
            println!("{}", commands::validate(&gateway));
            Ok(())
        }
        Commands::Decide(args) => {
            let decision = commands::decide(&gateway, &args).await?;
            let output = serde_json::to_string_pretty(&decision).wrap_err("failed to encode decision")?;
            println!("{}", output);
            Ok(())
        }
    }
}
