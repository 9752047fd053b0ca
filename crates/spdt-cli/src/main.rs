//! spdt: derives scaling policies for a service from a load forecast.
//!
//! # Usage
//!
//! ```text
//! spdt init --app shop --service frontend
//! spdt intervals --config spdt.toml
//! spdt derive --config spdt.toml --algorithm only-delta-load --output policy.json
//! spdt derive --config spdt.toml --force
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use spdt_core::Algorithm;

mod commands;

#[derive(Parser)]
#[command(
    name = "spdt",
    about = "Scaling policy derivation from load forecasts",
    version,
    propagate_version = true
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Derive candidate policies, score them, and select one within budget.
    Derive {
        /// Path to spdt.toml
        #[arg(short, long, default_value = "spdt.toml")]
        config: PathBuf,
        /// Run a single strategy instead of the configured choice.
        #[arg(short, long)]
        algorithm: Option<Algorithm>,
        /// Write the report here instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Derive even if the forecast barely changed since the last run.
        #[arg(long)]
        force: bool,
    },
    /// Print the critical intervals of the configured forecast.
    Intervals {
        #[arg(short, long, default_value = "spdt.toml")]
        config: PathBuf,
    },
    /// Generate an spdt.toml scaffold.
    Init {
        #[arg(long)]
        app: String,
        /// Service whose replicas are scaled.
        #[arg(long)]
        service: String,
        /// Directory to write spdt.toml into.
        #[arg(short, long, default_value = ".")]
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new("info,spdt=debug"))?;
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Derive {
            config,
            algorithm,
            output,
            force,
        } => commands::derive::derive(&config, algorithm, output.as_deref(), force).await,
        Commands::Intervals { config } => commands::intervals::intervals(&config),
        Commands::Init { app, service, path } => commands::init::init(&app, &service, &path),
    }
}
