use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;
mod configuration;
mod error;
mod functions;

use commands::run::RunArgs;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Send a prompt to the model and let it call the built-in functions
    Run {
        /// The user message to start from
        prompt: String,

        /// TOML settings file, overridden by FNCALL_* environment variables
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Maximum number of model calls
        #[arg(long)]
        max_rounds: Option<usize>,

        /// System message placed before the prompt
        #[arg(short, long)]
        system: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "fncall=warn".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Run {
            prompt,
            config,
            max_rounds,
            system,
        } => {
            commands::run::execute(RunArgs {
                prompt,
                config,
                max_rounds,
                system,
            })
            .await
        }
    }
}
