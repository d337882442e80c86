//! `vigil` — host monitoring agent for a fleet dashboard.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "vigil")]
#[command(about = "vigil — host monitoring agent for a fleet dashboard")]
#[command(version = vigil_core::VERSION)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the agent: bootstrap credentials, decrypt the configuration,
    /// then sample and publish on a fixed tick until quit
    Run {
        /// Path to the configuration document
        #[arg(long, default_value = "config.ini")]
        config: PathBuf,

        /// Override the sampling interval in seconds
        #[arg(long)]
        interval: Option<u64>,
    },

    /// Take one metric snapshot and print it as JSON (no publish, no password)
    Sample {
        /// Path to the configuration document
        #[arg(long, default_value = "config.ini")]
        config: PathBuf,
    },

    /// Encrypt the sensitive sections of a configuration document
    Encrypt {
        /// Document to encrypt
        file: PathBuf,

        /// Write here instead of in place
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Decrypt the sensitive sections of a configuration document
    Decrypt {
        /// Document to decrypt
        file: PathBuf,

        /// Write here instead of in place
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config, interval } => commands::run::run(&config, interval),
        Commands::Sample { config } => commands::sample::run(&config),
        Commands::Encrypt { file, output } => commands::cipher::run(&file, output.as_deref(), true),
        Commands::Decrypt { file, output } => {
            commands::cipher::run(&file, output.as_deref(), false)
        }
    }
}
