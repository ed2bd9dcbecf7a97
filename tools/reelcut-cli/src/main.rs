//! Reelcut CLI: assemble short-form videos from raw segments.
//!
//! Usage:
//!   reelcut produce <JOB>      Run a post-production job
//!   reelcut validate <JOB>     Validate a job file and its inputs
//!   reelcut probe <FILE>       Show what ffprobe reports for a file
//!   reelcut check              Check that ffmpeg and ffprobe are usable

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "reelcut",
    about = "Assemble vertical short-form videos with subtitles and ducked music",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Engine config file (defaults to the user config)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a post-production job
    Produce {
        /// Path to the job file (JSON)
        job: PathBuf,

        /// Output file path (overrides the job file)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Print the produced video's description as JSON
        #[arg(long)]
        json: bool,
    },

    /// Validate a job file and check its inputs exist
    Validate {
        /// Path to the job file (JSON)
        job: PathBuf,
    },

    /// Show container and stream properties of a media file
    Probe {
        /// Media file to probe
        path: PathBuf,

        /// Print the probe result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check that the media tools are installed
    Check,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => reelcut_common::config::EngineConfig::load_from(path)
            .map_err(|e| anyhow::anyhow!("Failed to load config {}: {e}", path.display()))?,
        None => reelcut_common::config::EngineConfig::load(),
    };

    // Initialize logging
    if cli.verbose {
        config.logging.level = "debug".to_string();
    }
    reelcut_common::logging::init_logging(&config.logging);

    match cli.command {
        Commands::Produce { job, output, json } => {
            commands::produce::run(config, job, output, json).await
        }
        Commands::Validate { job } => commands::validate::run(job),
        Commands::Probe { path, json } => commands::probe::run(config, path, json).await,
        Commands::Check => commands::check::run(config).await,
    }
}
