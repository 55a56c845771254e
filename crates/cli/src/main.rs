//! Sift CLI
//!
//! Evidence-grounded answers over a local multimodal corpus.

mod commands;

use anyhow::Context;
use clap::{Parser, Subcommand};
use commands::{AskCommand, ChatCommand};
use sift_core::{config::AppConfig, logging};
use std::path::PathBuf;

/// Sift - answers that know how sure they are
#[derive(Parser, Debug)]
#[command(name = "sift")]
#[command(about = "Evidence-grounded answers over a local corpus", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to workspace directory (default: current directory)
    #[arg(short, long, global = true, env = "SIFT_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Path to config file
    #[arg(short, long, global = true, env = "SIFT_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, env = "RUST_LOG")]
    log_level: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    no_color: bool,

    /// Scores below this get a cautious answer
    #[arg(long, global = true, env = "SIFT_CONFIDENCE_THRESHOLD")]
    confidence_threshold: Option<f32>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Answer one question from a corpus
    Ask(AskCommand),

    /// Interactive session over a corpus
    Chat(ChatCommand),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command-line arguments first (needed for logging config)
    let cli = Cli::parse();

    let config = AppConfig::load().context("Failed to load configuration")?;

    // CLI flags win over file and environment
    let config = config.with_overrides(
        cli.workspace,
        cli.config,
        cli.log_level,
        cli.confidence_threshold,
        cli.verbose,
        cli.no_color,
    );
    config.validate().context("Invalid configuration")?;

    logging::init_logging(config.log_level.as_deref(), config.no_color)?;

    tracing::info!("Sift CLI starting");
    tracing::debug!("Workspace: {:?}", config.workspace);

    let command_name = match &cli.command {
        Commands::Ask(_) => "ask",
        Commands::Chat(_) => "chat",
    };
    let _span = tracing::info_span!("command", name = command_name).entered();

    let result = match cli.command {
        Commands::Ask(cmd) => cmd.execute(&config).await,
        Commands::Chat(cmd) => cmd.execute(&config).await,
    };

    match &result {
        Ok(_) => tracing::info!("Command completed successfully"),
        Err(e) => tracing::error!("Command failed: {}", e),
    }

    result.with_context(|| format!("sift {} failed", command_name))
}
