mod app;
mod commands;
mod render;

use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use inksync_lib::config::Config;

#[derive(Parser)]
#[command(name = "inksync-cli", about = "Offline stroke queue and sync client", version)]
struct Cli {
    /// Config file (default: <config dir>/inksync/inksync.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the server URL from the config
    #[arg(long, global = true)]
    server: Option<String>,

    /// Output format
    #[arg(long, global = true, default_value = "plain")]
    format: OutputFormat,

    /// Disable ANSI colors
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Plain,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Queue a batch of strokes for a page
    Enqueue {
        /// Target page id
        #[arg(long)]
        page: String,
        /// JSON file with a stroke array or {"strokes": [...]} ("-" for stdin)
        file: String,
    },

    /// Show pending batches and the drain state
    Status,

    /// Run one drain pass and exit
    Drain,

    /// Keep draining in the background until Ctrl-C
    Run,

    /// Drop pending batches older than the configured age
    Purge {
        /// Override the maximum age in hours
        #[arg(long)]
        max_age_hours: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = Config::load(cli.config.as_deref()).context("Failed to load config")?;

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&config.log_level))
        .init();

    if let Some(server) = cli.server {
        config.client.server_url = server;
    }
    let use_color = !cli.no_color && std::io::stdout().is_terminal();

    let app = app::App::new(config)?;

    match cli.command {
        Command::Enqueue { page, file } => {
            commands::enqueue::run(&app, &page, &file, &cli.format)?;
        }
        Command::Status => {
            commands::status::run(&app, &cli.format, use_color).await?;
        }
        Command::Drain => {
            commands::drain::run(&app, &cli.format, use_color).await?;
        }
        Command::Run => {
            commands::run::run(&app).await?;
        }
        Command::Purge { max_age_hours } => {
            commands::purge::run(&app, max_age_hours, &cli.format)?;
        }
    }

    Ok(())
}
