mod commands;
mod config;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use engine_logging::{engine_debug, engine_info, LogDestination};
use log::LevelFilter;

use crate::config::{AppConfig, ConfigSource, DEFAULT_CONFIG_FILENAME};

#[derive(Parser)]
#[command(
    name = "postharvest",
    about = "Collects post links and metadata from infinitely scrolling profile pages"
)]
struct Cli {
    /// RON config file
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILENAME)]
    config: PathBuf,
    /// Directory holding history and settings (overrides the config file)
    #[arg(long)]
    state_dir: Option<PathBuf>,
    /// Directory exports are saved to (overrides the config file)
    #[arg(long)]
    download_dir: Option<PathBuf>,
    /// Log to the terminal too, at debug level
    #[arg(short, long)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Collect posts until the page stops growing or Ctrl-C is pressed
    Collect {
        /// http(s) page URL, or a recording name when --replay-root is given
        target: String,
        /// Replay recorded scroll sessions from this directory
        #[arg(long)]
        replay_root: Option<PathBuf>,
        /// Save a stopped or interrupted job to history instead of dropping it
        #[arg(long)]
        commit_partial: bool,
    },
    /// List committed jobs, most recent first
    History {
        /// Print the full history as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print one committed job as JSON
    Show { id: u64 },
    /// Export a committed job to the download directory
    Export {
        id: u64,
        /// json, csv or xlsx
        #[arg(short, long, default_value = "csv")]
        format: String,
        /// File name to save as (default: <username>_<id>.<ext>)
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Delete every committed job
    Clear,
    /// Show or change persisted settings
    Settings {
        /// Scroll to the bottom before each extraction
        #[arg(long)]
        auto_scroll: Option<bool>,
    },
}

fn init_logging(config: &AppConfig, verbose: bool) {
    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    let destination = match (&config.log_file, verbose) {
        (Some(path), true) => LogDestination::Both(path.clone()),
        (Some(path), false) => LogDestination::File(path.clone()),
        (None, true) => LogDestination::Terminal,
        (None, false) => return,
    };
    engine_logging::initialize(destination, level);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let (mut config, source) = AppConfig::load(&cli.config)?;
    if let Some(dir) = cli.state_dir {
        config.state_dir = dir;
    }
    if let Some(dir) = cli.download_dir {
        config.download_dir = dir;
    }
    init_logging(&config, cli.verbose);
    match &source {
        ConfigSource::File(path) => engine_info!("loaded config from {:?}", path),
        ConfigSource::Defaults { missing } => {
            engine_debug!("no config at {:?}, using defaults", missing)
        }
    }

    match cli.command {
        Commands::Collect {
            target,
            replay_root,
            commit_partial,
        } => commands::collect(&config, &target, replay_root, commit_partial).await,
        Commands::History { json } => commands::history(&config, json).await,
        Commands::Show { id } => commands::show(&config, id).await,
        Commands::Export { id, format, output } => {
            commands::export(&config, id, &format, output).await
        }
        Commands::Clear => commands::clear(&config).await,
        Commands::Settings { auto_scroll } => commands::settings(&config, auto_scroll).await,
    }
}
