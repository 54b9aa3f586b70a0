//! CLI entry point for kotoba-audio.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Parser;
use kotoba_audio::search::TextTools;
use kotoba_audio::{AudioSourceManagerFactory, CacheStore, Config};
use tracing::{debug, info};

mod cli;
mod commands;
mod progress;

use cli::{Args, Command};

const APP_DIR_NAME: &str = "kotoba-audio";

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    debug!(?args, "CLI arguments parsed");

    let config = Config::load(&args.config)
        .with_context(|| format!("cannot load config from {}", args.config.display()))?;
    let data_dir = resolve_data_dir(args.data_dir.clone())?;
    info!(data_dir = %data_dir.display(), "opening audio source cache");
    let store = CacheStore::open(&data_dir).context("cannot open the cache store")?;
    let factory = AudioSourceManagerFactory::new(config, store, TextTools::default());

    match &args.command {
        Command::Init => commands::run_init_command(&factory, args.quiet).await,
        Command::Search { text } => {
            commands::init::init_with_spinner(&factory, args.quiet).await?;
            commands::run_search_command(&factory, text).await
        }
        Command::Stats => {
            commands::init::init_with_spinner(&factory, args.quiet).await?;
            commands::run_stats_command(&factory).await
        }
        Command::Download { text, dest } => {
            commands::init::init_with_spinner(&factory, args.quiet).await?;
            commands::run_download_command(&factory, text, dest, args.quiet).await
        }
        Command::Purge => commands::run_purge_command(&factory),
    }
}

/// `--data-dir`, else `$XDG_DATA_HOME/kotoba-audio`, else
/// `$HOME/.local/share/kotoba-audio`.
fn resolve_data_dir(explicit: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(dir) = explicit {
        return Ok(dir);
    }
    if let Some(xdg) = std::env::var_os("XDG_DATA_HOME").filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(xdg).join(APP_DIR_NAME));
    }
    if let Some(home) = std::env::var_os("HOME").filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(home)
            .join(".local")
            .join("share")
            .join(APP_DIR_NAME));
    }
    bail!("cannot determine a data directory, pass --data-dir")
}
