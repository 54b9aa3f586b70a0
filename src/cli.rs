//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Find, cache and download pronunciation audio.
///
/// A debug driver for the kotoba-audio library. Audio sources are read from
/// a JSON config file and cached in a local store.
#[derive(Parser, Debug)]
#[command(name = "kotoba-audio")]
#[command(author, version, about)]
pub struct Args {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Config file with audio sources and settings
    #[arg(long, global = true, default_value = "kotoba-audio.json")]
    pub config: PathBuf,

    /// Directory holding the cache store (default: $XDG_DATA_HOME/kotoba-audio)
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Fetch and cache every enabled audio source
    Init,

    /// Search audio files for a word or sentence
    Search {
        /// Text to search, e.g. `雨` or `辛[から]い`
        text: String,
    },

    /// Show file and headword counts of initialized sources
    Stats,

    /// Search audio and save the results into a directory
    Download {
        /// Text to search
        text: String,

        /// Destination media directory
        #[arg(short, long)]
        dest: PathBuf,
    },

    /// Delete the cache store
    Purge,
}
