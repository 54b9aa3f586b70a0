//! Kotoba Audio Library
//!
//! Locates pronunciation audio for Japanese words across user-configured
//! audio sources. Each source ships an index (JSON, optionally zipped,
//! local or remote) mapping headwords to audio files. Indices are cached in
//! a local SQLite store, looked up with kana and reading-annotation
//! fallbacks, and the chosen files are downloaded into a media folder.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`config`] - Sources and settings, loaded from JSON
//! - [`index`] - Decoding source indices (plain or zipped JSON)
//! - [`db`] - Cache store and exclusively-owned sessions
//! - [`download`] - HTTP fetching with retries, download-and-save batches
//! - [`source`] - Audio sources and resolved audio files
//! - [`manager`] - Keeping the cache in sync with configured sources
//! - [`search`] - Free-text audio search with fallbacks
//! - [`kana`] - Kana conversions used when matching readings

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod db;
pub mod download;
pub mod index;
pub mod kana;
pub mod manager;
pub mod search;
pub mod source;
mod user_agent;

#[cfg(test)]
mod test_support;

// Re-export commonly used types
pub use config::{AudioSettings, AudioSourceConfig, Config, ConfigError};
pub use db::{CacheSession, CacheStore, StoreError};
pub use download::{
    AudioManagerError, DownloadEngine, EngineError, FetchRequest, FileSaveResults, HttpClient,
    MediaDirectory, MediaLibrary,
};
pub use index::{FileInfo, SourceIndex, SourceMeta};
pub use manager::{AudioSourceManager, AudioSourceManagerFactory, InitResult, TotalAudioStats};
pub use search::{SearchOptions, TextTools, format_audio_tags, search_audio};
pub use source::{AudioSource, FileUrlData};
pub use user_agent::BROWSER_USER_AGENT;
