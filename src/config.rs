//! Audio source configuration and audio settings.
//!
//! The configuration is owned by the host application. This crate only reads
//! it: the list of [`AudioSourceConfig`]s decides which sources get cached and
//! searched, and [`AudioSettings`] carries timeouts, the attempt budget and the
//! search post-processing switches.
//!
//! # Example
//!
//! ```
//! use kotoba_audio::config::Config;
//!
//! let config = Config::from_json_str(
//!     r#"{"audio_sources": [{"enabled": true, "name": "NHK-2016", "url": "/data/nhk.json"}]}"#,
//! )
//! .unwrap();
//! assert_eq!(config.iter_audio_sources().count(), 1);
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default number of concurrent file downloads.
pub const DEFAULT_CONCURRENCY: usize = 10;

/// Minimum allowed concurrency value.
pub const MIN_CONCURRENCY: usize = 1;

/// Maximum allowed concurrency value.
pub const MAX_CONCURRENCY: usize = 100;

/// Default separator between multiple readings in a reading annotation.
const DEFAULT_READING_SEPARATOR: &str = ", ";

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read config file {}: {source}", path.display())]
    Read {
        /// Path of the config file.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The config file is not valid JSON or has the wrong shape.
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    /// A value is present but unusable.
    #[error("invalid config value: {0}")]
    Invalid(String),
}

/// One configured provider of pronunciation audio.
///
/// Identity is `name`. Two configs with the same `name` but a different `url`
/// describe a source whose origin changed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AudioSourceConfig {
    /// Disabled sources are skipped entirely.
    pub enabled: bool,
    /// User-given name, e.g. `NHK-2016`.
    pub name: String,
    /// Local file path, local `.zip` path, or remote URL of the source index.
    pub url: String,
}

impl AudioSourceConfig {
    /// Creates an enabled source config.
    #[must_use]
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            enabled: true,
            name: name.into(),
            url: url.into(),
        }
    }

    /// Returns a copy with the `enabled` flag set.
    #[must_use]
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// A source is usable only when both its name and its URL are set.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self.name.trim().is_empty() && !self.url.trim().is_empty()
    }
}

/// Download and search settings.
///
/// Missing fields in the config file fall back to [`AudioSettings::default`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioSettings {
    /// Per-attempt timeout for index downloads, in seconds.
    pub dictionary_download_timeout: u64,
    /// Per-attempt timeout for audio file downloads, in seconds.
    pub audio_download_timeout: u64,
    /// Number of attempts per download.
    pub attempts: u32,
    /// Upper bound on the number of search results returned.
    pub maximum_results: usize,
    /// Drop hits whose reading looks like an inflected form of the headword.
    pub ignore_inflections: bool,
    /// Keep only hits from the first source that answered for each word.
    pub stop_if_one_source_has_results: bool,
    /// Consult the morphological analyzer for words that yield nothing.
    pub split_morphemes: bool,
    /// Separator placed between `[sound:...]` tags.
    pub tag_separator: String,
    /// Maximum number of concurrent file downloads.
    pub concurrency: usize,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            dictionary_download_timeout: 30,
            audio_download_timeout: 10,
            attempts: 3,
            maximum_results: 99,
            ignore_inflections: false,
            stop_if_one_source_has_results: false,
            split_morphemes: true,
            tag_separator: "<br>".to_string(),
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

/// The slice of host configuration this crate consumes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Download and search settings.
    #[serde(default)]
    pub audio_settings: AudioSettings,
    /// Audio sources in user-defined order. Order matters for search precedence.
    #[serde(default)]
    pub audio_sources: Vec<AudioSourceConfig>,
    /// Separator between alternative readings inside a reading annotation.
    #[serde(default = "default_reading_separator")]
    pub reading_separator: String,
}

fn default_reading_separator() -> String {
    DEFAULT_READING_SEPARATOR.to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            audio_settings: AudioSettings::default(),
            audio_sources: Vec::new(),
            reading_separator: default_reading_separator(),
        }
    }
}

impl Config {
    /// Loads and validates a JSON config file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] if the file can't be read,
    /// [`ConfigError::Parse`] if it isn't valid JSON of the expected shape,
    /// or [`ConfigError::Invalid`] if validation fails.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    /// Parses and validates a JSON config string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] or [`ConfigError::Invalid`].
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Validates config values.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when concurrency is out of range or
    /// two valid sources share a name.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let concurrency = self.audio_settings.concurrency;
        if !(MIN_CONCURRENCY..=MAX_CONCURRENCY).contains(&concurrency) {
            return Err(ConfigError::Invalid(format!(
                "`concurrency` is {concurrency}, expected range: {MIN_CONCURRENCY}..={MAX_CONCURRENCY}"
            )));
        }

        let mut seen = HashSet::new();
        for source in self.iter_audio_sources() {
            if !seen.insert(source.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "audio source name `{}` is used more than once",
                    source.name
                )));
            }
        }
        Ok(())
    }

    /// Iterates valid audio sources in configured order.
    pub fn iter_audio_sources(&self) -> impl Iterator<Item = &AudioSourceConfig> {
        self.audio_sources.iter().filter(|source| source.is_valid())
    }

    /// Sources the host currently needs: valid and enabled, in configured order.
    #[must_use]
    pub fn enabled_sources(&self) -> Vec<AudioSourceConfig> {
        self.iter_audio_sources()
            .filter(|source| source.enabled)
            .cloned()
            .collect()
    }
}
