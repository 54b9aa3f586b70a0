//! Audio sources and resolved audio files.
//!
//! An [`AudioSource`] is a configured source paired with the rules for
//! locating its media: whether it lives on the local disk, and how paths
//! under it are joined. A [`FileUrlData`] is one resolved search hit.

use std::path::Path;

use crate::config::AudioSourceConfig;
use crate::db::CachedMeta;

/// One resolved audio file, produced fresh per query and never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileUrlData {
    /// Local path or remote URL of the audio bytes.
    pub url: String,
    /// Collision-free media filename, extension included.
    pub desired_filename: String,
    /// Headword the file was found under.
    pub word: String,
    /// Name of the source that supplied the file.
    pub source_name: String,
    /// Kana reading, empty when the source has none.
    pub reading: String,
    /// Dash-joined pitch numbers, `?` when unknown.
    pub pitch_number: String,
}

impl FileUrlData {
    /// Returns a copy with a different desired filename.
    #[must_use]
    pub fn with_desired_filename(&self, desired_filename: impl Into<String>) -> Self {
        Self {
            desired_filename: desired_filename.into(),
            ..self.clone()
        }
    }
}

/// A configured audio source.
///
/// Whether the URL names a local file is decided once, when the source is
/// built. Sources are rebuilt from config on every initialization pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioSource {
    config: AudioSourceConfig,
    local: bool,
}

impl AudioSource {
    /// Wraps a source config.
    #[must_use]
    pub fn from_cfg(config: AudioSourceConfig) -> Self {
        let local = std::fs::metadata(&config.url)
            .is_ok_and(|meta| meta.is_file() && meta.len() > 0);
        Self { config, local }
    }

    /// Returns the config this source was built from.
    ///
    /// Used to compare against the current configuration.
    #[must_use]
    pub fn to_cfg(&self) -> AudioSourceConfig {
        self.config.clone()
    }

    #[must_use]
    pub fn config(&self) -> &AudioSourceConfig {
        &self.config
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.config.name
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.config.url
    }

    #[must_use]
    pub fn enabled(&self) -> bool {
        self.config.enabled
    }

    /// True when the source URL pointed at an existing, non-empty local file
    /// when the source was built.
    #[must_use]
    pub fn is_local(&self) -> bool {
        self.local
    }

    /// True when the source is a zip archive on the local disk.
    #[must_use]
    pub fn is_local_zip(&self) -> bool {
        self.is_local()
            && Path::new(self.url())
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("zip"))
    }

    /// Joins two path components.
    ///
    /// Local paths are platform-dependent, URLs are always joined with `/`.
    #[must_use]
    pub fn join(&self, base: &str, name: &str) -> String {
        if self.is_local() {
            Path::new(base).join(name).to_string_lossy().into_owned()
        } else {
            join_url(base, name)
        }
    }

    /// Directory that holds the source's audio files.
    ///
    /// An absolute media dir in the cached metadata wins. Otherwise the
    /// relative media dir is resolved against the directory of the source URL.
    #[must_use]
    pub fn media_dir(&self, meta: &CachedMeta) -> String {
        if let Some(abs) = meta.media_dir_abs.as_deref().filter(|dir| !dir.is_empty()) {
            return abs.to_string();
        }
        self.join(&self.parent_dir(), &meta.media_dir)
    }

    fn parent_dir(&self) -> String {
        if self.is_local() {
            Path::new(self.url())
                .parent()
                .map(|parent| parent.to_string_lossy().into_owned())
                .unwrap_or_default()
        } else {
            self.url()
                .rsplit_once('/')
                .map_or_else(String::new, |(dir, _)| dir.to_string())
        }
    }
}

fn join_url(base: &str, name: &str) -> String {
    match (base.trim_end_matches('/'), name.trim_start_matches('/')) {
        ("", name) => name.to_string(),
        (base, "") => base.to_string(),
        (base, name) => format!("{base}/{name}"),
    }
}
