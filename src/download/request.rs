//! Identity of a fetch: either a source index or one audio file.

use crate::config::AudioSourceConfig;
use crate::source::FileUrlData;

/// What a fetch is for. Decides which timeout applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    /// A source index (dictionary). Large, gets the longer timeout.
    Index,
    /// A single audio file.
    File,
}

/// The request a fetch was made for.
///
/// Carried by every [`AudioManagerError`](super::AudioManagerError) so callers
/// can tell which source or file failed by pattern matching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchRequest {
    /// Fetching the index of an audio source.
    Source(AudioSourceConfig),
    /// Fetching the bytes of a resolved audio file.
    File(FileUrlData),
}

impl FetchRequest {
    #[must_use]
    pub fn kind(&self) -> RequestKind {
        match self {
            Self::Source(_) => RequestKind::Index,
            Self::File(_) => RequestKind::File,
        }
    }

    /// Location being fetched.
    #[must_use]
    pub fn url(&self) -> &str {
        match self {
            Self::Source(source) => &source.url,
            Self::File(file) => &file.url,
        }
    }

    /// Name of the audio source involved.
    #[must_use]
    pub fn source_name(&self) -> &str {
        match self {
            Self::Source(source) => &source.name,
            Self::File(file) => &file.source_name,
        }
    }
}

impl From<AudioSourceConfig> for FetchRequest {
    fn from(source: AudioSourceConfig) -> Self {
        Self::Source(source)
    }
}

impl From<FileUrlData> for FetchRequest {
    fn from(file: FileUrlData) -> Self {
        Self::File(file)
    }
}
