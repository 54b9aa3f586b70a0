//! Error types for the download module.
//!
//! One error type covers both index fetches and audio file fetches. Every
//! variant carries the [`FetchRequest`] it failed for, so batch callers can
//! report which source or file went wrong.

use std::path::PathBuf;

use thiserror::Error;

use super::FetchRequest;
use crate::db::StoreError;

/// Errors raised while fetching, decoding or installing audio data.
#[derive(Debug, Error)]
pub enum AudioManagerError {
    /// Network-level error (DNS resolution, connection refused, TLS errors, etc.)
    #[error("{} download failed with {source}", .request.url())]
    Network {
        /// The request that failed.
        request: FetchRequest,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// Every attempt timed out.
    #[error("{} download timed out after {attempts} attempt(s)", .request.url())]
    Timeout {
        /// The request that timed out.
        request: FetchRequest,
        /// Number of attempts made.
        attempts: u32,
    },

    /// Non-success HTTP status.
    #[error("{} download failed with return code {status}", .request.url())]
    HttpStatus {
        /// The request that returned an error status.
        request: FetchRequest,
        /// The HTTP status code.
        status: u16,
    },

    /// Local read or media write failed.
    #[error("{} failed with IO error on {}: {source}", .request.url(), .path.display())]
    Io {
        /// The request involved.
        request: FetchRequest,
        /// The file path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The index isn't valid JSON of the expected shape.
    #[error("{} is not a valid audio source index: {source}", .request.url())]
    Json {
        /// The source whose index is malformed.
        request: FetchRequest,
        /// The underlying decode error.
        #[source]
        source: serde_json::Error,
    },

    /// The zip archive is corrupt or doesn't hold exactly one index member.
    #[error("json data isn't found in zip file {}: {reason}", .request.url())]
    Archive {
        /// The source whose archive is unusable.
        request: FetchRequest,
        /// What is wrong with the archive.
        reason: String,
    },

    /// The task running the fetch panicked or was cancelled.
    #[error("{} download ended abnormally: {reason}", .request.url())]
    Aborted {
        /// The request whose task ended.
        request: FetchRequest,
        /// The task failure.
        reason: String,
    },

    /// The index was fetched but could not be written to the cache store.
    #[error("failed to cache audio source {}: {source}", .request.source_name())]
    Store {
        /// The source being installed.
        request: FetchRequest,
        /// The underlying store error.
        #[source]
        source: StoreError,
    },
}

impl AudioManagerError {
    /// Creates a network error from a reqwest error.
    pub fn network(request: impl Into<FetchRequest>, source: reqwest::Error) -> Self {
        Self::Network {
            request: request.into(),
            source,
        }
    }

    /// Creates a timeout error.
    pub fn timeout(request: impl Into<FetchRequest>, attempts: u32) -> Self {
        Self::Timeout {
            request: request.into(),
            attempts,
        }
    }

    /// Creates an HTTP status error.
    pub fn http_status(request: impl Into<FetchRequest>, status: u16) -> Self {
        Self::HttpStatus {
            request: request.into(),
            status,
        }
    }

    /// Creates an IO error.
    pub fn io(
        request: impl Into<FetchRequest>,
        path: impl Into<PathBuf>,
        source: std::io::Error,
    ) -> Self {
        Self::Io {
            request: request.into(),
            path: path.into(),
            source,
        }
    }

    /// Creates an index decode error.
    pub fn json(request: impl Into<FetchRequest>, source: serde_json::Error) -> Self {
        Self::Json {
            request: request.into(),
            source,
        }
    }

    /// Creates an archive error.
    pub fn archive(request: impl Into<FetchRequest>, reason: impl Into<String>) -> Self {
        Self::Archive {
            request: request.into(),
            reason: reason.into(),
        }
    }

    /// Creates an error for a fetch task that never returned.
    pub fn aborted(request: impl Into<FetchRequest>, reason: impl Into<String>) -> Self {
        Self::Aborted {
            request: request.into(),
            reason: reason.into(),
        }
    }

    /// Creates a store error.
    pub fn store(request: impl Into<FetchRequest>, source: StoreError) -> Self {
        Self::Store {
            request: request.into(),
            source,
        }
    }

    /// The request this error belongs to.
    #[must_use]
    pub fn request(&self) -> &FetchRequest {
        match self {
            Self::Network { request, .. }
            | Self::Timeout { request, .. }
            | Self::HttpStatus { request, .. }
            | Self::Io { request, .. }
            | Self::Json { request, .. }
            | Self::Archive { request, .. }
            | Self::Aborted { request, .. }
            | Self::Store { request, .. } => request,
        }
    }

    /// Human explanation, suitable for an aggregated error summary.
    #[must_use]
    pub fn explanation(&self) -> String {
        self.to_string()
    }

    /// Short cause: the status code for HTTP errors, the failure class otherwise.
    #[must_use]
    pub fn describe_short(&self) -> String {
        match self {
            Self::HttpStatus { status, .. } => status.to_string(),
            Self::Network { .. } => "NetworkError".to_string(),
            Self::Timeout { .. } => "Timeout".to_string(),
            Self::Io { source, .. } => format!("{:?}", source.kind()),
            Self::Json { .. } => "JSONDecodeError".to_string(),
            Self::Archive { .. } => "BadZipFile".to_string(),
            Self::Aborted { .. } => "TaskAborted".to_string(),
            Self::Store { .. } => "StoreError".to_string(),
        }
    }
}

// No `From<reqwest::Error>` and friends: every variant needs the request,
// which the source errors don't carry. Use the constructors above.

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::AudioSourceConfig;
    use crate::source::FileUrlData;

    fn file() -> FileUrlData {
        FileUrlData {
            url: "https://example.com/media/ame.ogg".to_string(),
            desired_filename: "雨_アメ_1_NHK.ogg".to_string(),
            word: "雨".to_string(),
            source_name: "NHK".to_string(),
            reading: "アメ".to_string(),
            pitch_number: "1".to_string(),
        }
    }

    #[test]
    fn test_http_status_display_mentions_url_and_code() {
        let error = AudioManagerError::http_status(file(), 404);
        let msg = error.to_string();
        assert!(msg.contains("404"), "Expected '404' in: {msg}");
        assert!(msg.contains("https://example.com/media/ame.ogg"), "{msg}");
        assert_eq!(error.describe_short(), "404");
    }

    #[test]
    fn test_timeout_display() {
        let source = AudioSourceConfig::new("NHK", "https://example.com/nhk.json");
        let error = AudioManagerError::timeout(source, 3);
        assert!(error.to_string().contains("timed out after 3"));
        assert_eq!(error.describe_short(), "Timeout");
    }

    #[test]
    fn test_request_identity_is_pattern_matchable() {
        let error = AudioManagerError::archive(
            AudioSourceConfig::new("NHK", "/data/nhk.zip"),
            "no json member",
        );
        match error.request() {
            FetchRequest::Source(source) => assert_eq!(source.name, "NHK"),
            FetchRequest::File(_) => panic!("expected a source request"),
        }

        let error = AudioManagerError::http_status(file(), 500);
        assert!(matches!(error.request(), FetchRequest::File(f) if f.word == "雨"));
    }

    #[test]
    fn test_io_error_display_mentions_path() {
        let io_error = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let error = AudioManagerError::io(file(), "/tmp/media/ame.ogg", io_error);
        let msg = error.explanation();
        assert!(msg.contains("/tmp/media/ame.ogg"), "{msg}");
        assert_eq!(error.describe_short(), "PermissionDenied");
    }

    #[test]
    fn test_store_error_names_source() {
        let error = AudioManagerError::store(
            AudioSourceConfig::new("Shinmeikai", "a.json"),
            StoreError::NotCached {
                source_name: "Shinmeikai".to_string(),
            },
        );
        assert!(error.to_string().contains("Shinmeikai"));
    }
}
