//! HTTP client wrapper for fetching indices and audio files.
//!
//! The client keeps two per-attempt timeouts: a long one for source indices,
//! which can be tens of megabytes, and a short one for single audio files.
//! Bodies are collected into memory since both kinds are consumed whole.

use std::time::Duration;

use futures_util::StreamExt;
use reqwest::Client;
use tracing::{debug, instrument, warn};

use super::constants::{
    DEFAULT_FILE_TIMEOUT_SECS, DEFAULT_INDEX_TIMEOUT_SECS, MAX_TIMEOUT_SECS, MIN_TIMEOUT_SECS,
};
use super::error::AudioManagerError;
use super::request::{FetchRequest, RequestKind};
use super::retry::{FailureType, RetryDecision, RetryPolicy, classify_error};
use crate::config::AudioSettings;
use crate::user_agent;

/// HTTP client shared by every fetch of a manager.
///
/// Cheap to clone; clones share the connection pool.
///
/// # Example
///
/// ```no_run
/// use kotoba_audio::config::{AudioSettings, AudioSourceConfig};
/// use kotoba_audio::download::{FetchRequest, HttpClient};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = HttpClient::new(&AudioSettings::default());
/// let source = AudioSourceConfig::new("NHK", "https://example.com/nhk.json");
/// let bytes = client.download(&FetchRequest::Source(source)).await?;
/// println!("fetched {} bytes", bytes.len());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    index_timeout: Duration,
    file_timeout: Duration,
    retry_policy: RetryPolicy,
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::with_timeouts(
            DEFAULT_INDEX_TIMEOUT_SECS,
            DEFAULT_FILE_TIMEOUT_SECS,
            RetryPolicy::default(),
        )
    }
}

/// Failure of a single attempt, before it is turned into an error.
enum AttemptFailure {
    Transport(reqwest::Error),
    Status(u16),
}

impl HttpClient {
    /// Creates a client from the audio settings.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails to build with the static
    /// configuration. This should never happen in practice.
    #[must_use]
    pub fn new(settings: &AudioSettings) -> Self {
        Self::with_timeouts(
            settings.dictionary_download_timeout,
            settings.audio_download_timeout,
            RetryPolicy::with_max_attempts(settings.attempts),
        )
    }

    /// Creates a client with explicit timeouts, in seconds, clamped to 2..=99.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails to build with the static
    /// configuration.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn with_timeouts(
        index_timeout_secs: u64,
        file_timeout_secs: u64,
        retry_policy: RetryPolicy,
    ) -> Self {
        let client = Client::builder()
            .default_headers(user_agent::default_headers())
            .gzip(true)
            .build()
            .expect("failed to build HTTP client with static configuration");
        Self {
            client,
            index_timeout: clamp_timeout(index_timeout_secs),
            file_timeout: clamp_timeout(file_timeout_secs),
            retry_policy,
        }
    }

    /// Per-attempt timeout for a kind of request.
    #[must_use]
    pub fn timeout_for(&self, kind: RequestKind) -> Duration {
        match kind {
            RequestKind::Index => self.index_timeout,
            RequestKind::File => self.file_timeout,
        }
    }

    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry_policy
    }

    /// Fetches the full body for `request`.
    ///
    /// Timed-out attempts are retried immediately while the attempt budget
    /// lasts. Any other failure ends the fetch.
    ///
    /// # Errors
    ///
    /// - [`AudioManagerError::Timeout`] when every attempt timed out
    /// - [`AudioManagerError::HttpStatus`] for a non-success status
    /// - [`AudioManagerError::Network`] for any other transport failure
    #[instrument(skip(self, request), fields(url = %request.url()))]
    pub async fn download(&self, request: &FetchRequest) -> Result<Vec<u8>, AudioManagerError> {
        let timeout = self.timeout_for(request.kind());
        let mut attempt = 1;

        loop {
            match self.fetch_once(request.url(), timeout).await {
                Ok(bytes) => {
                    debug!(attempt, bytes = bytes.len(), "download complete");
                    return Ok(bytes);
                }
                Err(AttemptFailure::Status(status)) => {
                    return Err(AudioManagerError::http_status(request.clone(), status));
                }
                Err(AttemptFailure::Transport(error)) => {
                    let failure_type = classify_error(&error);
                    match self.retry_policy.should_retry(failure_type, attempt) {
                        RetryDecision::Retry { attempt: next } => {
                            warn!(attempt, next, "download timed out, retrying");
                            attempt = next;
                        }
                        RetryDecision::DoNotRetry { reason } => {
                            debug!(attempt, %reason, "giving up");
                            return Err(if failure_type == FailureType::Timeout {
                                AudioManagerError::timeout(request.clone(), attempt)
                            } else {
                                AudioManagerError::network(request.clone(), error)
                            });
                        }
                    }
                }
            }
        }
    }

    async fn fetch_once(&self, url: &str, timeout: Duration) -> Result<Vec<u8>, AttemptFailure> {
        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(AttemptFailure::Transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(AttemptFailure::Status(status.as_u16()));
        }

        let capacity = response
            .content_length()
            .and_then(|len| usize::try_from(len).ok())
            .unwrap_or_default();
        let mut body = Vec::with_capacity(capacity);
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            body.extend_from_slice(&chunk.map_err(AttemptFailure::Transport)?);
        }
        Ok(body)
    }
}

fn clamp_timeout(secs: u64) -> Duration {
    Duration::from_secs(secs.clamp(MIN_TIMEOUT_SECS, MAX_TIMEOUT_SECS))
}
