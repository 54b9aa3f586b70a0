//! Concurrent download-and-save of resolved audio files.
//!
//! Files already present in the media library are skipped. The rest are
//! fetched concurrently under a semaphore, each fetch in its own Tokio task.
//! Once every task has been joined, the fetched bytes are written to the
//! media library on the caller's context, so the library never sees
//! concurrent writes.
//!
//! A failed fetch or write, or a fetch task that panicked, never aborts the
//! batch. It is recorded in
//! [`FileSaveResults::fails`] next to the successes.

use std::path::Path;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use super::media::MediaLibrary;
use super::{AudioManagerError, HttpClient};
use crate::config::{DEFAULT_CONCURRENCY, MAX_CONCURRENCY, MIN_CONCURRENCY};
use crate::source::FileUrlData;

/// Error type for download engine operations.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Invalid concurrency value provided.
    #[error(
        "invalid concurrency value {value}: must be between {MIN_CONCURRENCY} and {MAX_CONCURRENCY}"
    )]
    InvalidConcurrency {
        /// The invalid value that was provided.
        value: usize,
    },

    /// Semaphore was closed unexpectedly.
    #[error("semaphore closed unexpectedly")]
    SemaphoreClosed,
}

/// Bytes of one fetched file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedData {
    pub file: FileUrlData,
    pub data: Vec<u8>,
}

/// Outcome of a download-and-save batch.
#[derive(Debug, Default)]
pub struct FileSaveResults {
    /// Files fetched and written to the media library.
    pub successes: Vec<DownloadedData>,
    /// One error per file that couldn't be fetched or written.
    pub fails: Vec<AudioManagerError>,
}

impl FileSaveResults {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.successes.is_empty() && self.fails.is_empty()
    }
}

/// Runs download-and-save batches with bounded concurrency.
#[derive(Debug)]
pub struct DownloadEngine {
    semaphore: Arc<Semaphore>,
    concurrency: usize,
}

impl Default for DownloadEngine {
    fn default() -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(DEFAULT_CONCURRENCY)),
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

impl DownloadEngine {
    /// Creates an engine running at most `concurrency` fetches at once.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidConcurrency`] if the value is outside
    /// the valid range (1-100).
    ///
    /// # Example
    ///
    /// ```
    /// use kotoba_audio::download::DownloadEngine;
    ///
    /// let engine = DownloadEngine::new(4).unwrap();
    /// assert_eq!(engine.concurrency(), 4);
    /// assert!(DownloadEngine::new(0).is_err());
    /// ```
    #[instrument(level = "debug")]
    pub fn new(concurrency: usize) -> Result<Self, EngineError> {
        if !(MIN_CONCURRENCY..=MAX_CONCURRENCY).contains(&concurrency) {
            return Err(EngineError::InvalidConcurrency { value: concurrency });
        }
        Ok(Self {
            semaphore: Arc::new(Semaphore::new(concurrency)),
            concurrency,
        })
    }

    #[must_use]
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Fetches every file missing from `media` and saves it there.
    ///
    /// Empty input, or input that is entirely present already, returns empty
    /// results without doing any I/O.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::SemaphoreClosed`] if the semaphore is closed.
    /// Individual fetch or write failures do NOT cause this method to error.
    #[instrument(skip(self, client, files, media), fields(files = files.len()))]
    pub async fn download_and_save<M: MediaLibrary>(
        &self,
        client: &HttpClient,
        files: &[FileUrlData],
        media: &M,
    ) -> Result<FileSaveResults, EngineError> {
        let mut missing = Vec::new();
        for file in files {
            if !media.has(&file.desired_filename).await {
                missing.push(file.clone());
            }
        }

        if missing.is_empty() {
            debug!("nothing to download");
            return Ok(FileSaveResults::default());
        }

        info!(
            requested = files.len(),
            missing = missing.len(),
            "starting audio downloads"
        );

        let mut handles = Vec::with_capacity(missing.len());
        for file in missing {
            let permit = self
                .semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|_| EngineError::SemaphoreClosed)?;
            let client = client.clone();
            let task_file = file.clone();

            handles.push((
                file,
                tokio::spawn(async move {
                    let _permit = permit;
                    fetch_file(&client, task_file).await
                }),
            ));
        }

        let results = save_joined(handles, media).await;
        info!(
            saved = results.successes.len(),
            failed = results.fails.len(),
            "audio downloads complete"
        );
        Ok(results)
    }
}

/// Awaits every fetch task in order and writes what it fetched.
///
/// A task that panicked counts as a failure of its file.
async fn save_joined<M: MediaLibrary>(
    handles: Vec<(FileUrlData, JoinHandle<Result<DownloadedData, AudioManagerError>>)>,
    media: &M,
) -> FileSaveResults {
    let mut results = FileSaveResults::default();
    for (file, handle) in handles {
        match handle.await {
            Ok(Ok(downloaded)) => {
                let name = &downloaded.file.desired_filename;
                match media.write(name, &downloaded.data).await {
                    Ok(()) => {
                        debug!(file = %name, "saved");
                        results.successes.push(downloaded);
                    }
                    Err(e) => {
                        let path = media.path_of(name);
                        warn!(path = %path.display(), error = %e, "failed to save audio file");
                        results
                            .fails
                            .push(AudioManagerError::io(downloaded.file, path, e));
                    }
                }
            }
            Ok(Err(e)) => {
                warn!(error = %e, "audio download failed");
                results.fails.push(e);
            }
            Err(e) => {
                warn!(url = %file.url, error = %e, "download task panicked");
                results
                    .fails
                    .push(AudioManagerError::aborted(file, e.to_string()));
            }
        }
    }
    results
}

/// Reads a file from the local disk when its URL is a path, else downloads it.
///
/// # Errors
///
/// Returns [`AudioManagerError::Io`] for an unreadable local file and the
/// [`HttpClient::download`] errors otherwise.
pub async fn fetch_file(
    client: &HttpClient,
    file: FileUrlData,
) -> Result<DownloadedData, AudioManagerError> {
    let local = Path::new(&file.url);
    let is_local = tokio::fs::metadata(local)
        .await
        .is_ok_and(|meta| meta.is_file());
    let data = if is_local {
        match tokio::fs::read(local).await {
            Ok(data) => data,
            Err(e) => {
                let path = local.to_path_buf();
                return Err(AudioManagerError::io(file, path, e));
            }
        }
    } else {
        client.download(&file.clone().into()).await?
    };
    Ok(DownloadedData { file, data })
}
