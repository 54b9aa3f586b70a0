//! Fetching source indices and audio files.
//!
//! # Features
//!
//! - One error type, [`AudioManagerError`], tagged with the request it failed for
//! - Separate per-attempt timeouts for indices and audio files
//! - Timeout-only retries with a bounded attempt budget
//! - Concurrent download-and-save into a [`MediaLibrary`]
//! - Deterministic, collision-free media filenames
//!
//! # Example
//!
//! ```no_run
//! use kotoba_audio::config::AudioSettings;
//! use kotoba_audio::download::{DownloadEngine, HttpClient, MediaDirectory};
//! use kotoba_audio::source::FileUrlData;
//!
//! # async fn example(files: Vec<FileUrlData>) -> Result<(), Box<dyn std::error::Error>> {
//! let client = HttpClient::new(&AudioSettings::default());
//! let media = MediaDirectory::create("./collection.media")?;
//! let results = DownloadEngine::new(4)?
//!     .download_and_save(&client, &files, &media)
//!     .await?;
//! println!("saved {}, failed {}", results.successes.len(), results.fails.len());
//! # Ok(())
//! # }
//! ```

mod client;
pub mod constants;
mod engine;
mod error;
pub mod filename;
mod media;
mod request;
mod retry;

pub use client::HttpClient;
pub use engine::{DownloadEngine, DownloadedData, EngineError, FileSaveResults, fetch_file};
pub use error::AudioManagerError;
pub use media::{MediaDirectory, MediaLibrary};
pub use request::{FetchRequest, RequestKind};
pub use retry::{DEFAULT_MAX_ATTEMPTS, FailureType, RetryDecision, RetryPolicy, classify_error};

// Note: we do NOT define module-local Result aliases.
// Use `Result<T, AudioManagerError>` explicitly in function signatures.
