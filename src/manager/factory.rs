//! Long-lived owner of configuration, the cache store and the list of
//! initialized sources.
//!
//! The list of initialized sources is replaced wholesale after every
//! initialization pass. Readers take a cheap `Arc` snapshot, so they never
//! see a half-updated list.

use std::sync::{Arc, PoisonError, RwLock};

use futures_util::future::join_all;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use super::{AudioSourceManager, CacheStatus, InitResult, TotalAudioStats, fetch_index};
use crate::config::Config;
use crate::db::{CacheStore, StoreError};
use crate::download::{
    AudioManagerError, DownloadEngine, EngineError, FileSaveResults, HttpClient, MediaLibrary,
};
use crate::search::{SearchOptions, TextTools, search_audio};
use crate::source::{AudioSource, FileUrlData};

/// Builds [`AudioSourceManager`]s and runs source initialization.
///
/// Construct one per process (or per profile) and share it by reference or
/// through an `Arc`.
#[derive(Debug)]
pub struct AudioSourceManagerFactory {
    config: RwLock<Arc<Config>>,
    store: CacheStore,
    tools: TextTools,
    sources: RwLock<Arc<[AudioSource]>>,
}

impl AudioSourceManagerFactory {
    #[must_use]
    pub fn new(config: Config, store: CacheStore, tools: TextTools) -> Self {
        Self {
            config: RwLock::new(Arc::new(config)),
            store,
            tools,
            sources: RwLock::new(Arc::from(Vec::new())),
        }
    }

    /// Current configuration.
    #[must_use]
    pub fn config(&self) -> Arc<Config> {
        Arc::clone(&self.config.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Replaces the configuration. Takes effect on the next
    /// [`init_sources`](Self::init_sources) pass.
    pub fn set_config(&self, config: Config) {
        *self.config.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(config);
    }

    #[must_use]
    pub fn store(&self) -> &CacheStore {
        &self.store
    }

    /// Sources set by the last initialization pass, in precedence order.
    #[must_use]
    pub fn audio_sources(&self) -> Arc<[AudioSource]> {
        Arc::clone(&self.sources.read().unwrap_or_else(PoisonError::into_inner))
    }

    fn set_sources(&self, sources: Vec<AudioSource>) {
        *self.sources.write().unwrap_or_else(PoisonError::into_inner) = Arc::from(sources);
    }

    fn client(&self) -> HttpClient {
        HttpClient::new(&self.config().audio_settings)
    }

    /// Opens a new store session and wraps it in a manager over the current
    /// sources. Close it with [`AudioSourceManager::close`] when done.
    ///
    /// # Errors
    ///
    /// Returns the store error if the session can't be opened.
    pub async fn request_new_session(&self) -> Result<AudioSourceManager, StoreError> {
        let session = self.store.session().await?;
        Ok(AudioSourceManager::new(
            session,
            self.client(),
            self.audio_sources(),
        ))
    }

    /// True when the enabled, cached sources already match the configuration.
    async fn sources_unchanged(
        &self,
        manager: &mut AudioSourceManager,
        required: &[AudioSource],
    ) -> Result<bool, StoreError> {
        let mut initialized = Vec::new();
        for source in manager.audio_sources().to_vec() {
            if source.enabled() && manager.cache_status(&source).await? == CacheStatus::Valid {
                initialized.push(source.to_cfg());
            }
        }
        let required: Vec<_> = required.iter().map(AudioSource::to_cfg).collect();
        Ok(initialized == required)
    }

    /// Brings the cache in line with the configured sources.
    ///
    /// Sources whose cache is missing or stale are fetched concurrently, then
    /// installed one by one in configured order. A source that fails is left
    /// out of the result and its error recorded; the others carry on. The
    /// live source list is then replaced and cached data of sources that are
    /// no longer in it is removed.
    ///
    /// When the enabled sources are already cached from their configured
    /// URLs, nothing is fetched and the result has `did_run` unset.
    ///
    /// # Errors
    ///
    /// Returns the store error if a session can't be opened or unused data
    /// can't be removed. Per-source failures are reported in
    /// [`InitResult::errors`] instead.
    #[instrument(skip(self))]
    pub async fn init_sources(&self) -> Result<InitResult, StoreError> {
        let required: Vec<AudioSource> = self
            .config()
            .enabled_sources()
            .into_iter()
            .map(AudioSource::from_cfg)
            .collect();

        let mut manager = self.request_new_session().await?;
        let result = match self.run_init(&mut manager, required).await {
            Ok(result) => result,
            Err(e) => {
                manager.close().await;
                return Err(e);
            }
        };
        if result.did_run {
            self.set_sources(result.sources.clone());
            let removed = manager.remove_unused_audio_data(&result.sources).await;
            manager.close().await;
            removed?;
            for error in &result.errors {
                warn!("Couldn't download audio source: {}", error.explanation());
            }
            info!(sources = result.sources.len(), "initialized all audio sources");
        } else {
            manager.close().await;
        }
        Ok(result)
    }

    async fn run_init(
        &self,
        manager: &mut AudioSourceManager,
        required: Vec<AudioSource>,
    ) -> Result<InitResult, StoreError> {
        if self.sources_unchanged(manager, &required).await? {
            info!("audio sources haven't changed");
            return Ok(InitResult::did_not_run());
        }

        let order: Vec<String> = required
            .iter()
            .map(|source| source.name().to_string())
            .collect();
        let mut result = InitResult {
            did_run: true,
            ..InitResult::default()
        };
        let mut pending = Vec::new();
        for source in required {
            match manager.cache_status(&source).await {
                Ok(CacheStatus::Valid) => {
                    debug!(source = %source.name(), "audio source is already cached");
                    result.sources.push(source);
                }
                Ok(status) => pending.push((source, status)),
                Err(e) => {
                    let error = AudioManagerError::store(source.to_cfg(), e);
                    warn!(
                        source = %source.name(),
                        error = %error.describe_short(),
                        "ignoring audio source"
                    );
                    result.errors.push(error);
                }
            }
        }

        let client = manager.client().clone();
        let fetched = join_all(
            pending
                .iter()
                .map(|(source, _)| fetch_index(&client, source)),
        )
        .await;

        for ((source, status), index) in pending.into_iter().zip(fetched) {
            let installed = match index {
                Ok(index) => manager.install(&source, &index).await,
                Err(e) => Err(e),
            };
            match installed {
                Ok(()) => {
                    info!(source = %source.name(), ?status, "initialized audio source");
                    result.sources.push(source);
                }
                Err(error) => {
                    warn!(
                        source = %source.name(),
                        error = %error.describe_short(),
                        "ignoring audio source"
                    );
                    result.errors.push(error);
                }
            }
        }

        // Cached sources were pushed before fetched ones.
        result
            .sources
            .sort_by_key(|source| order.iter().position(|name| name == source.name()));
        Ok(result)
    }

    /// Runs [`init_sources`](Self::init_sources) on a Tokio task.
    ///
    /// The caller decides where to await the handle.
    pub fn spawn_init_sources(self: &Arc<Self>) -> JoinHandle<Result<InitResult, StoreError>> {
        let factory = Arc::clone(self);
        tokio::spawn(async move { factory.init_sources().await })
    }

    /// Forgets every source and deletes the cache store file.
    ///
    /// The next [`init_sources`](Self::init_sources) pass fetches everything
    /// again.
    ///
    /// # Errors
    ///
    /// Returns the store error if the file can't be removed.
    #[instrument(skip(self))]
    pub fn purge_everything(&self) -> Result<(), StoreError> {
        self.set_sources(Vec::new());
        self.store.purge()?;
        info!("purged audio source cache");
        Ok(())
    }

    /// Statistics computed in a fresh session.
    ///
    /// # Errors
    ///
    /// Returns the store error if a query fails.
    pub async fn get_statistics(&self) -> Result<TotalAudioStats, StoreError> {
        let mut manager = self.request_new_session().await?;
        let stats = manager.total_stats().await;
        manager.close().await;
        stats
    }

    /// Searches audio for `text` with the configured options, in a fresh session.
    ///
    /// # Errors
    ///
    /// Returns the store error if a lookup fails.
    pub async fn search_audio(&self, text: &str) -> Result<Vec<FileUrlData>, StoreError> {
        let options = SearchOptions::from_config(&self.config());
        let mut manager = self.request_new_session().await?;
        let found = search_audio(&mut manager, text, &options, &self.tools).await;
        manager.close().await;
        found
    }

    /// Downloads `files` missing from `media` and saves them there, using the
    /// configured timeouts, attempts and concurrency.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] if the engine can't run. Per-file failures are
    /// reported in [`FileSaveResults::fails`].
    pub async fn download_and_save<M: MediaLibrary>(
        &self,
        files: &[FileUrlData],
        media: &M,
    ) -> Result<FileSaveResults, EngineError> {
        let engine = DownloadEngine::new(self.config().audio_settings.concurrency)?;
        engine.download_and_save(&self.client(), files, media).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::config::AudioSourceConfig;

    fn write_index(path: &Path, word: &str, file: &str, reading: &str) {
        let body = serde_json::json!({
            "meta": {"name": "Test", "year": 2020, "version": 1, "media_dir": "media"},
            "headwords": {word: [file]},
            "files": {file: {"kana_reading": reading, "pitch_number": "1"}}
        });
        std::fs::write(path, body.to_string()).unwrap();
    }

    fn factory(dir: &Path, sources: Vec<AudioSourceConfig>) -> AudioSourceManagerFactory {
        let config = Config {
            audio_sources: sources,
            ..Config::default()
        };
        let store = CacheStore::open(&dir.join("data")).unwrap();
        AudioSourceManagerFactory::new(config, store, TextTools::default())
    }

    fn local(dir: &Path, name: &str, word: &str) -> AudioSourceConfig {
        let path = dir.join(format!("{name}.json"));
        write_index(&path, word, "a.ogg", "アメ");
        AudioSourceConfig::new(name, path.to_string_lossy().into_owned())
    }

    #[tokio::test]
    async fn test_init_sources_runs_then_short_circuits() {
        let temp = tempfile::tempdir().unwrap();
        let factory = factory(temp.path(), vec![local(temp.path(), "NHK", "雨")]);

        let first = factory.init_sources().await.unwrap();
        assert!(first.did_run);
        assert!(first.errors.is_empty());
        assert_eq!(factory.audio_sources().len(), 1);

        let second = factory.init_sources().await.unwrap();
        assert!(!second.did_run);
        assert_eq!(factory.audio_sources().len(), 1);
    }

    #[tokio::test]
    async fn test_init_sources_keeps_going_after_failure() {
        let temp = tempfile::tempdir().unwrap();
        let broken = temp.path().join("broken.json");
        std::fs::write(&broken, "[]").unwrap();
        let factory = factory(
            temp.path(),
            vec![
                AudioSourceConfig::new("Broken", broken.to_string_lossy().into_owned()),
                local(temp.path(), "NHK", "雨"),
                local(temp.path(), "Off", "空").with_enabled(false),
            ],
        );

        let result = factory.init_sources().await.unwrap();
        assert!(result.did_run);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].request().source_name(), "Broken");
        let names: Vec<String> = factory
            .audio_sources()
            .iter()
            .map(|s| s.name().to_string())
            .collect();
        assert_eq!(names, vec!["NHK"]);
    }

    #[tokio::test]
    async fn test_prepended_source_takes_precedence_over_cached_one() {
        let temp = tempfile::tempdir().unwrap();
        let first_path = temp.path().join("first.json");
        let second_path = temp.path().join("second.json");
        write_index(&first_path, "雨", "first.ogg", "あめ");
        write_index(&second_path, "雨", "second.ogg", "あめ");
        let first = AudioSourceConfig::new("A", first_path.to_string_lossy().into_owned());
        let second = AudioSourceConfig::new("B", second_path.to_string_lossy().into_owned());

        let factory = factory(temp.path(), vec![second.clone()]);
        factory.init_sources().await.unwrap();

        let mut config = Config {
            audio_sources: vec![first, second],
            ..Config::default()
        };
        config.audio_settings.stop_if_one_source_has_results = true;
        factory.set_config(config);
        let result = factory.init_sources().await.unwrap();
        assert!(result.did_run);

        let names: Vec<String> = factory
            .audio_sources()
            .iter()
            .map(|s| s.name().to_string())
            .collect();
        assert_eq!(names, vec!["A", "B"]);

        let hits = factory.search_audio("雨").await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].source_name, "A");
        assert!(hits[0].url.ends_with("first.ogg"));
    }

    #[tokio::test]
    async fn test_init_order_ignores_config_swapped_during_pass() {
        let temp = tempfile::tempdir().unwrap();
        let first = local(temp.path(), "A", "雨");
        let second = local(temp.path(), "B", "空");
        let factory = factory(temp.path(), vec![second.clone()]);
        factory.init_sources().await.unwrap();

        factory.set_config(Config::default());
        let required = vec![AudioSource::from_cfg(first), AudioSource::from_cfg(second)];
        let mut manager = factory.request_new_session().await.unwrap();
        let result = factory.run_init(&mut manager, required).await.unwrap();
        manager.close().await;

        let names: Vec<&str> = result.sources.iter().map(AudioSource::name).collect();
        assert_eq!(names, vec!["A", "B"]);
    }

    #[tokio::test]
    async fn test_disabling_source_removes_its_data() {
        let temp = tempfile::tempdir().unwrap();
        let nhk = local(temp.path(), "NHK", "雨");
        let other = local(temp.path(), "Other", "空");
        let factory = factory(temp.path(), vec![nhk.clone(), other.clone()]);
        factory.init_sources().await.unwrap();
        assert_eq!(factory.search_audio("空").await.unwrap().len(), 1);

        factory.set_config(Config {
            audio_sources: vec![nhk, other.with_enabled(false)],
            ..Config::default()
        });
        let result = factory.init_sources().await.unwrap();
        assert!(result.did_run);

        let mut manager = factory.request_new_session().await.unwrap();
        assert_eq!(manager.session().source_names().await.unwrap(), vec!["NHK"]);
        manager.close().await;
        assert!(factory.search_audio("空").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_statistics_and_purge() {
        let temp = tempfile::tempdir().unwrap();
        let factory = factory(temp.path(), vec![local(temp.path(), "NHK", "雨")]);
        factory.init_sources().await.unwrap();

        let stats = factory.get_statistics().await.unwrap();
        assert_eq!(stats.unique_files, 1);
        assert_eq!(stats.unique_headwords, 1);

        factory.purge_everything().unwrap();
        assert!(factory.audio_sources().is_empty());
        assert!(!factory.store().path().exists());

        let result = factory.init_sources().await.unwrap();
        assert!(result.did_run);
        assert_eq!(factory.search_audio("雨").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_spawn_init_sources() {
        let temp = tempfile::tempdir().unwrap();
        let factory = Arc::new(factory(temp.path(), vec![local(temp.path(), "NHK", "雨")]));
        let result = factory.spawn_init_sources().await.unwrap().unwrap();
        assert!(result.did_run);
        assert_eq!(factory.audio_sources().len(), 1);
    }
}
