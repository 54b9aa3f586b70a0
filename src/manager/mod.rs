//! Source manager: keeps the cache in sync with configured sources and
//! resolves headwords to audio files.
//!
//! An [`AudioSourceManager`] owns one store session for its whole life. Build
//! one per unit of work through
//! [`AudioSourceManagerFactory::request_new_session`] and close it when done.

mod factory;

pub use factory::AudioSourceManagerFactory;

use std::sync::Arc;

use tracing::{debug, info, instrument};

use crate::db::{BoundFile, CacheSession, CachedMeta, StoreError};
use crate::download::filename::{norm_pitch_numbers, normalize_filename, split_extension};
use crate::download::{AudioManagerError, FetchRequest, HttpClient};
use crate::index::{FileInfo, IndexOrigin, SourceIndex, parse_index};
use crate::kana::to_katakana;
use crate::search::WordLookup;
use crate::source::{AudioSource, FileUrlData};

/// Outcome of one initialization pass.
#[derive(Debug, Default)]
pub struct InitResult {
    /// Enabled sources whose data is cached and usable, in configured order.
    pub sources: Vec<AudioSource>,
    /// One error per source that couldn't be initialized.
    pub errors: Vec<AudioManagerError>,
    /// False when the pass was skipped because nothing changed.
    pub did_run: bool,
}

impl InitResult {
    /// Result of a pass skipped because the configured sources are already cached.
    #[must_use]
    pub fn did_not_run() -> Self {
        Self::default()
    }
}

/// File and headword counts of one source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioStats {
    pub source_name: String,
    pub num_files: u64,
    pub num_headwords: u64,
}

/// Counts across every initialized source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TotalAudioStats {
    pub unique_files: u64,
    pub unique_headwords: u64,
    pub sources: Vec<AudioStats>,
}

/// State of a source's cached data relative to its config.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    /// Cached from the configured URL.
    Valid,
    /// Not cached, or only partially.
    Missing,
    /// Cached from a different URL.
    Stale,
}

/// Works with the cached data of a fixed list of sources through one session.
#[derive(Debug)]
pub struct AudioSourceManager {
    session: CacheSession,
    client: HttpClient,
    sources: Arc<[AudioSource]>,
}

impl AudioSourceManager {
    #[must_use]
    pub fn new(session: CacheSession, client: HttpClient, sources: Arc<[AudioSource]>) -> Self {
        Self {
            session,
            client,
            sources,
        }
    }

    /// Sources this manager searches, in precedence order.
    #[must_use]
    pub fn audio_sources(&self) -> &[AudioSource] {
        &self.sources
    }

    #[must_use]
    pub fn client(&self) -> &HttpClient {
        &self.client
    }

    /// Direct access to the store session.
    pub fn session(&mut self) -> &mut CacheSession {
        &mut self.session
    }

    /// Compares what is cached for `source` with its config.
    ///
    /// # Errors
    ///
    /// Returns the store error if the lookup fails.
    pub async fn cache_status(&mut self, source: &AudioSource) -> Result<CacheStatus, StoreError> {
        if !self.session.is_source_cached(source.name()).await? {
            return Ok(CacheStatus::Missing);
        }
        let original_url = self.session.get_original_url(source.name()).await?;
        if original_url.as_deref() == Some(source.url()) {
            Ok(CacheStatus::Valid)
        } else {
            Ok(CacheStatus::Stale)
        }
    }

    /// Makes sure the store holds the data of `source` as found at its
    /// configured URL.
    ///
    /// A valid cache is left alone. Missing or stale data is fetched, parsed,
    /// and then swapped in with one transaction, so other sessions see
    /// either the old rows or the new ones.
    ///
    /// # Errors
    ///
    /// Returns the fetch or parse error, or [`AudioManagerError::Store`] if
    /// the store can't be read or written.
    #[instrument(skip(self, source), fields(source = %source.name()))]
    pub async fn read_pronunciation_data(
        &mut self,
        source: &AudioSource,
    ) -> Result<CacheStatus, AudioManagerError> {
        let status = self
            .cache_status(source)
            .await
            .map_err(|e| AudioManagerError::store(source.to_cfg(), e))?;
        if status == CacheStatus::Valid {
            debug!("audio source is already cached");
            return Ok(status);
        }
        let index = fetch_index(&self.client, source).await?;
        self.install(source, &index).await?;
        Ok(status)
    }

    /// Writes a parsed index for `source`, replacing any previous rows.
    ///
    /// # Errors
    ///
    /// Returns [`AudioManagerError::Store`] if the transaction fails.
    pub async fn install(
        &mut self,
        source: &AudioSource,
        index: &SourceIndex,
    ) -> Result<(), AudioManagerError> {
        self.session
            .replace_data(source.name(), index, source.url())
            .await
            .map_err(|e| AudioManagerError::store(source.to_cfg(), e))?;
        info!(
            source = %source.name(),
            headwords = index.headwords.len(),
            files = index.files.len(),
            "stored audio source"
        );
        Ok(())
    }

    /// Files listed under `word`, source by source in precedence order.
    ///
    /// # Errors
    ///
    /// Returns the store error if a query fails.
    pub async fn search_word(&mut self, word: &str) -> Result<Vec<FileUrlData>, StoreError> {
        let sources = Arc::clone(&self.sources);
        let mut found = Vec::new();
        for source in sources.iter().filter(|source| source.enabled()) {
            let bound = self.session.search_files_in_source(source.name(), word).await?;
            if bound.is_empty() {
                continue;
            }
            let meta = match self.session.get_meta(source.name()).await {
                Ok(meta) => meta,
                Err(StoreError::NotCached { .. }) => {
                    debug!(source = %source.name(), "audio source is no longer cached");
                    continue;
                }
                Err(e) => return Err(e),
            };
            for file in &bound {
                match self.session.get_file_info(source.name(), &file.file_name).await? {
                    Some(info) => found.push(resolve_file(source, &meta, file, &info)),
                    None => debug!(
                        source = %source.name(),
                        file = %file.file_name,
                        "headword points at an unlisted file"
                    ),
                }
            }
        }
        Ok(found)
    }

    /// Counts of distinct files and headwords, overall and per source.
    ///
    /// # Errors
    ///
    /// Returns the store error if a query fails.
    pub async fn total_stats(&mut self) -> Result<TotalAudioStats, StoreError> {
        let names: Vec<String> = self
            .sources
            .iter()
            .map(|source| source.name().to_string())
            .collect();
        let mut sources = Vec::with_capacity(names.len());
        for name in &names {
            let single = std::slice::from_ref(name);
            sources.push(AudioStats {
                source_name: name.clone(),
                num_files: self.session.distinct_file_count(single).await?,
                num_headwords: self.session.distinct_headword_count(single).await?,
            });
        }
        Ok(TotalAudioStats {
            unique_files: self.session.distinct_file_count(&names).await?,
            unique_headwords: self.session.distinct_headword_count(&names).await?,
            sources,
        })
    }

    /// Deletes cached data of every source not in `keep`.
    ///
    /// Returns the names that were removed.
    ///
    /// # Errors
    ///
    /// Returns the store error if a query or delete fails.
    pub async fn remove_unused_audio_data(
        &mut self,
        keep: &[AudioSource],
    ) -> Result<Vec<String>, StoreError> {
        let mut removed = Vec::new();
        for name in self.session.source_names().await? {
            if keep.iter().any(|source| source.name() == name) {
                continue;
            }
            info!(source = %name, "removing unused cache data for audio source");
            self.session.remove_data(&name).await?;
            removed.push(name);
        }
        Ok(removed)
    }

    /// Closes the underlying session.
    pub async fn close(self) {
        self.session.close().await;
    }
}

impl WordLookup for AudioSourceManager {
    async fn search_word(&mut self, word: &str) -> Result<Vec<FileUrlData>, StoreError> {
        AudioSourceManager::search_word(self, word).await
    }
}

/// Reads and parses the index of `source`.
///
/// Local files are read from disk, anything else is downloaded. Parsing
/// follows the origin: local `.zip` files are opened as archives, downloads
/// may be either JSON or an archive.
///
/// # Errors
///
/// Returns [`AudioManagerError::Io`] if a local file can't be read, or the
/// download or parse error.
#[instrument(skip(client, source), fields(source = %source.name(), url = %source.url()))]
pub async fn fetch_index(
    client: &HttpClient,
    source: &AudioSource,
) -> Result<SourceIndex, AudioManagerError> {
    let (bytes, origin) = if source.is_local() {
        let bytes = tokio::fs::read(source.url())
            .await
            .map_err(|e| AudioManagerError::io(source.to_cfg(), source.url(), e))?;
        let origin = if source.is_local_zip() {
            IndexOrigin::LocalZip
        } else {
            IndexOrigin::LocalFile
        };
        (bytes, origin)
    } else {
        let request = FetchRequest::Source(source.to_cfg());
        (client.download(&request).await?, IndexOrigin::Downloaded)
    };
    debug!(bytes = bytes.len(), ?origin, "read audio source index");
    parse_index(source.config(), &bytes, origin)
}

/// Builds the search hit for one cached file.
fn resolve_file(
    source: &AudioSource,
    meta: &CachedMeta,
    file: &BoundFile,
    info: &FileInfo,
) -> FileUrlData {
    let mut components = vec![file.headword.clone()];
    let display = info
        .pitch_pattern
        .as_deref()
        .filter(|pattern| !pattern.is_empty())
        .or(Some(info.kana_reading.as_str()).filter(|reading| !reading.is_empty()));
    if let Some(display) = display {
        components.push(to_katakana(display));
    }
    let pitch_number = info
        .pitch_number
        .as_deref()
        .filter(|number| !number.is_empty());
    if let Some(number) = pitch_number {
        components.push(norm_pitch_numbers(number));
    }
    components.push(source.name().to_string());

    let (_, extension) = split_extension(&file.file_name);
    let desired_filename = format!("{}{extension}", normalize_filename(&components.join("_")));

    FileUrlData {
        url: source.join(&source.media_dir(meta), &file.file_name),
        desired_filename,
        word: file.headword.clone(),
        source_name: source.name().to_string(),
        reading: info.kana_reading.clone(),
        pitch_number: pitch_number.unwrap_or("?").to_string(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::BTreeMap;
    use std::path::Path;

    use super::*;
    use crate::config::AudioSourceConfig;
    use crate::db::CacheStore;
    use crate::index::SourceMeta;

    const NHK_INDEX: &str = r#"{
        "meta": {"name": "NHK", "year": 2016, "version": 1, "media_dir": "media"},
        "headwords": {"雨": ["ame.ogg"], "飴": ["ame.ogg", "ame2.ogg"]},
        "files": {
            "ame.ogg": {"kana_reading": "アメ", "pitch_number": "1"},
            "ame2.ogg": {"kana_reading": "あめ", "pitch_pattern": "あめ＼", "pitch_number": "0"}
        }
    }"#;

    fn write_source(dir: &Path, file_name: &str, body: &str) -> AudioSource {
        let path = dir.join(file_name);
        std::fs::write(&path, body).unwrap();
        AudioSource::from_cfg(AudioSourceConfig::new(
            "NHK-TEST",
            path.to_string_lossy().into_owned(),
        ))
    }

    async fn manager(dir: &Path, sources: Vec<AudioSource>) -> AudioSourceManager {
        let store = CacheStore::open(&dir.join("data")).unwrap();
        AudioSourceManager::new(
            store.session().await.unwrap(),
            HttpClient::default(),
            sources.into(),
        )
    }

    #[tokio::test]
    async fn test_read_pronunciation_data_installs_local_source() {
        let temp = tempfile::tempdir().unwrap();
        let source = write_source(temp.path(), "index.json", NHK_INDEX);
        let mut mgr = manager(temp.path(), vec![source.clone()]).await;

        assert_eq!(mgr.cache_status(&source).await.unwrap(), CacheStatus::Missing);
        let status = mgr.read_pronunciation_data(&source).await.unwrap();
        assert_eq!(status, CacheStatus::Missing);
        assert_eq!(mgr.cache_status(&source).await.unwrap(), CacheStatus::Valid);
        assert_eq!(
            mgr.session().get_original_url("NHK-TEST").await.unwrap().as_deref(),
            Some(source.url())
        );

        let again = mgr.read_pronunciation_data(&source).await.unwrap();
        assert_eq!(again, CacheStatus::Valid);
        mgr.close().await;
    }

    #[tokio::test]
    async fn test_cache_status_detects_changed_url() {
        let temp = tempfile::tempdir().unwrap();
        let source = write_source(temp.path(), "index.json", NHK_INDEX);
        let mut mgr = manager(temp.path(), vec![source.clone()]).await;
        mgr.read_pronunciation_data(&source).await.unwrap();

        let moved = write_source(temp.path(), "moved.json", NHK_INDEX);
        assert_eq!(mgr.cache_status(&moved).await.unwrap(), CacheStatus::Stale);
        assert_eq!(
            mgr.read_pronunciation_data(&moved).await.unwrap(),
            CacheStatus::Stale
        );
        assert_eq!(mgr.cache_status(&moved).await.unwrap(), CacheStatus::Valid);
        mgr.close().await;
    }

    #[tokio::test]
    async fn test_read_pronunciation_data_reports_malformed_index() {
        let temp = tempfile::tempdir().unwrap();
        let source = write_source(temp.path(), "index.json", "{not json");
        let mut mgr = manager(temp.path(), vec![source.clone()]).await;

        let err = mgr.read_pronunciation_data(&source).await.unwrap_err();
        assert!(matches!(err, AudioManagerError::Json { .. }));
        assert_eq!(err.request().source_name(), "NHK-TEST");
        assert!(!mgr.session().is_source_cached("NHK-TEST").await.unwrap());
        mgr.close().await;
    }

    #[tokio::test]
    async fn test_search_word_resolves_files() {
        let temp = tempfile::tempdir().unwrap();
        let source = write_source(temp.path(), "index.json", NHK_INDEX);
        let mut mgr = manager(temp.path(), vec![source.clone()]).await;
        mgr.read_pronunciation_data(&source).await.unwrap();

        let hits = mgr.search_word("雨").await.unwrap();
        assert_eq!(hits.len(), 1);
        let hit = &hits[0];
        assert_eq!(hit.word, "雨");
        assert_eq!(hit.reading, "アメ");
        assert_eq!(hit.pitch_number, "1");
        assert_eq!(hit.source_name, "NHK-TEST");
        assert_eq!(hit.desired_filename, "雨_アメ_1_NHK-TEST.ogg");
        let expected_url = temp.path().join("media").join("ame.ogg");
        assert_eq!(hit.url, expected_url.to_string_lossy());

        let hits = mgr.search_word("飴").await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[1].desired_filename, "飴_アメ＼_0_NHK-TEST.ogg");

        assert!(mgr.search_word("空").await.unwrap().is_empty());
        mgr.close().await;
    }

    #[tokio::test]
    async fn test_search_word_skips_disabled_sources() {
        let temp = tempfile::tempdir().unwrap();
        let source = write_source(temp.path(), "index.json", NHK_INDEX);
        let mut mgr = manager(temp.path(), vec![source.clone()]).await;
        mgr.read_pronunciation_data(&source).await.unwrap();
        mgr.close().await;

        let disabled = AudioSource::from_cfg(source.to_cfg().with_enabled(false));
        let mut mgr = manager(temp.path(), vec![disabled]).await;
        assert!(mgr.search_word("雨").await.unwrap().is_empty());
        mgr.close().await;
    }

    #[tokio::test]
    async fn test_search_word_skips_source_removed_mid_search() {
        use sqlx::Connection;
        use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection};

        let temp = tempfile::tempdir().unwrap();
        let source = write_source(temp.path(), "index.json", NHK_INDEX);
        let mut mgr = manager(temp.path(), vec![source.clone()]).await;
        mgr.read_pronunciation_data(&source).await.unwrap();

        // Another session drops the metadata row, leaving headwords behind.
        let store = CacheStore::open(&temp.path().join("data")).unwrap();
        let mut other =
            SqliteConnection::connect_with(&SqliteConnectOptions::new().filename(store.path()))
                .await
                .unwrap();
        sqlx::query("DELETE FROM meta WHERE source_name = ?")
            .bind("NHK-TEST")
            .execute(&mut other)
            .await
            .unwrap();
        other.close().await.unwrap();

        assert!(mgr.search_word("雨").await.unwrap().is_empty());
        mgr.close().await;
    }

    #[test]
    fn test_resolve_file_without_reading_or_pitch() {
        let source = AudioSource::from_cfg(AudioSourceConfig::new(
            "Remote",
            "https://example.com/audio/index.json",
        ));
        let meta = CachedMeta {
            dictionary_name: "Remote".to_string(),
            year: 2020,
            version: 1,
            original_url: None,
            media_dir: "media".to_string(),
            media_dir_abs: None,
        };
        let bound = BoundFile {
            headword: "雨".to_string(),
            file_name: "a/b.mp3".to_string(),
            source_name: "Remote".to_string(),
        };
        let info = FileInfo {
            kana_reading: String::new(),
            pitch_pattern: None,
            pitch_number: None,
        };
        let hit = resolve_file(&source, &meta, &bound, &info);
        assert_eq!(hit.desired_filename, "雨_Remote.mp3");
        assert_eq!(hit.url, "https://example.com/audio/media/a/b.mp3");
        assert_eq!(hit.pitch_number, "?");
    }

    #[tokio::test]
    async fn test_total_stats_and_cleanup() {
        let temp = tempfile::tempdir().unwrap();
        let source = write_source(temp.path(), "index.json", NHK_INDEX);
        let mut mgr = manager(temp.path(), vec![source.clone()]).await;
        mgr.read_pronunciation_data(&source).await.unwrap();

        let other = SourceIndex {
            meta: SourceMeta {
                name: "Other".to_string(),
                year: 2020,
                version: 1,
                media_dir: "media".to_string(),
                media_dir_abs: None,
            },
            headwords: BTreeMap::from([("空".to_string(), vec!["sora.ogg".to_string()])]),
            files: BTreeMap::from([(
                "sora.ogg".to_string(),
                FileInfo {
                    kana_reading: "そら".to_string(),
                    pitch_pattern: None,
                    pitch_number: None,
                },
            )]),
        };
        mgr.session().insert_data("Old", &other).await.unwrap();

        let stats = mgr.total_stats().await.unwrap();
        assert_eq!(stats.unique_files, 2);
        assert_eq!(stats.unique_headwords, 2);
        assert_eq!(
            stats.sources,
            vec![AudioStats {
                source_name: "NHK-TEST".to_string(),
                num_files: 2,
                num_headwords: 2,
            }]
        );

        let removed = mgr.remove_unused_audio_data(&[source]).await.unwrap();
        assert_eq!(removed, vec!["Old".to_string()]);
        assert_eq!(mgr.session().source_names().await.unwrap(), vec!["NHK-TEST"]);
        mgr.close().await;
    }
}
