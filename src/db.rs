//! Persistent cache of audio source indices.
//!
//! The store is a single SQLite file holding three tables:
//! - `meta` - one row per source: dictionary name, year, version, media
//!   location, and the URL the cached data was fetched from
//! - `headwords` - headword to audio filename, many rows per source
//! - `files` - audio filename to kana reading and pitch accent info
//!
//! The schema version is part of the file name. A new schema means a new
//! file, and files of other versions are deleted when the store is opened
//! rather than migrated.
//!
//! A [`CacheSession`] owns its connection exclusively. Open one per unit of
//! work (a background initialization, a foreground search) and close it when
//! done; sessions are never shared across tasks.
//!
//! # Example
//!
//! ```no_run
//! use kotoba_audio::db::CacheStore;
//! use std::path::Path;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = CacheStore::open(Path::new("./data"))?;
//! let mut session = store.session().await?;
//! println!("cached sources: {:?}", session.source_names().await?);
//! session.close().await;
//! # Ok(())
//! # }
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode};
use sqlx::{Connection, QueryBuilder, Sqlite, SqliteConnection};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::index::{FileInfo, SourceIndex};

/// Store file name prefix.
pub const STORE_PREFIX: &str = "audio_sources";

/// Current schema version, embedded in the store file name.
pub const STORE_VERSION: &str = "v2";

/// Store file extension.
pub const STORE_EXTENSION: &str = "sqlite3";

/// SQLite busy timeout.
/// Connections will wait this long before returning SQLITE_BUSY.
const BUSY_TIMEOUT: Duration = Duration::from_millis(5000);

/// Bound parameters per statement accepted by every SQLite build.
const BIND_LIMIT: usize = 999;

const SCHEMA: [&str; 6] = [
    "CREATE TABLE IF NOT EXISTS meta(
        source_name TEXT PRIMARY KEY NOT NULL,
        dictionary_name TEXT NOT NULL,
        year INTEGER NOT NULL,
        version INTEGER NOT NULL,
        original_url TEXT,
        media_dir TEXT NOT NULL,
        media_dir_abs TEXT
    )",
    "CREATE TABLE IF NOT EXISTS headwords(
        source_name TEXT NOT NULL,
        headword TEXT NOT NULL,
        file_name TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS files(
        source_name TEXT NOT NULL,
        file_name TEXT NOT NULL,
        kana_reading TEXT NOT NULL,
        pitch_pattern TEXT,
        pitch_number TEXT
    )",
    "CREATE INDEX IF NOT EXISTS index_names ON meta(source_name)",
    "CREATE INDEX IF NOT EXISTS index_file_names ON headwords(source_name, headword)",
    "CREATE INDEX IF NOT EXISTS index_file_info ON files(source_name, file_name)",
];

/// Store-related errors.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Query or connection failure.
    #[error("audio source store query failed: {0}")]
    Connection(#[from] sqlx::Error),

    /// Creating, scanning or deleting store files failed.
    #[error("audio source store file operation failed on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A cached property was requested for a source that isn't cached.
    #[error("audio source {source_name} is not cached")]
    NotCached { source_name: String },
}

impl StoreError {
    fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Metadata row of a cached source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedMeta {
    /// Name given to the dictionary by its creator.
    pub dictionary_name: String,
    pub year: i64,
    pub version: i64,
    /// URL the cached data was fetched from. `None` until installation completes.
    pub original_url: Option<String>,
    pub media_dir: String,
    pub media_dir_abs: Option<String>,
}

/// One headword-to-file mapping found in the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BoundFile {
    pub headword: String,
    pub file_name: String,
    pub source_name: String,
}

/// Location of the cache store on disk.
#[derive(Debug, Clone)]
pub struct CacheStore {
    path: PathBuf,
}

impl CacheStore {
    /// Opens the store in `data_dir`, creating the directory if needed.
    ///
    /// Store files of other schema versions found in `data_dir` are deleted.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the directory can't be created or scanned.
    #[instrument(skip(data_dir), fields(data_dir = %data_dir.display()))]
    pub fn open(data_dir: &Path) -> Result<Self, StoreError> {
        std::fs::create_dir_all(data_dir).map_err(|e| StoreError::io(data_dir, e))?;
        remove_deprecated_files(data_dir)?;
        Ok(Self {
            path: data_dir.join(store_file_name()),
        })
    }

    /// Path of the store file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Opens a new exclusively-owned session.
    ///
    /// Creates the store file and its tables when missing.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Connection`] if the file can't be opened or the
    /// schema can't be created.
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub async fn session(&self) -> Result<CacheSession, StoreError> {
        let options = SqliteConnectOptions::new()
            .filename(&self.path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(BUSY_TIMEOUT);
        let mut conn = SqliteConnection::connect_with(&options).await?;
        for statement in SCHEMA {
            sqlx::query(statement).execute(&mut conn).await?;
        }
        debug!("store session opened");
        Ok(CacheSession { conn })
    }

    /// Deletes the store file and its journal companions.
    ///
    /// Missing files are not an error. The next session starts from an empty
    /// store.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if an existing file can't be removed.
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub fn purge(&self) -> Result<(), StoreError> {
        let mut companions = vec![self.path.clone()];
        for suffix in ["-wal", "-shm"] {
            let mut name = self.path.clone().into_os_string();
            name.push(suffix);
            companions.push(PathBuf::from(name));
        }
        for path in companions {
            match std::fs::remove_file(&path) {
                Ok(()) => info!(path = %path.display(), "removed store file"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(StoreError::io(path, e)),
            }
        }
        Ok(())
    }
}

fn store_file_name() -> String {
    format!("{STORE_PREFIX}.{STORE_VERSION}.{STORE_EXTENSION}")
}

fn remove_deprecated_files(data_dir: &Path) -> Result<(), StoreError> {
    let entries = std::fs::read_dir(data_dir).map_err(|e| StoreError::io(data_dir, e))?;
    let extension = format!(".{STORE_EXTENSION}");
    for entry in entries.flatten() {
        let name = entry.file_name().to_string_lossy().into_owned();
        if !name.starts_with(STORE_PREFIX) || !name.ends_with(&extension) {
            continue;
        }
        let parts: Vec<&str> = name.split('.').collect();
        let reason = match parts.as_slice() {
            [_, version, _] if *version == STORE_VERSION => continue,
            [_, _, _] => "obsolete",
            _ => "invalid",
        };
        let path = entry.path();
        match std::fs::remove_file(&path) {
            Ok(()) => info!(path = %path.display(), reason, "removed store file"),
            Err(e) => warn!(path = %path.display(), error = %e, "failed to remove store file"),
        }
    }
    Ok(())
}

/// Exclusive connection to the cache store.
///
/// Every mutating call runs in its own transaction, so a source's rows are
/// either fully present or fully absent to other sessions.
#[derive(Debug)]
pub struct CacheSession {
    conn: SqliteConnection,
}

impl CacheSession {
    /// True if all three tables hold rows for the source.
    ///
    /// Partially present data counts as not cached.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Connection`] if the query fails.
    pub async fn is_source_cached(&mut self, source_name: &str) -> Result<bool, StoreError> {
        let cached: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM meta WHERE source_name = ?1)
                AND EXISTS(SELECT 1 FROM headwords WHERE source_name = ?1)
                AND EXISTS(SELECT 1 FROM files WHERE source_name = ?1)",
        )
        .bind(source_name)
        .fetch_one(&mut self.conn)
        .await?;
        Ok(cached)
    }

    /// Stores a parsed index under `source_name`.
    ///
    /// Leftover rows of the same source are dropped first. The original URL
    /// is left unset; see [`set_original_url`](Self::set_original_url).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Connection`] if any statement fails. Nothing is
    /// written in that case.
    #[instrument(skip(self, index), fields(source = %source_name))]
    pub async fn insert_data(
        &mut self,
        source_name: &str,
        index: &SourceIndex,
    ) -> Result<(), StoreError> {
        let mut tx = self.conn.begin().await?;
        delete_rows(&mut tx, source_name).await?;
        insert_rows(&mut tx, source_name, index, None).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Replaces whatever is cached for `source_name` with `index`, fetched from
    /// `original_url`, in one transaction.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Connection`] if any statement fails. The previous
    /// data stays in place in that case.
    #[instrument(skip(self, index), fields(source = %source_name))]
    pub async fn replace_data(
        &mut self,
        source_name: &str,
        index: &SourceIndex,
        original_url: &str,
    ) -> Result<(), StoreError> {
        let mut tx = self.conn.begin().await?;
        delete_rows(&mut tx, source_name).await?;
        insert_rows(&mut tx, source_name, index, Some(original_url)).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Deletes every row of the source from all three tables.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Connection`] if any statement fails.
    #[instrument(skip(self), fields(source = %source_name))]
    pub async fn remove_data(&mut self, source_name: &str) -> Result<(), StoreError> {
        let mut tx = self.conn.begin().await?;
        delete_rows(&mut tx, source_name).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Metadata row of a cached source.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotCached`] if the source has no metadata row.
    pub async fn get_meta(&mut self, source_name: &str) -> Result<CachedMeta, StoreError> {
        let row: Option<(String, i64, i64, Option<String>, String, Option<String>)> =
            sqlx::query_as(
                "SELECT dictionary_name, year, version, original_url, media_dir, media_dir_abs
                 FROM meta WHERE source_name = ? LIMIT 1",
            )
            .bind(source_name)
            .fetch_optional(&mut self.conn)
            .await?;
        let (dictionary_name, year, version, original_url, media_dir, media_dir_abs) =
            row.ok_or_else(|| StoreError::NotCached {
                source_name: source_name.to_string(),
            })?;
        Ok(CachedMeta {
            dictionary_name,
            year,
            version,
            original_url,
            media_dir,
            media_dir_abs,
        })
    }

    /// URL the cached data was fetched from.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotCached`] if the source has no metadata row.
    pub async fn get_original_url(
        &mut self,
        source_name: &str,
    ) -> Result<Option<String>, StoreError> {
        Ok(self.get_meta(source_name).await?.original_url)
    }

    /// Records the URL the cached data was fetched from.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotCached`] if the source has no metadata row.
    pub async fn set_original_url(
        &mut self,
        source_name: &str,
        original_url: &str,
    ) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE meta SET original_url = ? WHERE source_name = ?")
            .bind(original_url)
            .bind(source_name)
            .execute(&mut self.conn)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotCached {
                source_name: source_name.to_string(),
            });
        }
        Ok(())
    }

    /// Files listed under `headword` in one source.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Connection`] if the query fails.
    pub async fn search_files_in_source(
        &mut self,
        source_name: &str,
        headword: &str,
    ) -> Result<Vec<BoundFile>, StoreError> {
        let names: Vec<String> = sqlx::query_scalar(
            "SELECT file_name FROM headwords WHERE source_name = ? AND headword = ?",
        )
        .bind(source_name)
        .bind(headword)
        .fetch_all(&mut self.conn)
        .await?;
        Ok(names
            .into_iter()
            .map(|file_name| BoundFile {
                headword: headword.to_string(),
                file_name,
                source_name: source_name.to_string(),
            })
            .collect())
    }

    /// Files listed under `headword` in any cached source.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Connection`] if the query fails.
    pub async fn search_files(&mut self, headword: &str) -> Result<Vec<BoundFile>, StoreError> {
        let rows: Vec<(String, String)> =
            sqlx::query_as("SELECT file_name, source_name FROM headwords WHERE headword = ?")
                .bind(headword)
                .fetch_all(&mut self.conn)
                .await?;
        Ok(rows
            .into_iter()
            .map(|(file_name, source_name)| BoundFile {
                headword: headword.to_string(),
                file_name,
                source_name,
            })
            .collect())
    }

    /// Reading and accent info of one file.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Connection`] if the query fails.
    pub async fn get_file_info(
        &mut self,
        source_name: &str,
        file_name: &str,
    ) -> Result<Option<FileInfo>, StoreError> {
        let row: Option<(String, Option<String>, Option<String>)> = sqlx::query_as(
            "SELECT kana_reading, pitch_pattern, pitch_number FROM files
             WHERE source_name = ? AND file_name = ? LIMIT 1",
        )
        .bind(source_name)
        .bind(file_name)
        .fetch_optional(&mut self.conn)
        .await?;
        Ok(row.map(|(kana_reading, pitch_pattern, pitch_number)| FileInfo {
            kana_reading,
            pitch_pattern,
            pitch_number,
        }))
    }

    /// Names of every source with a metadata row.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Connection`] if the query fails.
    pub async fn source_names(&mut self) -> Result<Vec<String>, StoreError> {
        Ok(
            sqlx::query_scalar("SELECT source_name FROM meta ORDER BY source_name")
                .fetch_all(&mut self.conn)
                .await?,
        )
    }

    /// Number of distinct audio files across `source_names`.
    ///
    /// A file is identified by its name together with the dictionary name and
    /// year, so equal file names in different dictionaries are counted apart.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Connection`] if the query fails.
    pub async fn distinct_file_count(&mut self, source_names: &[String]) -> Result<u64, StoreError> {
        if source_names.is_empty() {
            return Ok(0);
        }
        let mut builder = QueryBuilder::<Sqlite>::new(
            "SELECT COUNT(*) FROM (
                SELECT DISTINCT f.file_name, m.dictionary_name, m.year FROM files f
                INNER JOIN meta m ON f.source_name = m.source_name
                WHERE f.source_name IN (",
        );
        push_name_list(&mut builder, source_names);
        builder.push("))");
        let count: i64 = builder
            .build_query_scalar()
            .fetch_one(&mut self.conn)
            .await?;
        Ok(u64::try_from(count).unwrap_or_default())
    }

    /// Number of distinct headwords across `source_names`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Connection`] if the query fails.
    pub async fn distinct_headword_count(
        &mut self,
        source_names: &[String],
    ) -> Result<u64, StoreError> {
        if source_names.is_empty() {
            return Ok(0);
        }
        let mut builder = QueryBuilder::<Sqlite>::new(
            "SELECT COUNT(*) FROM (
                SELECT DISTINCT headword FROM headwords WHERE source_name IN (",
        );
        push_name_list(&mut builder, source_names);
        builder.push("))");
        let count: i64 = builder
            .build_query_scalar()
            .fetch_one(&mut self.conn)
            .await?;
        Ok(u64::try_from(count).unwrap_or_default())
    }

    /// Closes the connection.
    #[instrument(skip(self))]
    pub async fn close(self) {
        if let Err(e) = self.conn.close().await {
            warn!(error = %e, "failed to close store session");
        }
    }
}

fn push_name_list<'a>(builder: &mut QueryBuilder<'a, Sqlite>, names: &'a [String]) {
    let mut separated = builder.separated(", ");
    for name in names {
        separated.push_bind(name.as_str());
    }
}

async fn delete_rows(conn: &mut SqliteConnection, source_name: &str) -> Result<(), StoreError> {
    for table in ["meta", "headwords", "files"] {
        sqlx::query(&format!("DELETE FROM {table} WHERE source_name = ?"))
            .bind(source_name)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

async fn insert_rows(
    conn: &mut SqliteConnection,
    source_name: &str,
    index: &SourceIndex,
    original_url: Option<&str>,
) -> Result<(), StoreError> {
    let meta = &index.meta;
    sqlx::query(
        "INSERT INTO meta
         (source_name, dictionary_name, year, version, original_url, media_dir, media_dir_abs)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(source_name)
    .bind(&meta.name)
    .bind(meta.year)
    .bind(meta.version)
    .bind(original_url)
    .bind(&meta.media_dir)
    .bind(meta.media_dir_abs.as_deref())
    .execute(&mut *conn)
    .await?;

    let headwords: Vec<(&str, &str)> = index
        .headwords
        .iter()
        .flat_map(|(headword, files)| {
            files
                .iter()
                .map(move |file_name| (headword.as_str(), file_name.as_str()))
        })
        .collect();
    for chunk in headwords.chunks(BIND_LIMIT / 3) {
        let mut builder =
            QueryBuilder::<Sqlite>::new("INSERT INTO headwords (source_name, headword, file_name) ");
        builder.push_values(chunk, |mut row, (headword, file_name)| {
            row.push_bind(source_name)
                .push_bind(*headword)
                .push_bind(*file_name);
        });
        builder.build().execute(&mut *conn).await?;
    }

    let files: Vec<(&String, &FileInfo)> = index.files.iter().collect();
    for chunk in files.chunks(BIND_LIMIT / 5) {
        let mut builder = QueryBuilder::<Sqlite>::new(
            "INSERT INTO files (source_name, file_name, kana_reading, pitch_pattern, pitch_number) ",
        );
        builder.push_values(chunk, |mut row, (file_name, info)| {
            row.push_bind(source_name)
                .push_bind(file_name.as_str())
                .push_bind(info.kana_reading.as_str())
                .push_bind(info.pitch_pattern.as_deref())
                .push_bind(info.pitch_number.as_deref());
        });
        builder.build().execute(&mut *conn).await?;
    }

    debug!(
        headwords = headwords.len(),
        files = files.len(),
        "inserted source rows"
    );
    Ok(())
}
