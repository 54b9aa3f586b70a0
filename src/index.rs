//! Audio source index format.
//!
//! A source index is a JSON document with three top-level keys:
//!
//! - `meta` - dictionary name, year, version, and where the media files live
//! - `headwords` - headword to list of audio filenames
//! - `files` - audio filename to reading and pitch accent info
//!
//! Indices may be shipped as plain JSON or inside a zip archive holding exactly
//! one `.json` member. This module only parses bytes it is handed; reading files
//! and downloading is done by the caller.

use std::collections::BTreeMap;
use std::io::{Cursor, Read};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::AudioSourceConfig;
use crate::download::{AudioManagerError, FetchRequest};

/// Extension of the index member inside a zip archive.
pub const INDEX_FILE_EXTENSION: &str = ".json";

/// Source metadata as written by the index author.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceMeta {
    /// Name given to the dictionary by its creator.
    pub name: String,
    pub year: i64,
    pub version: i64,
    /// Media directory relative to the index location.
    pub media_dir: String,
    /// Absolute media directory. Takes precedence over `media_dir` when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_dir_abs: Option<String>,
}

/// Reading and accent info of one audio file.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FileInfo {
    pub kana_reading: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pitch_pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pitch_number: Option<String>,
}

/// Parsed audio source index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceIndex {
    pub meta: SourceMeta,
    pub headwords: BTreeMap<String, Vec<String>>,
    pub files: BTreeMap<String, FileInfo>,
}

/// Where index bytes came from. Decides how they are decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexOrigin {
    /// Plain JSON file on the local disk.
    LocalFile,
    /// Zip archive on the local disk.
    LocalZip,
    /// Payload of a remote download. Either plain JSON or a zip archive.
    Downloaded,
}

/// Decodes index bytes according to their origin.
///
/// # Errors
///
/// Returns [`AudioManagerError::Json`] for malformed JSON and
/// [`AudioManagerError::Archive`] for a corrupt archive or one without
/// exactly one index member.
pub fn parse_index(
    source: &AudioSourceConfig,
    bytes: &[u8],
    origin: IndexOrigin,
) -> Result<SourceIndex, AudioManagerError> {
    match origin {
        IndexOrigin::LocalFile => parse_json(source, bytes),
        IndexOrigin::LocalZip => parse_zip(source, bytes),
        IndexOrigin::Downloaded => parse_downloaded(source, bytes),
    }
}

/// Decodes a plain JSON index.
///
/// # Errors
///
/// Returns [`AudioManagerError::Json`] if the bytes aren't a valid index.
pub fn parse_json(
    source: &AudioSourceConfig,
    bytes: &[u8],
) -> Result<SourceIndex, AudioManagerError> {
    serde_json::from_slice(bytes)
        .map_err(|e| AudioManagerError::json(FetchRequest::Source(source.clone()), e))
}

/// Decodes the single `.json` member of a zip archive.
///
/// # Errors
///
/// Returns [`AudioManagerError::Archive`] if the archive is corrupt or does
/// not hold exactly one index member, or [`AudioManagerError::Json`] if the
/// member isn't a valid index.
pub fn parse_zip(
    source: &AudioSourceConfig,
    bytes: &[u8],
) -> Result<SourceIndex, AudioManagerError> {
    let archive = zip::ZipArchive::new(Cursor::new(bytes)).map_err(|e| {
        AudioManagerError::archive(FetchRequest::Source(source.clone()), e.to_string())
    })?;
    let member = read_index_member(source, archive)?;
    parse_json(source, &member)
}

/// Decodes a downloaded payload.
///
/// Remote hosts may serve either a raw index or a zip archive, so a payload
/// that fails to decode as JSON is retried as an archive. When the payload
/// isn't an archive either, the JSON error is reported.
///
/// # Errors
///
/// Same as [`parse_json`] and [`parse_zip`].
pub fn parse_downloaded(
    source: &AudioSourceConfig,
    bytes: &[u8],
) -> Result<SourceIndex, AudioManagerError> {
    let json_error = match parse_json(source, bytes) {
        Ok(index) => return Ok(index),
        Err(e) => e,
    };
    match zip::ZipArchive::new(Cursor::new(bytes)) {
        Ok(archive) => {
            debug!(source = %source.name, "downloaded index is a zip archive");
            let member = read_index_member(source, archive)?;
            parse_json(source, &member)
        }
        Err(_) => Err(json_error),
    }
}

fn read_index_member(
    source: &AudioSourceConfig,
    mut archive: zip::ZipArchive<Cursor<&[u8]>>,
) -> Result<Vec<u8>, AudioManagerError> {
    let request = || FetchRequest::Source(source.clone());

    let candidates: Vec<String> = archive
        .file_names()
        .filter(|name| name.ends_with(INDEX_FILE_EXTENSION))
        .map(str::to_string)
        .collect();

    let name = match candidates.as_slice() {
        [name] => name,
        [] => return Err(AudioManagerError::archive(request(), "no json member")),
        _ => {
            return Err(AudioManagerError::archive(
                request(),
                format!("{} json members, expected one", candidates.len()),
            ));
        }
    };

    let mut member = archive
        .by_name(name)
        .map_err(|e| AudioManagerError::archive(request(), e.to_string()))?;
    let mut buffer = Vec::new();
    member
        .read_to_end(&mut buffer)
        .map_err(|e| AudioManagerError::archive(request(), e.to_string()))?;
    Ok(buffer)
}
