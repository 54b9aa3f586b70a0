//! Index, archive and factory builders.

use std::io::Write;
use std::path::Path;

use kotoba_audio::search::TextTools;
use kotoba_audio::{AudioSourceConfig, AudioSourceManagerFactory, CacheStore, Config};
use serde_json::{Map, Value, json};

/// One audio file listed in a test index.
pub struct Entry<'a> {
    pub headword: &'a str,
    pub file: &'a str,
    pub reading: &'a str,
    pub pitch_number: Option<&'a str>,
}

impl<'a> Entry<'a> {
    pub fn new(headword: &'a str, file: &'a str, reading: &'a str) -> Self {
        Self {
            headword,
            file,
            reading,
            pitch_number: None,
        }
    }

    pub fn pitch(mut self, pitch_number: &'a str) -> Self {
        self.pitch_number = Some(pitch_number);
        self
    }
}

/// Builds index JSON holding `entries`, with media under `media/`.
pub fn index_json(name: &str, entries: &[Entry<'_>]) -> String {
    let mut headwords: Map<String, Value> = Map::new();
    let mut files: Map<String, Value> = Map::new();
    for entry in entries {
        let listed = headwords
            .entry(entry.headword.to_string())
            .or_insert_with(|| Value::Array(Vec::new()));
        if let Value::Array(list) = listed {
            list.push(Value::String(entry.file.to_string()));
        }
        let mut info = json!({ "kana_reading": entry.reading });
        if let Some(pitch) = entry.pitch_number {
            info["pitch_number"] = Value::String(pitch.to_string());
        }
        files.insert(entry.file.to_string(), info);
    }
    json!({
        "meta": {"name": name, "year": 2024, "version": 1, "media_dir": "media"},
        "headwords": headwords,
        "files": files,
    })
    .to_string()
}

/// Zip archive with a single member.
pub fn zip_bytes(member: &str, body: &str) -> Vec<u8> {
    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut writer = zip::ZipWriter::new(&mut cursor);
        writer
            .start_file(member, zip::write::SimpleFileOptions::default())
            .unwrap();
        writer.write_all(body.as_bytes()).unwrap();
        writer.finish().unwrap();
    }
    cursor.into_inner()
}

/// Writes `body` to `dir/file_name` and returns a source config pointing at it.
pub fn local_source(dir: &Path, name: &str, file_name: &str, body: &[u8]) -> AudioSourceConfig {
    let path = dir.join(file_name);
    std::fs::write(&path, body).unwrap();
    AudioSourceConfig::new(name, path.to_string_lossy().into_owned())
}

pub fn config_with(sources: Vec<AudioSourceConfig>) -> Config {
    Config {
        audio_sources: sources,
        ..Config::default()
    }
}

/// Factory with a store under `dir/data` and the default text tools.
pub fn factory(dir: &Path, sources: Vec<AudioSourceConfig>) -> AudioSourceManagerFactory {
    let store = CacheStore::open(&dir.join("data")).unwrap();
    AudioSourceManagerFactory::new(config_with(sources), store, TextTools::default())
}
