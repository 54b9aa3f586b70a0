//! Media filename construction and de-duplication.
//!
//! Filenames end up in a flat media folder shared with other tools, so they
//! are cut to a fixed byte size and stripped of characters that some
//! filesystems or note renderers choke on.

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use regex::Regex;
use unicode_normalization::UnicodeNormalization;

use crate::source::FileUrlData;

/// Byte budget of a media filename stem. Leaves room for the extension.
pub const MAX_FILENAME_STEM_BYTES: usize = 120 - 4;

#[allow(clippy::expect_used)]
static FILENAME_PROHIBITED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"[\\\n\t\r#%&\[\]{}<>^*?/$!'":@+`|=]+"#).expect("valid regex")
});

#[allow(clippy::expect_used)]
static PITCH_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+|\?").expect("valid regex"));

/// Cuts `text` to at most `max_bytes` UTF-8 bytes without splitting a char.
#[must_use]
pub fn cut_to_size(text: &str, max_bytes: usize) -> &str {
    if text.len() <= max_bytes {
        return text;
    }
    let mut end = max_bytes;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

/// Makes `text` safe to use as a filename stem.
///
/// Cuts to [`MAX_FILENAME_STEM_BYTES`], NFC-normalizes, replaces runs of
/// prohibited characters with `_` and trims surrounding whitespace.
#[must_use]
pub fn normalize_filename(text: &str) -> String {
    let cut = cut_to_size(text, MAX_FILENAME_STEM_BYTES);
    let normalized: String = cut.nfc().collect();
    FILENAME_PROHIBITED
        .replace_all(&normalized, "_")
        .trim()
        .to_string()
}

/// Splits a filename into stem and extension, the dot kept with the extension.
///
/// Leading dots don't start an extension, so `.hidden` has none.
#[must_use]
pub fn split_extension(file_name: &str) -> (&str, &str) {
    let base_start = file_name.rfind(['/', '\\']).map_or(0, |i| i + 1);
    let base = &file_name[base_start..];
    let leading_dots = base.len() - base.trim_start_matches('.').len();
    match base[leading_dots..].rfind('.') {
        Some(dot) => file_name.split_at(base_start + leading_dots + dot),
        None => (file_name, ""),
    }
}

/// Joins every pitch number found in `raw` with dashes.
///
/// A file can hold several words chained together, each with its own accent
/// (`1-0`, `2-3`). Returns `?` when nothing recognizable is present.
#[must_use]
pub fn norm_pitch_numbers(raw: &str) -> String {
    let numbers: Vec<&str> = PITCH_NUMBER.find_iter(raw).map(|m| m.as_str()).collect();
    if numbers.is_empty() {
        "?".to_string()
    } else {
        numbers.join("-")
    }
}

/// Drops files with a repeated URL.
///
/// The last file seen for a URL wins, kept at the position where the URL
/// first appeared.
#[must_use]
pub fn ensure_unique_urls(files: Vec<FileUrlData>) -> Vec<FileUrlData> {
    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut unique: Vec<FileUrlData> = Vec::with_capacity(files.len());
    for file in files {
        if let Some(&pos) = positions.get(&file.url) {
            unique[pos] = file;
        } else {
            positions.insert(file.url.clone(), unique.len());
            unique.push(file);
        }
    }
    unique
}

/// Renames files whose desired filename is already taken.
///
/// The clash gets a counter before the extension: `name(1).ogg`,
/// `name(2).ogg` and so on.
#[must_use]
pub fn ensure_unique_names(files: Vec<FileUrlData>) -> Vec<FileUrlData> {
    let mut taken: HashSet<String> = HashSet::with_capacity(files.len());
    let mut unique = Vec::with_capacity(files.len());
    for mut file in files {
        if taken.contains(&file.desired_filename) {
            let (stem, ext) = split_extension(&file.desired_filename);
            let (stem, ext) = (stem.to_string(), ext.to_string());
            let mut idx = 1;
            while taken.contains(&file.desired_filename) {
                file.desired_filename = format!("{stem}({idx}){ext}");
                idx += 1;
            }
        }
        taken.insert(file.desired_filename.clone());
        unique.push(file);
    }
    unique
}

/// Removes repeated URLs, then makes the remaining filenames unique.
#[must_use]
pub fn ensure_unique_files(files: Vec<FileUrlData>) -> Vec<FileUrlData> {
    ensure_unique_names(ensure_unique_urls(files))
}
