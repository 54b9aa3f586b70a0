//! Reading annotations (`word[reading]`) and markup stripping.

use std::sync::LazyLock;

use regex::Regex;

/// Separator some users put between alternative readings.
pub const MULTIPLE_READING_SEP: &str = "・";

#[allow(clippy::expect_used)]
static LINE_BREAK_TAGS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<br\s*/?>|</?div[^<>]*>").expect("valid regex")
});

#[allow(clippy::expect_used)]
static HTML_AND_MEDIA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^<>]+>|\[sound:[^\[\]]+\]").expect("valid regex"));

#[allow(clippy::expect_used)]
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

#[allow(clippy::expect_used)]
static NON_JP_FURIGANA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[[^ぁ-ゖァ-ヺｧ-ﾝ]+\]").expect("valid regex"));

#[allow(clippy::expect_used)]
static FURIGANA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([^ \[\]]+)\[[^ \[\]]+\]").expect("valid regex"));

#[allow(clippy::expect_used)]
static BRACKET_GROUP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[[^\[\]]+?\]").expect("valid regex"));

/// A word and the reading it was annotated with. The reading is empty when
/// there was no usable annotation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WordReading {
    pub word: String,
    pub reading: String,
}

/// Turns field HTML into a single line of text.
///
/// Line-breaking tags become spaces, other tags and `[sound:...]` tags are
/// dropped, common entities are decoded and whitespace is collapsed.
#[must_use]
pub fn strip_html(text: &str) -> String {
    let text = LINE_BREAK_TAGS.replace_all(text, " ");
    let text = HTML_AND_MEDIA.replace_all(&text, "");
    let text = text
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&amp;", "&");
    WHITESPACE.replace_all(text.trim(), " ").into_owned()
}

/// Removes `word[reading]` annotations, keeping the words.
#[must_use]
pub fn clean_furigana(text: &str) -> String {
    FURIGANA.replace_all(text, "$1").replace(' ', "")
}

/// Splits an annotated expression into the word and its reading.
///
/// ```
/// use kotoba_audio::search::split_furigana;
///
/// let split = split_furigana("辛[から]い", ", ");
/// assert_eq!(split.word, "辛い");
/// assert_eq!(split.reading, "からい");
/// ```
///
/// Brackets holding no kana (`テスト[1]`) aren't readings and are dropped.
/// Readings that are numbers, list several alternatives, or are marked
/// wrong with a leading `x`/`×` are ignored.
#[must_use]
pub fn split_furigana(expr: &str, reading_separator: &str) -> WordReading {
    let expr = NON_JP_FURIGANA.replace_all(expr, "");
    let (word, reading) = word_reading(&expr);
    let word = clean_furigana(&word);
    let mut reading = clean_furigana(&reading);
    if !reading.is_empty() && should_ignore_reading(&reading, reading_separator) {
        reading.clear();
    }
    WordReading { word, reading }
}

fn should_ignore_reading(reading: &str, reading_separator: &str) -> bool {
    let separator = reading_separator.trim();
    reading.chars().all(char::is_numeric)
        || (!separator.is_empty() && reading.contains(separator))
        || reading.contains(MULTIPLE_READING_SEP)
        || reading.starts_with('x')
        || reading.starts_with('×')
}

fn word_reading(text: &str) -> (String, String) {
    let tied = BRACKET_GROUP.replace_all(text, |caps: &regex::Captures<'_>| {
        caps[0].replace(' ', MULTIPLE_READING_SEP)
    });
    let mut word = String::new();
    let mut reading = String::new();
    for part in tied.split_whitespace() {
        let (head, part_reading, suffix) = decompose_word(part);
        word.push_str(&head);
        word.push_str(&suffix);
        reading.push_str(&part_reading);
        reading.push_str(&suffix);
    }
    if !reading.is_empty() && word != reading {
        (word, reading)
    } else {
        (text.to_string(), String::new())
    }
}

/// Locates the first `head[reading]suffix` split, if any.
fn find_head_reading_suffix(text: &str) -> Option<(&str, &str, &str)> {
    let mut start = None;
    for (i, c) in text.char_indices() {
        match c {
            '[' => start = Some(i),
            ']' => {
                return match start {
                    Some(start) if start > 0 => {
                        Some((&text[..start], &text[start + 1..i], &text[i + 1..]))
                    }
                    _ => None,
                };
            }
            _ => {}
        }
    }
    None
}

/// `南[みなみ]千[ち]秋[あき]` gives (`南千秋`, `みなみちあき`, ``),
/// `辛[から]い` gives (`辛`, `から`, `い`).
fn decompose_word(text: &str) -> (String, String, String) {
    let mut head = String::new();
    let mut reading = String::new();
    let mut suffix = String::new();
    let mut rest = text;
    let mut first = true;
    while !rest.is_empty() {
        if let Some((part_head, part_reading, part_suffix)) = find_head_reading_suffix(rest) {
            head.push_str(part_head);
            reading.push_str(part_reading);
            rest = part_suffix;
        } else {
            if first {
                head.push_str(rest);
                reading.push_str(rest);
            } else {
                suffix.push_str(rest);
            }
            break;
        }
        first = false;
    }
    (head, reading, suffix)
}
