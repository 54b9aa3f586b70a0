//! Finding audio for free text.
//!
//! A lookup runs through progressively looser attempts until something is
//! found:
//!
//! 1. the whole text, optionally filtered by its annotated reading
//! 2. the annotated reading alone
//! 3. each token of the text, falling back to morphological analysis for
//!    tokens that have no audio of their own
//!
//! Every attempt tries the literal text, then its hiragana form, then its
//! katakana form. Results are then filtered, de-duplicated and sorted.

mod analyzer;
mod furigana;
mod inflections;
mod tokens;

pub use analyzer::{MorphVariant, MorphologicalAnalyzer, NoAnalyzer};
pub use furigana::{WordReading, clean_furigana, split_furigana, strip_html};
pub use inflections::{InflectionCheck, KanaSuffixInflection, longest_kana_suffix};
pub use tokens::{SeparatorTokenizer, Tokenizer};

use std::collections::HashSet;
use std::fmt;

use tracing::{debug, instrument};

use crate::config::Config;
use crate::db::StoreError;
use crate::download::filename::ensure_unique_files;
use crate::kana::{literal_pronunciation, to_hiragana, to_katakana};
use crate::source::FileUrlData;

/// Exact-match headword lookup across the active sources.
pub trait WordLookup {
    /// Files listed under `word`, in source precedence order.
    fn search_word(
        &mut self,
        word: &str,
    ) -> impl Future<Output = Result<Vec<FileUrlData>, StoreError>> + Send;
}

/// Knobs for [`search_audio`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchOptions {
    pub split_morphemes: bool,
    pub ignore_inflections: bool,
    pub stop_if_one_source_has_results: bool,
    pub maximum_results: usize,
    /// Separator between alternative readings in an annotation.
    pub reading_separator: String,
}

impl SearchOptions {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        let settings = &config.audio_settings;
        Self {
            split_morphemes: settings.split_morphemes,
            ignore_inflections: settings.ignore_inflections,
            stop_if_one_source_has_results: settings.stop_if_one_source_has_results,
            maximum_results: settings.maximum_results,
            reading_separator: config.reading_separator.clone(),
        }
    }
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Language tools the search delegates to.
pub struct TextTools {
    pub tokenizer: Box<dyn Tokenizer>,
    pub analyzer: Box<dyn MorphologicalAnalyzer>,
    pub inflections: Box<dyn InflectionCheck>,
}

impl TextTools {
    #[must_use]
    pub fn with_tokenizer(mut self, tokenizer: impl Tokenizer + 'static) -> Self {
        self.tokenizer = Box::new(tokenizer);
        self
    }

    #[must_use]
    pub fn with_analyzer(mut self, analyzer: impl MorphologicalAnalyzer + 'static) -> Self {
        self.analyzer = Box::new(analyzer);
        self
    }

    #[must_use]
    pub fn with_inflections(mut self, inflections: impl InflectionCheck + 'static) -> Self {
        self.inflections = Box::new(inflections);
        self
    }
}

impl Default for TextTools {
    fn default() -> Self {
        Self {
            tokenizer: Box::new(SeparatorTokenizer),
            analyzer: Box::new(NoAnalyzer),
            inflections: Box::new(KanaSuffixInflection),
        }
    }
}

impl fmt::Debug for TextTools {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TextTools").finish_non_exhaustive()
    }
}

/// Hits grouped by the text they were found for, in discovery order.
#[derive(Debug, Default)]
struct Hits {
    groups: Vec<(String, Vec<FileUrlData>)>,
}

impl Hits {
    fn entry(&mut self, key: &str) -> &mut Vec<FileUrlData> {
        let pos = match self.groups.iter().position(|(k, _)| k == key) {
            Some(pos) => pos,
            None => {
                self.groups.push((key.to_string(), Vec::new()));
                self.groups.len() - 1
            }
        };
        &mut self.groups[pos].1
    }

    /// Replaces the hits of every key in `other`, appending new keys.
    fn update(&mut self, other: Hits) {
        for (key, files) in other.groups {
            *self.entry(&key) = files;
        }
    }

    fn is_empty_for(&self, key: &str) -> bool {
        self.groups
            .iter()
            .find(|(k, _)| k == key)
            .is_none_or(|(_, files)| files.is_empty())
    }

    fn retain_each(&mut self, mut keep: impl FnMut(&[FileUrlData], &FileUrlData) -> bool) {
        for (_, files) in &mut self.groups {
            let snapshot = files.clone();
            files.retain(|file| keep(&snapshot, file));
        }
    }

    fn into_files(self) -> Vec<FileUrlData> {
        self.groups.into_iter().flat_map(|(_, files)| files).collect()
    }
}

/// Searches audio for `text`.
///
/// HTML and `[sound:...]` tags are ignored. An annotation like `雨[あめ]`
/// narrows the results to that reading.
///
/// # Errors
///
/// Returns the store error if a lookup fails.
#[instrument(skip(lookup, options, tools))]
pub async fn search_audio<L: WordLookup>(
    lookup: &mut L,
    text: &str,
    options: &SearchOptions,
    tools: &TextTools,
) -> Result<Vec<FileUrlData>, StoreError> {
    let WordReading { word, reading } =
        split_furigana(&strip_html(text), &options.reading_separator);
    let mut hits = Hits::default();

    let found = search_word_variants(lookup, &word).await?;
    let found = if reading.is_empty() {
        found
    } else {
        let wanted = literal_pronunciation(&reading);
        found
            .into_iter()
            .filter(|file| literal_pronunciation(&file.reading) == wanted)
            .collect()
    };
    *hits.entry(&word) = found;

    if hits.is_empty_for(&word) && !reading.is_empty() {
        debug!(%reading, "searching by reading");
        *hits.entry(&word) = search_word_variants(lookup, &reading).await?;
    }

    if hits.is_empty_for(&word) {
        let mut parts = tools.tokenizer.tokenize(&word);
        dedup_in_order(&mut parts);
        for part in parts {
            let files = search_word_variants(lookup, &part).await?;
            if !files.is_empty() {
                hits.entry(&part).extend(files);
            } else if options.split_morphemes {
                let parsed = parse_and_search(lookup, &part, tools.analyzer.as_ref()).await?;
                hits.update(parsed);
            }
        }
    }

    if options.ignore_inflections {
        let check = tools.inflections.as_ref();
        hits.retain_each(|_, file| !check.is_inflected(&file.word, &file.reading));
    }

    if options.stop_if_one_source_has_results {
        hits.retain_each(|group, file| {
            group
                .first()
                .is_none_or(|first| first.source_name == file.source_name)
        });
    }

    let mut files = ensure_unique_files(hits.into_files());
    files.sort_by_cached_key(|file| {
        (
            literal_pronunciation(&file.reading),
            file.pitch_number.clone(),
        )
    });
    files.truncate(options.maximum_results);
    debug!(results = files.len(), "audio search finished");
    Ok(files)
}

/// Looks up `text` as written, then in hiragana, then in katakana, stopping at
/// the first form with results.
async fn search_word_variants<L: WordLookup>(
    lookup: &mut L,
    text: &str,
) -> Result<Vec<FileUrlData>, StoreError> {
    let hiragana = to_hiragana(text);
    let katakana = to_katakana(text);
    let mut tried: Vec<&str> = Vec::with_capacity(3);
    for variant in [text, hiragana.as_str(), katakana.as_str()] {
        if variant.is_empty() || tried.contains(&variant) {
            continue;
        }
        tried.push(variant);
        let found = lookup.search_word(variant).await?;
        if !found.is_empty() {
            return Ok(found);
        }
    }
    Ok(Vec::new())
}

/// Searches each dictionary form the analyzer finds in `text`.
///
/// For every form, the headword is tried first, then its katakana and
/// hiragana readings. The first one with results wins.
async fn parse_and_search<L: WordLookup>(
    lookup: &mut L,
    text: &str,
    analyzer: &dyn MorphologicalAnalyzer,
) -> Result<Hits, StoreError> {
    let mut hits = Hits::default();
    for parsed in analyzer.analyze(text) {
        let mut variants = vec![parsed.headword.clone()];
        if let Some(katakana) = parsed.katakana_reading.as_deref().filter(|r| !r.is_empty()) {
            variants.push(katakana.to_string());
            variants.push(to_hiragana(katakana));
        }
        for variant in &variants {
            let files = search_word_variants(lookup, variant).await?;
            if !files.is_empty() {
                hits.entry(&parsed.headword).extend(files);
                break;
            }
        }
    }
    Ok(hits)
}

fn dedup_in_order(parts: &mut Vec<String>) {
    let mut seen = HashSet::new();
    parts.retain(|part| seen.insert(part.clone()));
}

/// Renders `[sound:...]` tags for the hits, joined by `separator`.
///
/// ```
/// use kotoba_audio::search::format_audio_tags;
///
/// assert_eq!(format_audio_tags(&[], "<br>"), "");
/// ```
#[must_use]
pub fn format_audio_tags(hits: &[FileUrlData], separator: &str) -> String {
    hits.iter()
        .map(|hit| format!("[sound:{}]", hit.desired_filename))
        .collect::<Vec<_>>()
        .join(separator)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    /// In-memory lookup keyed by headword. Records every query.
    #[derive(Default)]
    struct FakeLookup {
        words: HashMap<String, Vec<FileUrlData>>,
        queries: Vec<String>,
    }

    impl FakeLookup {
        fn with(mut self, word: &str, files: Vec<FileUrlData>) -> Self {
            self.words.insert(word.to_string(), files);
            self
        }
    }

    impl WordLookup for FakeLookup {
        async fn search_word(&mut self, word: &str) -> Result<Vec<FileUrlData>, StoreError> {
            self.queries.push(word.to_string());
            Ok(self.words.get(word).cloned().unwrap_or_default())
        }
    }

    fn hit(word: &str, reading: &str, source: &str, file: &str) -> FileUrlData {
        FileUrlData {
            url: format!("https://{source}.example/{file}"),
            desired_filename: format!("{word}_{reading}_{source}.ogg"),
            word: word.to_string(),
            source_name: source.to_string(),
            reading: reading.to_string(),
            pitch_number: "?".to_string(),
        }
    }

    struct FixedAnalyzer(Vec<MorphVariant>);

    impl MorphologicalAnalyzer for FixedAnalyzer {
        fn analyze(&self, _text: &str) -> Vec<MorphVariant> {
            self.0.clone()
        }
    }

    async fn search(
        lookup: &mut FakeLookup,
        text: &str,
        options: &SearchOptions,
    ) -> Vec<FileUrlData> {
        search_audio(lookup, text, options, &TextTools::default())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_exact_match() {
        let mut lookup =
            FakeLookup::default().with("雨", vec![hit("雨", "あめ", "nhk", "ame.ogg")]);
        let files = search(&mut lookup, "<b>雨</b>", &SearchOptions::default()).await;
        assert_eq!(files.len(), 1);
        assert_eq!(lookup.queries, vec!["雨"]);
    }

    #[tokio::test]
    async fn test_variants_fall_through_to_katakana() {
        let mut lookup =
            FakeLookup::default().with("テレビ", vec![hit("テレビ", "テレビ", "nhk", "tv.ogg")]);
        let found = search_word_variants(&mut lookup, "てれび").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(lookup.queries, vec!["てれび", "テレビ"]);
    }

    #[tokio::test]
    async fn test_variants_stop_at_first_hit() {
        let mut lookup = FakeLookup::default()
            .with("あめ", vec![hit("あめ", "あめ", "a", "1.ogg")])
            .with("アメ", vec![hit("アメ", "あめ", "b", "2.ogg")]);
        let found = search_word_variants(&mut lookup, "あめ").await.unwrap();
        assert_eq!(found[0].source_name, "a");
        assert_eq!(lookup.queries, vec!["あめ"]);
    }

    #[tokio::test]
    async fn test_reading_filters_exact_matches() {
        let mut lookup = FakeLookup::default().with(
            "辛い",
            vec![
                hit("辛い", "からい", "nhk", "karai.ogg"),
                hit("辛い", "つらい", "nhk", "tsurai.ogg"),
            ],
        );
        let files = search(&mut lookup, "辛[つら]い", &SearchOptions::default()).await;
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].reading, "つらい");
    }

    #[tokio::test]
    async fn test_reading_used_when_word_has_no_audio() {
        let mut lookup =
            FakeLookup::default().with("あめ", vec![hit("あめ", "あめ", "nhk", "ame.ogg")]);
        let files = search(&mut lookup, "飴[あめ]", &SearchOptions::default()).await;
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].word, "あめ");
    }

    #[tokio::test]
    async fn test_tokens_searched_when_text_has_no_audio() {
        let mut lookup = FakeLookup::default()
            .with("雨", vec![hit("雨", "あめ", "nhk", "ame.ogg")])
            .with("空", vec![hit("空", "そら", "nhk", "sora.ogg")]);
        let files = search(&mut lookup, "雨、空、雨", &SearchOptions::default()).await;
        let words: Vec<&str> = files.iter().map(|f| f.word.as_str()).collect();
        assert_eq!(words, vec!["雨", "空"]);
    }

    #[tokio::test]
    async fn test_analyzer_variants_searched_for_unknown_tokens() {
        let mut lookup = FakeLookup::default()
            .with("たべる", vec![hit("たべる", "たべる", "nhk", "taberu.ogg")]);
        let tools = TextTools::default().with_analyzer(FixedAnalyzer(vec![MorphVariant::new(
            "食べる",
            Some("タベル".to_string()),
        )]));
        let files = search_audio(&mut lookup, "食べた", &SearchOptions::default(), &tools)
            .await
            .unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].word, "たべる");
        assert!(lookup.queries.contains(&"タベル".to_string()));
    }

    #[tokio::test]
    async fn test_analyzer_skipped_when_splitting_disabled() {
        let mut lookup =
            FakeLookup::default().with("食べる", vec![hit("食べる", "たべる", "nhk", "t.ogg")]);
        let tools = TextTools::default()
            .with_analyzer(FixedAnalyzer(vec![MorphVariant::new("食べる", None)]));
        let options = SearchOptions {
            split_morphemes: false,
            ..SearchOptions::default()
        };
        let files = search_audio(&mut lookup, "食べた", &options, &tools).await.unwrap();
        assert!(files.is_empty());
    }

    #[tokio::test]
    async fn test_stop_if_one_source_has_results() {
        let mut lookup = FakeLookup::default().with(
            "雨",
            vec![
                hit("雨", "あめ", "first", "ame.ogg"),
                hit("雨", "あめ", "second", "ame.ogg"),
                hit("雨", "あめ", "first", "ame2.ogg"),
            ],
        );
        let options = SearchOptions {
            stop_if_one_source_has_results: true,
            ..SearchOptions::default()
        };
        let files = search(&mut lookup, "雨", &options).await;
        assert_eq!(files.len(), 2);
        assert!(files.iter().all(|f| f.source_name == "first"));
    }

    #[tokio::test]
    async fn test_ignore_inflections() {
        let mut lookup = FakeLookup::default().with(
            "分かる",
            vec![
                hit("分かる", "わかる", "nhk", "wakaru.ogg"),
                hit("分かる", "わかった", "nhk", "wakatta.ogg"),
            ],
        );
        let options = SearchOptions {
            ignore_inflections: true,
            ..SearchOptions::default()
        };
        let files = search(&mut lookup, "分かる", &options).await;
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].reading, "わかる");
    }

    #[tokio::test]
    async fn test_results_unique_sorted_and_capped() {
        let mut a = hit("雨", "あめ", "nhk", "ame.ogg");
        a.pitch_number = "1".to_string();
        let mut b = hit("雨", "アメ", "other", "ame.ogg");
        b.pitch_number = "0".to_string();
        b.desired_filename.clone_from(&a.desired_filename);
        let dup = a.clone();
        let mut lookup = FakeLookup::default().with("雨", vec![a, b, dup]);

        let files = search(&mut lookup, "雨", &SearchOptions::default()).await;
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].pitch_number, "0");
        assert_eq!(files[0].desired_filename, "雨_あめ_nhk(1).ogg");
        assert_eq!(files[1].desired_filename, "雨_あめ_nhk.ogg");

        let options = SearchOptions {
            maximum_results: 1,
            ..SearchOptions::default()
        };
        assert_eq!(search(&mut lookup, "雨", &options).await.len(), 1);
    }

    #[test]
    fn test_format_audio_tags() {
        let hits = vec![
            hit("雨", "あめ", "nhk", "ame.ogg"),
            hit("空", "そら", "nhk", "sora.ogg"),
        ];
        assert_eq!(
            format_audio_tags(&hits, "<br>"),
            "[sound:雨_あめ_nhk.ogg]<br>[sound:空_そら_nhk.ogg]"
        );
    }
}
