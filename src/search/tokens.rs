//! Splitting a sentence into searchable chunks.

use std::sync::LazyLock;

use regex::Regex;

use super::furigana::clean_furigana;

/// Splits text into chunks that are looked up on their own when the whole
/// text has no audio.
pub trait Tokenizer: Send + Sync {
    /// Returns the chunks of `text` in the order they appear. Chunks are
    /// never empty.
    fn tokenize(&self, text: &str) -> Vec<String>;
}

#[allow(clippy::expect_used)]
static HTML_AND_MEDIA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^<>]+>|\[sound:[^\[\]]+\]").expect("valid regex"));

/// Anything that isn't Japanese script, a digit or a furigana bracket.
#[allow(clippy::expect_used)]
static NON_JP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"[^\x{3000}-\x{303f}\x{3040}-\x{309f}\x{30a0}-\x{30ff}\x{ff66}-\x{ff9f}\x{4e00}-\x{9fff}\x{3400}-\x{4dbf}０-９0-9\]\[]+",
    )
    .expect("valid regex")
});

/// Japanese punctuation and symbols.
#[allow(clippy::expect_used)]
static JP_SEP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"[仝　 ・、※【】「」〒◎×〃゜『』《》〜\~〽,.。〄〇〈〉〓〔〕〖〗〘〙〚〛〝〞〟〠〡〢〣〥〦〧〨〭〮〯〫〬〶〷〸〹〺〻〼〾〿！？…ヽヾゞ〱〲〳〵〴（）［］｛｝｟｠゠＝‥•◦﹅﹆＊♪♫♬♩ⓍⓁⓎ]+",
    )
    .expect("valid regex")
});

/// Expressions with their own recordings that shouldn't merge with the
/// surrounding text. Longer months come first so `11月` isn't read as `1月`.
#[allow(clippy::expect_used)]
static SPECIAL_WORDS: LazyLock<Regex> = LazyLock::new(|| {
    let months = [
        "11月", "12月", "1月", "2月", "3月", "4月", "5月", "6月", "7月", "8月", "9月", "10月",
    ];
    let wide_months = [
        "１１月", "１２月", "１月", "２月", "３月", "４月", "５月", "６月", "７月", "８月", "９月",
        "１０月",
    ];
    let kanji_months = [
        "十一月", "十二月", "一月", "二月", "三月", "四月", "五月", "六月", "七月", "八月", "九月",
        "十月",
    ];
    let people = ["一人", "二人", "1人", "2人"];
    let pattern = months
        .iter()
        .chain(&wide_months)
        .chain(&kanji_months)
        .chain(&people)
        .copied()
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&pattern).expect("valid regex")
});

/// Splits on punctuation, non-Japanese text and a fixed list of special
/// expressions, dropping furigana from each chunk.
///
/// ```
/// use kotoba_audio::search::{SeparatorTokenizer, Tokenizer};
///
/// let tokens = SeparatorTokenizer.tokenize("雨、空");
/// assert_eq!(tokens, vec!["雨", "空"]);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct SeparatorTokenizer;

impl Tokenizer for SeparatorTokenizer {
    fn tokenize(&self, text: &str) -> Vec<String> {
        let text = HTML_AND_MEDIA.replace_all(text, "");
        let mut tokens = Vec::new();
        for chunk in NON_JP.split(&text) {
            for part in JP_SEP.split(chunk) {
                let part = clean_furigana(part);
                split_special_words(&part, &mut tokens);
            }
        }
        tokens
    }
}

fn split_special_words(part: &str, out: &mut Vec<String>) {
    let mut last = 0;
    for found in SPECIAL_WORDS.find_iter(part) {
        push_non_empty(&part[last..found.start()], out);
        push_non_empty(found.as_str(), out);
        last = found.end();
    }
    push_non_empty(&part[last..], out);
}

fn push_non_empty(token: &str, out: &mut Vec<String>) {
    if !token.is_empty() {
        out.push(token.to_string());
    }
}
