//! Telling dictionary forms apart from conjugated recordings.

use crate::kana::{is_kana_char, literal_pronunciation, replace_handakuten};

/// Decides whether a recording's reading is an inflected form of a headword.
pub trait InflectionCheck: Send + Sync {
    fn is_inflected(&self, headword: &str, reading: &str) -> bool;
}

/// Compares the kana ending of the headword with the ending of the reading.
///
/// `分かる` read `わかった` is inflected, `分かる` read `わかる` isn't.
#[derive(Debug, Clone, Copy, Default)]
pub struct KanaSuffixInflection;

impl InflectionCheck for KanaSuffixInflection {
    fn is_inflected(&self, headword: &str, reading: &str) -> bool {
        let headword = replace_handakuten(headword);
        let reading = replace_handakuten(reading);
        let suffix = longest_kana_suffix(&headword);
        if suffix.is_empty() {
            return false;
        }
        let suffix_len = suffix.chars().count();
        let reading_len = reading.chars().count();
        let tail: String = reading
            .chars()
            .skip(reading_len.saturating_sub(suffix_len))
            .collect();
        literal_pronunciation(suffix) != literal_pronunciation(&tail)
    }
}

/// The trailing run of kana in `word`; empty if it ends with anything else.
#[must_use]
pub fn longest_kana_suffix(word: &str) -> &str {
    let start = word
        .char_indices()
        .rev()
        .take_while(|(_, c)| is_kana_char(*c))
        .last()
        .map_or(word.len(), |(i, _)| i);
    &word[start..]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inflected(headword: &str, reading: &str) -> bool {
        KanaSuffixInflection.is_inflected(headword, reading)
    }

    #[test]
    fn test_longest_kana_suffix() {
        assert_eq!(longest_kana_suffix("分かる"), "かる");
        assert_eq!(longest_kana_suffix("綺麗"), "");
        assert_eq!(longest_kana_suffix("ひらがな"), "ひらがな");
        assert_eq!(longest_kana_suffix(""), "");
    }

    #[test]
    fn test_dictionary_forms_are_not_inflected() {
        assert!(!inflected("分かる", "わかる"));
        assert!(!inflected("臭い", "くさい"));
        assert!(!inflected("綺麗", "きれい"));
        assert!(!inflected("産気づく", "さんけずく"));
        assert!(!inflected("雇う", "やとう"));
    }

    #[test]
    fn test_nasal_marks_are_not_inflections() {
        assert!(!inflected("ひらがな", "ヒラカ\u{309A}ナ"));
        assert!(!inflected("れんご", "レンコ\u{309A}"));
    }

    #[test]
    fn test_conjugated_readings_are_inflected() {
        assert!(inflected("ひらがな", "ヒラカ\u{309A}ナオ"));
        assert!(inflected("分かる", "わかった"));
    }
}
