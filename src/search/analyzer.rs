//! Pluggable morphological analysis.

/// One candidate dictionary form produced by an analyzer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MorphVariant {
    /// Dictionary form, e.g. `食べる` for `食べた`.
    pub headword: String,
    /// Reading of the dictionary form in katakana, when the analyzer knows it.
    pub katakana_reading: Option<String>,
}

impl MorphVariant {
    #[must_use]
    pub fn new(headword: impl Into<String>, katakana_reading: Option<String>) -> Self {
        Self {
            headword: headword.into(),
            katakana_reading,
        }
    }
}

/// Breaks a chunk of text into dictionary forms.
///
/// Only consulted when a chunk has no audio of its own and morpheme
/// splitting is enabled.
pub trait MorphologicalAnalyzer: Send + Sync {
    fn analyze(&self, text: &str) -> Vec<MorphVariant>;
}

/// Analyzer used when none is installed. Never finds anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAnalyzer;

impl MorphologicalAnalyzer for NoAnalyzer {
    fn analyze(&self, _text: &str) -> Vec<MorphVariant> {
        Vec::new()
    }
}
