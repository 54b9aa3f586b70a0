//! Kana conversions used when matching readings.

/// Distance between a hiragana code point and its katakana counterpart.
const KANA_OFFSET: u32 = 0x60;

const HIRAGANA_CONVERTIBLE: std::ops::RangeInclusive<char> = 'ぁ'..='ゖ';
const KATAKANA_CONVERTIBLE: std::ops::RangeInclusive<char> = 'ァ'..='ヶ';

/// Combining semi-voiced mark (handakuten).
const COMBINING_HANDAKUTEN: char = '\u{309A}';
/// Spacing semi-voiced mark.
const SPACING_HANDAKUTEN: char = '\u{309C}';

fn shift(c: char, up: bool) -> char {
    let code = if up {
        u32::from(c) + KANA_OFFSET
    } else {
        u32::from(c) - KANA_OFFSET
    };
    char::from_u32(code).unwrap_or(c)
}

/// Converts hiragana to katakana, leaving every other character alone.
#[must_use]
pub fn to_katakana(text: &str) -> String {
    text.chars()
        .map(|c| {
            if HIRAGANA_CONVERTIBLE.contains(&c) {
                shift(c, true)
            } else {
                c
            }
        })
        .collect()
}

/// Converts katakana to hiragana, leaving every other character alone.
#[must_use]
pub fn to_hiragana(text: &str) -> String {
    text.chars()
        .map(|c| {
            if KATAKANA_CONVERTIBLE.contains(&c) {
                shift(c, false)
            } else {
                c
            }
        })
        .collect()
}

/// True for hiragana, katakana and the prolonged sound mark.
#[must_use]
pub fn is_kana_char(c: char) -> bool {
    matches!(c, '\u{3041}'..='\u{309F}' | '\u{30A0}'..='\u{30FF}')
}

/// Folds nasal-g spellings (`か゚`, `カ゚` ...) into the voiced kana they are
/// read as (`が`, `ガ` ...).
#[must_use]
pub fn replace_handakuten(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        let next_is_mark = chars
            .peek()
            .is_some_and(|&n| n == COMBINING_HANDAKUTEN || n == SPACING_HANDAKUTEN);
        if next_is_mark && matches!(c, 'か' | 'き' | 'く' | 'け' | 'こ' | 'カ' | 'キ' | 'ク' | 'ケ' | 'コ') {
            out.push(char::from_u32(u32::from(c) + 1).unwrap_or(c));
            chars.next();
        } else {
            out.push(c);
        }
    }
    out
}

/// Reading as it is pronounced, for comparing and sorting readings.
///
/// Katakana, with `ヂ`/`ヅ` folded into `ジ`/`ズ` and `ヲ` into `オ`.
#[must_use]
pub fn literal_pronunciation(reading: &str) -> String {
    to_katakana(reading)
        .chars()
        .map(|c| match c {
            'ヂ' => 'ジ',
            'ヅ' => 'ズ',
            'ヲ' => 'オ',
            other => other,
        })
        .collect()
}
