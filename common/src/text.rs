//! テキスト照合ユーティリティ
//!
//! EPD名・材料名のキーワード照合で共通に使う小さな関数群。
//! 照合は常に小文字化した文字列に対して行う。

use std::collections::HashSet;

/// 有意語から除外する語（4文字以上のもののみ意味がある）
const STOP_WORDS: &[&str] = &[
    "eine", "einer", "eines", "einem", "oder", "ohne", "nach", "sowie", "gemäß",
    "material", "materialien", "schicht", "unbekannt", "sonstige", "sonstiges",
    "allgemein", "standard", "typ", "with", "from",
];

/// 小文字化して連続空白を1つにまとめる
pub fn normalize(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// 語の一部として扱う文字か
fn is_word_char(c: char) -> bool {
    c.is_alphanumeric()
}

/// `haystack`（小文字化済み）が `term` を含むか
///
/// 3文字以下の短い語（"sma", "pa", "eps", "hgt" 等）は単語境界でのみ一致させる。
/// "pa" が "parkplatz" に一致するような誤検出を防ぐため。
pub fn contains_term(haystack: &str, term: &str) -> bool {
    let term = term.to_lowercase();
    if term.is_empty() {
        return false;
    }
    if term.chars().count() > 3 {
        return haystack.contains(&term);
    }

    haystack.match_indices(&term).any(|(start, matched)| {
        let before = haystack[..start].chars().next_back();
        let after = haystack[start + matched.len()..].chars().next();
        !before.is_some_and(is_word_char) && !after.is_some_and(is_word_char)
    })
}

/// 最初に一致した語を返す
pub fn find_term<'a>(haystack: &str, terms: &[&'a str]) -> Option<&'a str> {
    terms.iter().copied().find(|term| contains_term(haystack, term))
}

/// いずれかの語を含むか
pub fn contains_any(haystack: &str, terms: &[&str]) -> bool {
    find_term(haystack, terms).is_some()
}

/// 有意語を抽出（4文字以上、ストップワード除外、重複除去、出現順）
pub fn significant_words(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    text.to_lowercase()
        .split(|c: char| !is_word_char(c))
        .filter(|w| w.chars().count() > 3)
        .filter(|w| !w.chars().all(|c| c.is_ascii_digit()))
        .filter(|w| !STOP_WORDS.contains(w))
        .filter(|w| seen.insert(w.to_string()))
        .map(str::to_string)
        .collect()
}

/// 文字数で切り詰め
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_collapses_whitespace() {
        assert_eq!(normalize("  AC   11\tD  S "), "ac 11 d s");
    }

    #[test]
    fn test_contains_term_long() {
        assert!(contains_term("asphaltdeckschicht ac 11", "deck"));
        assert!(contains_term("asphaltdeckschicht", "Asphalt"));
    }

    #[test]
    fn test_contains_term_short_requires_word_boundary() {
        assert!(!contains_term("parkplatz", "pa"));
        assert!(contains_term("pa 11 offenporig", "pa"));
        assert!(contains_term("sma 11 s", "sma"));
        assert!(!contains_term("zweiseitig", "eps"));
        assert!(contains_term("dämmplatte eps 035", "eps"));
    }

    #[test]
    fn test_contains_term_empty() {
        assert!(!contains_term("asphalt", ""));
    }

    #[test]
    fn test_find_term_returns_first_hit() {
        let terms = ["beton", "asphalt"];
        assert_eq!(find_term("asphaltbeton", &terms), Some("beton"));
        assert_eq!(find_term("kies", &terms), None);
    }

    #[test]
    fn test_significant_words() {
        let words = significant_words("Schotter 0/32 für Frostschutz, Schotter");
        assert_eq!(words, vec!["schotter", "frostschutz"]);
    }

    #[test]
    fn test_significant_words_drops_stop_words() {
        assert!(significant_words("Unbekannt Material").is_empty());
    }

    #[test]
    fn test_truncate_chars_multibyte() {
        assert_eq!(truncate_chars("Gießasphalt", 4), "Gieß");
        assert_eq!(truncate_chars("abc", 10), "abc");
    }
}
