//! Body language detection

use lingua::{Language, LanguageDetector, LanguageDetectorBuilder};
use std::sync::OnceLock;

/// Languages the detector chooses between
const CANDIDATES: [Language; 9] = [
    Language::English,
    Language::Chinese,
    Language::Japanese,
    Language::Korean,
    Language::German,
    Language::French,
    Language::Spanish,
    Language::Russian,
    Language::Portuguese,
];

fn detector() -> &'static LanguageDetector {
    static DETECTOR: OnceLock<LanguageDetector> = OnceLock::new();
    DETECTOR.get_or_init(|| LanguageDetectorBuilder::from_languages(&CANDIDATES).build())
}

/// Returns the lowercase ISO 639-1 code of the text's language
///
/// `None` for blank text or when no candidate is a confident match.
pub fn detect_language(text: &str) -> Option<String> {
    if text.trim().is_empty() {
        return None;
    }
    detector()
        .detect_language_of(text)
        .map(|language| language.iso_code_639_1().to_string().to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detects_english_and_chinese() {
        assert_eq!(
            detect_language("The central bank kept interest rates unchanged this week.").as_deref(),
            Some("en")
        );
        assert_eq!(
            detect_language("中国人民银行本周宣布维持贷款市场报价利率不变。").as_deref(),
            Some("zh")
        );
    }

    #[test]
    fn test_blank_text_has_no_language() {
        assert_eq!(detect_language(""), None);
        assert_eq!(detect_language("  \n\t"), None);
    }
}
