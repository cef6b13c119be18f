//! Language classification (Component B).
//!
//! Pure, deterministic, no I/O: a codepoint-range classifier rather than a
//! statistical language model. Good enough to route text to the
//! non-English side-store and tag it with a best-effort script bucket.

/// True when `text` contains at least one Unicode letter outside the ASCII
/// letter range (`A-Z`, `a-z`).
#[must_use]
pub fn contains_non_english(text: &str) -> bool {
    text.chars().any(|c| c.is_alphabetic() && !c.is_ascii_alphabetic())
}

/// Best-effort ISO-ish script bucket for `text`, or `None` when the text is
/// plain ASCII or contains no classifiable letters.
#[must_use]
pub fn detect_language_code(text: &str) -> Option<&'static str> {
    for c in text.chars() {
        if let Some(code) = classify_codepoint(c) {
            return Some(code);
        }
    }
    None
}

fn classify_codepoint(c: char) -> Option<&'static str> {
    let cp = c as u32;
    match cp {
        0x4E00..=0x9FFF | 0x3400..=0x4DBF | 0xF900..=0xFAFF => Some("zh"),
        0x3040..=0x309F | 0x30A0..=0x30FF => Some("ja"),
        0xAC00..=0xD7A3 | 0x1100..=0x11FF => Some("ko"),
        0x0600..=0x06FF | 0x0750..=0x077F | 0x08A0..=0x08FF => Some("ar"),
        0x0590..=0x05FF => Some("he"),
        0x0400..=0x04FF | 0x0500..=0x052F => Some("cyrillic-bucket"),
        0x0370..=0x03FF => Some("el"),
        0x0E00..=0x0E7F => Some("th"),
        0x0900..=0x097F => Some("hi"),
        0x00C0..=0x024F if c.is_alphabetic() => Some("latin-extended"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii_only_is_english() {
        assert!(!contains_non_english("a plain English sentence."));
        assert_eq!(detect_language_code("a plain English sentence."), None);
    }

    #[test]
    fn detects_chinese() {
        assert!(contains_non_english("你好"));
        assert_eq!(detect_language_code("你好"), Some("zh"));
    }

    #[test]
    fn detects_japanese_kana() {
        assert!(contains_non_english("こんにちは"));
        assert_eq!(detect_language_code("こんにちは"), Some("ja"));
    }

    #[test]
    fn detects_korean_hangul() {
        assert!(contains_non_english("안녕하세요"));
        assert_eq!(detect_language_code("안녕하세요"), Some("ko"));
    }

    #[test]
    fn detects_arabic() {
        assert!(contains_non_english("مرحبا"));
        assert_eq!(detect_language_code("مرحبا"), Some("ar"));
    }

    #[test]
    fn detects_cyrillic() {
        assert!(contains_non_english("привет"));
        assert_eq!(detect_language_code("привет"), Some("cyrillic-bucket"));
    }

    #[test]
    fn mixed_english_and_non_english_is_flagged() {
        assert!(contains_non_english("hello 世界"));
    }

    #[test]
    fn digits_and_punctuation_do_not_count_as_non_english() {
        assert!(!contains_non_english("42% complete, v1.0 (beta)!"));
    }
}
