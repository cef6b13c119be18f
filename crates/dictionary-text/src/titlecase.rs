//! Title-case preservation.
//!
//! Capitalizes the first alphabetic character of words that should be
//! capitalized in a title (first word, word after a colon, word inside
//! parens/quotes, or any word not in the stop-word set) while leaving
//! protected tokens, proper nouns, and prefix/suffix-ruled words exactly as
//! given.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::{LazyLock, OnceLock, RwLock};

/// Rules loaded from `token-preservation-rules.json`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PreservationRules {
    /// Tokens preserved byte-for-byte wherever they occur (case-insensitive
    /// match, exact-case replacement): "C#", ".NET", "iPhone", ...
    #[serde(default)]
    pub always_preserve_exact: Vec<String>,
    /// Proper nouns preserved in their given exact case.
    #[serde(default)]
    pub proper_nouns: Vec<String>,
    /// Additional regex patterns (acronym, dotted abbreviation, Roman
    /// numeral, version number, email, ...) whose matches are preserved.
    #[serde(default)]
    pub preserve_patterns: Vec<String>,
    /// Prefixes after which the following character stays capitalized even
    /// mid-word: "Mc", "Mac", "O'".
    #[serde(default)]
    pub preserve_prefixes: Vec<String>,
    /// Suffixes that are always preserved exactly: "Jr.", "Ph.D.".
    #[serde(default)]
    pub preserve_suffixes: Vec<String>,
}

impl PreservationRules {
    fn built_in_defaults() -> Self {
        Self {
            always_preserve_exact: vec![
                "C#".into(),
                "F#".into(),
                ".NET".into(),
                "iPhone".into(),
                "iPad".into(),
                "iOS".into(),
                "macOS".into(),
                "eBay".into(),
            ],
            proper_nouns: Vec::new(),
            preserve_patterns: vec![
                r"\b[A-Z]{2,}\b".to_string(),
                r"\b(?:[A-Za-z]\.){2,}".to_string(),
                r"\b(?:IX|IV|V?I{1,3}|X{1,3})\b".to_string(),
                r"\bv?\d+(?:\.\d+){1,3}\b".to_string(),
                r"(?i)\b[\w.+-]+@[\w-]+\.[\w.-]+\b".to_string(),
            ],
            preserve_prefixes: vec!["Mc".into(), "Mac".into(), "O'".into()],
            preserve_suffixes: vec!["Jr.".into(), "Sr.".into(), "Ph.D.".into()],
        }
    }
}

/// Stop words consulted for any word that isn't first, after a colon, or
/// inside parens/quotes.
#[derive(Debug, Clone, Default)]
pub struct StopWords(pub HashSet<String>);

impl StopWords {
    fn built_in_defaults() -> Self {
        const WORDS: &[&str] = &[
            "a", "an", "and", "as", "at", "but", "by", "for", "from", "in", "into", "nor", "of",
            "on", "onto", "or", "over", "per", "the", "to", "up", "via", "vs", "with",
        ];
        Self(WORDS.iter().map(|w| (*w).to_string()).collect())
    }
}

struct CompiledRules {
    rules: PreservationRules,
    stop_words: StopWords,
    patterns: Vec<Regex>,
}

impl CompiledRules {
    fn compile(rules: PreservationRules, stop_words: StopWords) -> Self {
        let patterns = rules
            .preserve_patterns
            .iter()
            .filter_map(|p| Regex::new(p).ok())
            .collect();
        Self {
            rules,
            stop_words,
            patterns,
        }
    }
}

static STATE: OnceLock<RwLock<CompiledRules>> = OnceLock::new();

fn state() -> &'static RwLock<CompiledRules> {
    STATE.get_or_init(|| {
        RwLock::new(CompiledRules::compile(
            PreservationRules::built_in_defaults(),
            StopWords::built_in_defaults(),
        ))
    })
}

/// Replace the process-wide preservation rules and stop-word set. Mirrors
/// the service's `reloadConfiguration` entry point.
pub fn reload_configuration(rules: PreservationRules, stop_words: StopWords) {
    let mut guard = state().write().unwrap_or_else(|e| e.into_inner());
    *guard = CompiledRules::compile(rules, stop_words);
}

static WORD_BOUNDARY: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\S+").unwrap());

/// Apply title-case preservation to `text`.
#[must_use]
pub fn titlecase(text: &str) -> String {
    let guard = state().read().unwrap_or_else(|e| e.into_inner());
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0usize;
    let mut word_index = 0usize;
    let mut paren_depth = 0i32;
    let mut after_colon = false;

    for m in WORD_BOUNDARY.find_iter(text) {
        out.push_str(&text[cursor..m.start()]);
        cursor = m.end();

        let before_word = &text[..m.start()];
        let opens = before_word.matches(['(', '[', '"', '\u{201c}']).count() as i32;
        let closes = before_word.matches([')', ']', '"', '\u{201d}']).count() as i32;
        paren_depth = (opens - closes).max(0);

        let is_first = word_index == 0;
        let inside_quotes_or_parens = paren_depth > 0;
        let force_capitalize = is_first || inside_quotes_or_parens || after_colon;

        let word = m.as_str();
        out.push_str(&render_word(&guard, word, force_capitalize));

        after_colon = word.ends_with(':');
        word_index += 1;
    }
    out.push_str(&text[cursor..]);
    out
}

fn render_word(rules: &CompiledRules, word: &str, force_capitalize: bool) -> String {
    if let Some(canonical) = canonical_exact_form(rules, word) {
        return canonical;
    }
    if is_preserved_exact(rules, word) {
        return word.to_string();
    }
    if let Some(rendered) = render_hyphenated(rules, word, force_capitalize) {
        return rendered;
    }

    let bare = word.trim_end_matches(|c: char| !c.is_alphanumeric());
    let stop = rules.stop_words.0.contains(&bare.to_lowercase());

    if force_capitalize || !stop {
        capitalize_first_alpha(word)
    } else {
        word.to_lowercase()
    }
}

fn render_hyphenated(rules: &CompiledRules, word: &str, force_capitalize: bool) -> Option<String> {
    if !word.contains('-') || word.matches('-').count() > 4 {
        return None;
    }
    let segments: Vec<&str> = word.split('-').collect();
    if segments.len() < 2 {
        return None;
    }
    let rendered: Vec<String> = segments
        .iter()
        .enumerate()
        .map(|(i, seg)| render_word(rules, seg, force_capitalize && i == 0))
        .collect();
    Some(rendered.join("-"))
}

/// Tokens in `always_preserve_exact` and `proper_nouns` render in the rule's
/// own canonical casing, regardless of how the source text cased them
/// (matched case-insensitively, with leading/trailing punctuation from the
/// source word carried through).
/// Characters considered part of the "core" of a word for exact-preservation
/// matching: alphanumerics plus the punctuation that shows up inside tokens
/// like "C#" and ".NET" themselves.
fn is_core_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '#' | '.' | '\'')
}

fn canonical_exact_form(rules: &CompiledRules, word: &str) -> Option<String> {
    let leading_len: usize = word.chars().take_while(|c| !is_core_char(*c)).map(char::len_utf8).sum();
    let trailing_len: usize = word.chars().rev().take_while(|c| !is_core_char(*c)).map(char::len_utf8).sum();
    if leading_len + trailing_len >= word.len() {
        return None;
    }
    let leading = &word[..leading_len];
    let trailing = &word[word.len() - trailing_len..];
    let core = &word[leading_len..word.len() - trailing_len];

    for exact in &rules.rules.always_preserve_exact {
        if core.eq_ignore_ascii_case(exact) {
            return Some(format!("{leading}{exact}{trailing}"));
        }
    }
    for noun in &rules.rules.proper_nouns {
        if core.eq_ignore_ascii_case(noun) {
            return Some(format!("{leading}{noun}{trailing}"));
        }
    }
    None
}

fn is_preserved_exact(rules: &CompiledRules, word: &str) -> bool {
    for suffix in &rules.rules.preserve_suffixes {
        if word.eq_ignore_ascii_case(suffix) {
            return true;
        }
    }
    for prefix in &rules.rules.preserve_prefixes {
        if word.starts_with(prefix.as_str()) && word.len() > prefix.len() {
            return true;
        }
    }
    for pattern in &rules.patterns {
        if let Some(m) = pattern.find(word) {
            if m.start() == 0 && m.end() == word.len() {
                return true;
            }
        }
    }
    false
}

fn capitalize_first_alpha(word: &str) -> String {
    let mut out = String::with_capacity(word.len());
    let mut capitalized = false;
    for c in word.chars() {
        if !capitalized && c.is_alphabetic() {
            out.extend(c.to_uppercase());
            capitalized = true;
        } else if capitalized {
            out.push(c);
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reset() {
        reload_configuration(
            PreservationRules::built_in_defaults(),
            StopWords::built_in_defaults(),
        );
    }

    #[test]
    fn first_word_always_capitalized_even_if_stop_word() {
        reset();
        assert_eq!(titlecase("the quick brown fox"), "The Quick Brown Fox");
    }

    #[test]
    fn stop_words_stay_lowercase_mid_title() {
        reset();
        assert_eq!(titlecase("war and peace"), "War and Peace");
    }

    #[test]
    fn always_preserve_exact_tokens_survive() {
        reset();
        assert_eq!(titlecase("learning c# and .net"), "Learning C# And .NET");
    }

    #[test]
    fn hyphenated_words_recurse_per_segment() {
        reset();
        assert_eq!(titlecase("state-of-the-art design"), "State-Of-The-Art Design");
    }

    #[test]
    fn after_colon_forces_capitalization() {
        reset();
        assert_eq!(titlecase("notes: an overview"), "Notes: An Overview");
    }

    #[test]
    fn prefix_rule_preserves_existing_mc_and_mac_casing() {
        reset();
        assert_eq!(titlecase("met McDonald and MacIntyre"), "Met McDonald and MacIntyre");
    }

    #[test]
    fn suffix_rule_preserves_existing_jr_and_phd_casing() {
        reset();
        assert_eq!(titlecase("james smith Jr. Ph.D."), "James Smith Jr. Ph.D.");
    }

    #[test]
    fn reload_configuration_replaces_stop_words() {
        let mut custom = StopWords::built_in_defaults();
        custom.0.insert("design".to_string());
        reload_configuration(PreservationRules::built_in_defaults(), custom);
        assert_eq!(titlecase("a great design"), "A Great design");
        reset();
    }
}
