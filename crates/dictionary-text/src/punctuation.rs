//! Punctuation normalization.
//!
//! A deterministic sequence of rewrites applied to already-masked text
//! (protected tokens are opaque placeholders at this point, so the rewrites
//! below never touch them).

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

static MULTI_SPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r" {2,}").unwrap());
static SPACE_BEFORE_PUNCT: Lazy<Regex> = Lazy::new(|| Regex::new(r" +([,.;:!?])").unwrap());
static MISSING_SPACE_AFTER_PUNCT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([,.;:!?])([^\s\d\.\)\]\}'\u{201d}\u{2019}])").unwrap());
static REPEATED_BANG_OR_QUESTION: Lazy<Regex> = Lazy::new(|| Regex::new(r"([!?]){2,}").unwrap());
static REPEATED_PERIOD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\.{4,}").unwrap());
static SPACED_DECIMAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d) \. (\d)").unwrap());
static SPACED_TIME: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d) : (\d)").unwrap());
static SPACE_AFTER_OPEN_BRACKET: Lazy<Regex> = Lazy::new(|| Regex::new(r"([(\[{]) +").unwrap());
static SPACE_BEFORE_CLOSE_BRACKET: Lazy<Regex> = Lazy::new(|| Regex::new(r" +([)\]}])").unwrap());
static DASH_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r" *-{2,3} *").unwrap());
static NUMBERED_LIST_DOT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^(\d+)\.(?!\s|\d)").unwrap());

/// Fixed abbreviation lexicon consulted by the emergency abbreviation guard.
/// Titles, months, and academic suffixes whose trailing period must never
/// be treated as a sentence boundary.
static ABBREVIATIONS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "mr", "mrs", "ms", "dr", "prof", "sr", "jr", "st", "rev", "hon", "gen", "col", "capt",
        "lt", "sgt", "jan", "feb", "mar", "apr", "jun", "jul", "aug", "sep", "sept", "oct",
        "nov", "dec", "phd", "md", "ba", "bs", "ma", "llb", "llm", "etc", "vs", "eg", "ie",
        "no", "vol", "approx", "dept", "univ",
    ]
    .into_iter()
    .collect()
});

fn last_token(prefix: &str) -> String {
    prefix
        .rsplit(|c: char| c.is_whitespace())
        .next()
        .unwrap_or("")
        .trim_matches(|c: char| !c.is_alphanumeric())
        .to_lowercase()
}

/// Normalize punctuation in already-masked `text`.
#[must_use]
pub fn normalize_punctuation(text: &str) -> String {
    let mut out = text.to_string();

    out = SPACE_BEFORE_PUNCT.replace_all(&out, "$1").into_owned();
    out = insert_space_after_punct_with_guard(&out);
    out = REPEATED_BANG_OR_QUESTION.replace_all(&out, "$1").into_owned();
    out = REPEATED_PERIOD.replace_all(&out, "...").into_owned();
    out = SPACED_DECIMAL.replace_all(&out, "$1.$2").into_owned();
    out = SPACED_TIME.replace_all(&out, "$1:$2").into_owned();
    out = SPACE_AFTER_OPEN_BRACKET.replace_all(&out, "$1").into_owned();
    out = SPACE_BEFORE_CLOSE_BRACKET.replace_all(&out, "$1").into_owned();
    out = DASH_RUN.replace_all(&out, "\u{2014}").into_owned();
    out = NUMBERED_LIST_DOT.replace_all(&out, "$1. ").into_owned();
    out = MULTI_SPACE.replace_all(&out, " ").into_owned();
    out.trim().to_string()
}

/// Insert a space after sentence punctuation that is immediately followed by
/// a non-space character, unless the preceding token is a known abbreviation
/// (in which case leave the `.` alone — it is very likely not a sentence
/// boundary at all).
fn insert_space_after_punct_with_guard(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    loop {
        let Some(m) = MISSING_SPACE_AFTER_PUNCT.find(rest) else {
            out.push_str(rest);
            break;
        };
        let punct_char = rest.as_bytes()[m.start()] as char;
        let prefix = &rest[..m.start()];
        if punct_char == '.' {
            let token = last_token(prefix);
            if ABBREVIATIONS.contains(token.as_str()) {
                out.push_str(&rest[..m.end()]);
                rest = &rest[m.end()..];
                continue;
            }
        }
        out.push_str(&rest[..m.start() + 1]);
        out.push(' ');
        out.push_str(&rest[m.start() + 1..m.end()]);
        rest = &rest[m.end()..];
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapses_multiple_spaces() {
        assert_eq!(normalize_punctuation("a   b    c"), "a b c");
    }

    #[test]
    fn removes_space_before_punctuation() {
        assert_eq!(normalize_punctuation("hello , world !"), "hello, world!");
    }

    #[test]
    fn inserts_space_after_punctuation() {
        assert_eq!(normalize_punctuation("hello,world"), "hello, world");
    }

    #[test]
    fn abbreviation_guard_leaves_dr_alone() {
        assert_eq!(normalize_punctuation("see Dr.Smith today"), "see Dr.Smith today");
    }

    #[test]
    fn inserts_space_after_period_at_sentence_boundary() {
        assert_eq!(normalize_punctuation("end.Next"), "end. Next");
    }

    #[test]
    fn ellipsis_runs_are_not_split_by_the_missing_space_rule() {
        assert_eq!(normalize_punctuation("wait... really"), "wait... really");
        assert_eq!(normalize_punctuation("wait....really"), "wait... really");
    }

    #[test]
    fn caps_repeated_exclamation_and_question() {
        assert_eq!(normalize_punctuation("wow!!!! really????"), "wow! really?");
    }

    #[test]
    fn fixes_spaced_decimal_and_time() {
        assert_eq!(normalize_punctuation("3 . 14 at 12 : 30"), "3.14 at 12:30");
    }

    #[test]
    fn trims_space_around_brackets() {
        assert_eq!(normalize_punctuation("( hello )"), "(hello)");
    }

    #[test]
    fn normalizes_dash_runs_to_em_dash() {
        assert_eq!(normalize_punctuation("a -- b --- c"), "a\u{2014}b\u{2014}c");
    }

    #[test]
    fn numbered_list_dot_gets_spaced() {
        assert_eq!(normalize_punctuation("1.first item\n2.second item"), "1. first item\n2. second item");
    }
}
