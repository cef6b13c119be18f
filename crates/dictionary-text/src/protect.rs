//! Protected-token masking.
//!
//! Replaces substrings that must survive downstream normalization unchanged
//! (URLs, version numbers, abbreviations, dates, ...) with opaque
//! placeholders of the fixed form `⟦PT000001⟧`, and restores them later.
//! Never raises: on any internal failure the input is returned unchanged
//! with an empty map.

use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;

/// Maximum number of placeholders assigned per input.
pub const MAX_PLACEHOLDERS: usize = 200;

/// A single matched span, before placeholder assignment.
#[derive(Debug, Clone)]
struct Candidate {
    start: usize,
    end: usize,
    text: String,
}

/// Ordered, prioritized pattern list: longer/more specific patterns first so
/// that e.g. a dotted-abbreviation pattern doesn't fragment a version number.
/// Each entry is `(name, regex)`; name is unused downstream but documents
/// intent and keeps the list self-describing.
static PATTERNS: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    let specs: &[(&str, &str)] = &[
        ("url", r"(?i)\bhttps?://[^\s<>\[\]{}()]+"),
        ("email", r"(?i)\b[\w.+-]+@[\w-]+\.[\w.-]+\b"),
        ("ip", r"\b(?:\d{1,3}\.){3}\d{1,3}\b"),
        ("programming_language", r"\b(?:C\+\+|C#|F#|\.NET(?:\s+Core)?|Node\.js|ASP\.NET)\b"),
        ("tech_acronym_dotted", r"\b[A-Za-z](?:\.[A-Za-z])+\.?\b"),
        ("version", r"\bv?\d+(?:\.\d+){1,3}(?:-[a-zA-Z0-9]+)?\b"),
        ("date_iso", r"\b\d{4}-\d{2}-\d{2}\b"),
        ("date_slash", r"\b\d{1,2}/\d{1,2}/\d{2,4}\b"),
        ("file_extension", r"\b[\w-]+\.(?:txt|csv|json|xml|pdf|docx?|xlsx?|rs|py|js|ts|md)\b"),
        ("abbreviation_dotted", r"\b(?:[A-Za-z]{1,3}\.){1,3}"),
        ("unit", r"\b\d+(?:\.\d+)?\s?(?:kg|km|cm|mm|mph|kph|ml|oz|lb|ft|in)\b"),
        ("currency", r"[$€£¥]\s?\d+(?:[.,]\d+)?"),
        ("scientific_notation", r"\b\d+(?:\.\d+)?[eE][+-]?\d+\b"),
        ("chemical_formula", r"\b(?:[A-Z][a-z]?\d*){2,}\b"),
        ("phone", r"\b\(?\d{3}\)?[-.\s]?\d{3}[-.\s]?\d{4}\b"),
        ("vin", r"\b[A-HJ-NPR-Z0-9]{17}\b"),
        ("roman_numeral", r"\b(?:IX|IV|V?I{1,3}|X{1,3})\b"),
        ("fraction", r"\b\d+/\d+\b"),
        ("percentage", r"\b\d+(?:\.\d+)?%"),
        ("ordinal", r"\b\d+(?:st|nd|rd|th)\b"),
    ];
    specs
        .iter()
        .map(|(name, pat)| (*name, Regex::new(pat).expect("static pattern compiles")))
        .collect()
});

fn collect_candidates(text: &str) -> Vec<Candidate> {
    let mut found = Vec::new();
    for (_, re) in PATTERNS.iter() {
        for m in re.find_iter(text) {
            found.push(Candidate {
                start: m.start(),
                end: m.end(),
                text: m.as_str().to_string(),
            });
        }
    }
    // start-ascending, length-descending so the first non-overlapping choice
    // at any position prefers the longest, most specific match.
    found.sort_by(|a, b| {
        a.start
            .cmp(&b.start)
            .then_with(|| (b.end - b.start).cmp(&(a.end - a.start)))
    });

    let mut chosen: Vec<Candidate> = Vec::new();
    let mut last_end = 0usize;
    for cand in found {
        if cand.start >= last_end {
            last_end = cand.end;
            chosen.push(cand);
        }
    }
    chosen
}

fn placeholder(index: usize) -> String {
    format!("\u{27e6}PT{index:06}\u{27e7}")
}

/// Result of [`protect`]: the masked text plus the placeholder → original map.
#[derive(Debug, Clone, Default)]
pub struct Protected {
    pub text: String,
    pub map: BTreeMap<String, String>,
}

/// Mask protected tokens in `text`, returning the masked text and a map from
/// placeholder to original substring. Never raises; on any internal error
/// the input is returned unchanged with an empty map.
#[must_use]
pub fn protect(text: &str) -> Protected {
    let result = std::panic::catch_unwind(|| protect_inner(text));
    result.unwrap_or_else(|_| Protected {
        text: text.to_string(),
        map: BTreeMap::new(),
    })
}

fn protect_inner(text: &str) -> Protected {
    let candidates = collect_candidates(text);
    if candidates.is_empty() {
        return Protected {
            text: text.to_string(),
            map: BTreeMap::new(),
        };
    }

    let mut map = BTreeMap::new();
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0usize;
    let mut index = 1usize;

    for cand in candidates {
        if index > MAX_PLACEHOLDERS {
            break;
        }
        out.push_str(&text[cursor..cand.start]);
        let ph = placeholder(index);
        out.push_str(&ph);
        map.insert(ph, cand.text);
        cursor = cand.end;
        index += 1;
    }
    out.push_str(&text[cursor..]);

    Protected { text: out, map }
}

/// Restore placeholders in `text` back to their original substrings, in key
/// (placeholder) order.
#[must_use]
pub fn restore(text: &str, map: &BTreeMap<String, String>) -> String {
    let mut out = text.to_string();
    for (placeholder, original) in map {
        out = out.replace(placeholder.as_str(), original);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_law() {
        let inputs = [
            "Use .NET Core 6.0 and e.g. X.Y",
            "Visit https://example.com/path for v2.3.1 details",
            "contact me at a@b.com or call 555-123-4567",
            "plain sentence with no protected tokens",
        ];
        for input in inputs {
            let protected = protect(input);
            let restored = restore(&protected.text, &protected.map);
            assert_eq!(restored, input, "round-trip failed for {input:?}");
        }
    }

    #[test]
    fn placeholders_never_overlap_and_are_left_to_right() {
        let protected = protect("Use .NET Core 6.0 and e.g. X.Y");
        assert!(protected.map.len() >= 2);
        let mut last_idx = 0usize;
        for key in protected.map.keys() {
            let num: usize = key
                .trim_start_matches('\u{27e6}')
                .trim_start_matches("PT")
                .trim_end_matches('\u{27e7}')
                .parse()
                .unwrap();
            assert!(num > last_idx);
            last_idx = num;
        }
    }

    #[test]
    fn at_most_two_hundred_placeholders() {
        let many = "v1.0 ".repeat(500);
        let protected = protect(&many);
        assert!(protected.map.len() <= MAX_PLACEHOLDERS);
    }

    #[test]
    fn failure_path_returns_input_unchanged() {
        // protect() never raises by construction; verify the public
        // contract directly on an adversarial (but not panicking) input.
        let weird = "\u{0}\u{1}\u{2}";
        let protected = protect(weird);
        assert_eq!(restore(&protected.text, &protected.map), weird);
    }

    proptest::proptest! {
        #[test]
        fn protect_restore_round_trip_arbitrary(s in "[ -~]{0,200}") {
            let protected = protect(&s);
            proptest::prop_assert_eq!(restore(&protected.text, &protected.map), s);
        }
    }
}
