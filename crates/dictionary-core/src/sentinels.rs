//! Shared sentinel values referenced by every layer of the pipeline.

/// Placeholder stored in a parent-table text column when the real text has
/// been routed through the non-English side-store.
pub const NON_ENGLISH: &str = "[NON_ENGLISH]";

/// Forbidden placeholder: never a legal value for an example's original or
/// rewritten text.
pub const BILINGUAL_EXAMPLE: &str = "[BILINGUAL_EXAMPLE]";

/// Default source code used when a caller does not supply one.
pub const UNKNOWN_SOURCE: &str = "UNKNOWN";

/// Column size bounds from the data model (§3).
pub mod bounds {
    pub const WORD: usize = 200;
    pub const PART_OF_SPEECH: usize = 50;
    pub const DEFINITION: usize = 2000;
    pub const ETYMOLOGY: usize = 4000;
    pub const RAW_FRAGMENT: usize = 8000;
    pub const SOURCE_CODE: usize = 30;
    pub const DOMAIN_CODE: usize = 50;
    pub const USAGE_LABEL: usize = 50;
}

/// Normalize a source code: trim, upper-case, and substitute the sentinel
/// when blank.
#[must_use]
pub fn normalize_source_code(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        UNKNOWN_SOURCE.to_string()
    } else {
        let upper = trimmed.to_uppercase();
        truncate_chars(&upper, bounds::SOURCE_CODE)
    }
}

/// Truncate a string to at most `max_chars` Unicode scalar values (never
/// splitting a multi-byte codepoint).
#[must_use]
pub fn truncate_chars(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        s.chars().take(max_chars).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_source_code_becomes_unknown() {
        assert_eq!(normalize_source_code("   "), "UNKNOWN");
        assert_eq!(normalize_source_code(""), "UNKNOWN");
    }

    #[test]
    fn source_code_is_trimmed_and_uppercased() {
        assert_eq!(normalize_source_code("  web  "), "WEB");
    }

    #[test]
    fn truncate_chars_respects_unicode_boundaries() {
        let s = "a".repeat(5) + "Ω" + &"b".repeat(5);
        let truncated = truncate_chars(&s, 6);
        assert_eq!(truncated.chars().count(), 6);
    }
}
