//! Deterministic hashing.
//!
//! SHA-256 of trimmed, NFC-normalized UTF-8 bytes, rendered as lowercase hex.
//! NFC normalization first so that precomposed and combining-diacritic
//! spellings of the same word (e.g. `"café"` typed as one codepoint vs. `e`
//! + combining acute) hash identically. Used for the staging loader's dedup
//! keys (`wordHash`, `definitionHash`) and for the rewrite-memory index's
//! `OriginalTextHash` field.

use sha2::{Digest, Sha256};
use unicode_normalization::UnicodeNormalization;

/// Raw 32-byte SHA-256 digest of the trimmed, NFC-normalized input. Returns
/// `None` when the trimmed input is empty (the spec's "empty/whitespace
/// input" case, where callers use the empty *string* sentinel instead).
#[must_use]
pub fn sha256_bytes(input: &str) -> Option<[u8; 32]> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }
    let normalized: String = trimmed.nfc().collect();
    let mut hasher = Sha256::new();
    hasher.update(normalized.as_bytes());
    Some(hasher.finalize().into())
}

/// Lowercase hex SHA-256 of the trimmed input. Empty/whitespace input maps
/// to the empty string, matching the spec's deterministic-hash contract.
#[must_use]
pub fn sha256_hex(input: &str) -> String {
    sha256_bytes(input).map_or_else(String::new, |bytes| hex::encode(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_and_whitespace_hash_to_empty_string() {
        assert_eq!(sha256_hex(""), "");
        assert_eq!(sha256_hex("   \t\n"), "");
        assert!(sha256_bytes("").is_none());
    }

    #[test]
    fn hash_is_deterministic() {
        let a = sha256_hex("a small feline");
        let b = sha256_hex("a small feline");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn trimming_does_not_change_hash() {
        assert_eq!(sha256_hex("  cat  "), sha256_hex("cat"));
    }

    #[test]
    fn composed_and_decomposed_forms_hash_the_same() {
        let precomposed = "caf\u{e9}";
        let decomposed = "cafe\u{301}";
        assert_eq!(sha256_hex(precomposed), sha256_hex(decomposed));
    }

    #[test]
    fn byte_length_is_32() {
        let bytes = sha256_bytes("cat").unwrap();
        assert_eq!(bytes.len(), 32);
    }

    proptest::proptest! {
        #[test]
        fn hex_is_always_64_lowercase_hex_chars_or_empty(s in ".*") {
            let h = sha256_hex(&s);
            if !s.trim().is_empty() {
                proptest::prop_assert_eq!(h.len(), 64);
                proptest::prop_assert!(h.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
            } else {
                proptest::prop_assert_eq!(h, String::new());
            }
        }
    }
}
