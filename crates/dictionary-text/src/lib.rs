//! Text normalization and token-protection primitives.
//!
//! Every writer and rewriter in the pipeline funnels its input text through
//! these primitives before persistence: mask anything that must survive
//! normalization untouched, balance brackets/quotes, normalize punctuation,
//! apply title-case preservation, and restore the masked tokens.

#![forbid(unsafe_code)]

pub mod balance;
pub mod hash;
pub mod lang;
pub mod protect;
pub mod punctuation;
pub mod titlecase;

pub use balance::{balance, BalanceResult};
pub use hash::{sha256_bytes, sha256_hex};
pub use lang::{contains_non_english, detect_language_code};
pub use protect::{protect, restore, Protected};
pub use punctuation::normalize_punctuation;
pub use titlecase::{reload_configuration, titlecase, PreservationRules, StopWords};

/// Run the full normalization pipeline: protect, balance, normalize
/// punctuation, title-case, restore. Mirrors the order every writer applies
/// these primitives in.
#[must_use]
pub fn normalize_full(text: &str) -> String {
    let protected = protect::protect(text);
    let balanced = balance::balance(&protected.text);
    let punctuated = punctuation::normalize_punctuation(&balanced.text);
    let titled = titlecase::titlecase(&punctuated);
    protect::restore(&titled, &protected.map)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pipeline_runs_end_to_end_without_panicking() {
        let inputs = [
            "a   messy sentence ,with bad spacing !!!",
            "visit https://example.com for v2.0 release notes",
            "(unbalanced paren and trailing quote\"",
            "",
        ];
        for input in inputs {
            let _ = normalize_full(input);
        }
    }
}
