//! Concrete scenario: a non-English synonym is classified for side-store
//! routing rather than stored verbatim in the canonical column.
//!
//! The side-store write itself (assigning a row id) goes through a live
//! connection pool and is exercised by `nonenglish.rs`'s own unit tests;
//! this checks the pure classification and normalization steps that decide
//! *whether* a child row gets routed there.

use dictionary_db::writers::{normalize_child_text, ChildKind};
use dictionary_text::lang::contains_non_english;

#[test]
fn non_english_synonym_text_is_flagged_for_side_store_routing() {
    let raw = "友情";
    let normalized = normalize_child_text(ChildKind::Synonym, raw);

    assert_eq!(normalized, raw, "normalization must not alter non-English text before routing");
    assert!(contains_non_english(&normalized), "this text must be routed to the non-English side-store");
}

#[test]
fn plain_english_synonym_is_not_flagged() {
    let normalized = normalize_child_text(ChildKind::Synonym, "Friendship");
    assert_eq!(normalized, "friendship");
    assert!(!contains_non_english(&normalized));
}
