//! Concrete scenarios from the normalization pipeline's testable properties:
//! protected-token round trip and bracket-balancer trivial fixes.

use dictionary_text::{balance, protect, restore};

#[test]
fn protected_token_round_trip_preserves_four_placeholders() {
    let input = "Use .NET Core 6.0 and e.g. X.Y";
    let protected = protect(input);

    assert_eq!(protected.map.len(), 4);

    let mut values: Vec<&String> = protected.map.values().collect();
    values.sort();
    let mut expected = vec![".NET Core", "6.0", "e.g.", "X.Y"];
    expected.sort_unstable();
    assert_eq!(values, expected.iter().collect::<Vec<_>>());

    assert_eq!(restore(&protected.text, &protected.map), input);
}

#[test]
fn balancer_inserts_missing_closing_paren() {
    let result = balance("foo (bar");
    assert!(result.changed);
    assert_eq!(result.text, "foo (bar)");
}

#[test]
fn balancer_drops_unmatched_closing_paren() {
    let result = balance("foo)");
    assert!(result.changed);
    assert_eq!(result.text, "foo");
}

#[test]
fn balancer_leaves_ambiguous_double_imbalance_untouched() {
    let result = balance("foo (bar (baz");
    assert!(!result.changed);
    assert_eq!(result.text, "foo (bar (baz");
}
