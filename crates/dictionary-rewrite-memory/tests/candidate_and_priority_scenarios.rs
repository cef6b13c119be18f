//! Concrete scenarios: confidence-bucket mapping at the mining gate, and
//! priority derivation at promotion time.

use dictionary_rewrite_memory::{candidate_gate, compute_priority, score_to_confidence};

#[test]
fn score_just_above_1_6_threshold_yields_0_80_confidence_and_clears_gate() {
    let from_text = "the car which is red";
    let to_text = "the red car";
    assert!(candidate_gate("Definition", from_text, to_text));

    let confidence = score_to_confidence(1.65);
    assert!((confidence - 0.80).abs() < f64::EPSILON);
    assert!(confidence >= 0.80);
}

#[test]
fn score_just_below_1_2_threshold_yields_0_60_confidence_and_is_dropped_at_min_0_80() {
    let confidence = score_to_confidence(1.18);
    assert!((confidence - 0.60).abs() < f64::EPSILON);
    assert!(confidence < 0.80);
}

#[test]
fn promotion_priority_subtracts_both_tier_boosts() {
    assert_eq!(compute_priority(12, 0.82), 500 - 20 - 20);
}

#[test]
fn promotion_priority_applies_no_boosts_below_every_tier() {
    assert_eq!(compute_priority(1, 0.50), 500);
}
