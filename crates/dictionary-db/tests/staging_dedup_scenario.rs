//! Concrete scenario: two entries sharing `(sourceCode, word, definition)`
//! but distinct sense numbers survive within-batch dedup as two rows; a
//! true duplicate of one of them is collapsed.

use dictionary_db::models::RawEntry;
use dictionary_db::staging::sanitize_and_dedupe;

fn entry(sense_number: i64) -> RawEntry {
    RawEntry {
        word: "cat".to_string(),
        normalized_word: "cat".to_string(),
        part_of_speech: None,
        definition: "a small feline".to_string(),
        etymology: None,
        sense_number: Some(sense_number),
        raw_fragment: None,
        source_code: "WEB".to_string(),
        created_utc: 0,
    }
}

#[test]
fn distinct_sense_numbers_both_survive_dedup() {
    let entries = vec![entry(1), entry(2)];
    let (rows, report) = sanitize_and_dedupe(&entries);

    assert_eq!(rows.len(), 2);
    assert_eq!(report.sanitized, 2);
    assert_eq!(report.deduplicated_within_batch, 0);

    let mut senses: Vec<i64> = rows.iter().map(|r| r.sense_number.unwrap()).collect();
    senses.sort_unstable();
    assert_eq!(senses, vec![1, 2]);
}

#[test]
fn repeated_entry_with_same_sense_is_collapsed() {
    let entries = vec![entry(1), entry(1)];
    let (rows, report) = sanitize_and_dedupe(&entries);

    assert_eq!(rows.len(), 1);
    assert_eq!(report.deduplicated_within_batch, 1);
}
