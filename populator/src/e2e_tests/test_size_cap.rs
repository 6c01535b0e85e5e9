//! Entries must fit the size cap derived from the tree's page size.

use crate::e2e_tests::helpers::{TestPopulation, update};
use crate::error::PopulationError;
use crate::key::{ENTITY_ID_SIZE, Value};
use crate::populator::{IndexDescriptor, IndexUpdate};

/// Text of the length whose key is exactly `key_size` bytes.
fn text_for_key_size(key_size: usize) -> String {
    // entity id, type tag and u16 length prefix
    "x".repeat(key_size - ENTITY_ID_SIZE - 3)
}

#[test]
fn test_key_of_exactly_the_cap_is_accepted() {
    let mut test = TestPopulation::new(false);
    let cap = test.populator.size_cap();
    assert_eq!(cap, 4076);

    test.add(vec![update(1, text_for_key_size(cap))]).unwrap();
    let summary = test.complete().unwrap();
    assert_eq!(summary.entries_written, 1);
}

#[test]
fn test_key_one_byte_over_the_cap_is_rejected() {
    let test = TestPopulation::new(false);
    let cap = test.populator.size_cap();

    let err = test
        .add(vec![update(77, text_for_key_size(cap + 1))])
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "Property value is too large to index, please see index documentation for limitations. Index: test_index, entity id: 77, property size: 4077."
    );
}

#[test]
fn test_rejected_batch_leaves_earlier_entries_intact() {
    let mut test = TestPopulation::new(false);
    test.add(vec![update(1, "small")]).unwrap();
    let oversized = test.add(vec![
        update(2, "fine"),
        update(3, "y".repeat(10_000)),
    ]);
    assert!(matches!(oversized, Err(PopulationError::SizeExceeded { entity_id: 3, .. })));

    test.add(vec![update(4, "after")]).unwrap();
    let summary = test.complete().unwrap();
    assert_eq!(summary.entries_written, 2);
    let ids: Vec<i64> = test.written().iter().map(|(id, _)| *id).collect();
    assert_eq!(ids, vec![4, 1]);
}

#[test]
fn test_smaller_pages_lower_the_cap() {
    let test = TestPopulation::with(IndexDescriptor::new("small_pages", false, 1), |config| {
        config.with_page_size(4096).unwrap()
    });
    assert_eq!(test.populator.size_cap(), 2028);
    assert!(test.add(vec![update(1, text_for_key_size(2028))]).is_ok());
    assert!(test.add(vec![update(2, text_for_key_size(2029))]).is_err());
}

#[test]
fn test_string_array_key_size_follows_the_formula() {
    let test = TestPopulation::new(false);
    let strings = vec!["a".to_string(), "bc".to_string(), String::new()];
    // 8 + 1 + 2 + 2 * 3 + (1 + 2 + 0)
    let expected = 20;
    let entries = vec![IndexUpdate::new(1, vec![Value::from(strings)])];

    let layout = test.populator.layout();
    let mut key = layout.new_key(1);
    key.write_value(0, entries[0].values[0].clone(), crate::key::Inclusion::Neutral)
        .unwrap();
    assert_eq!(key.size(), expected);
    test.add(entries).unwrap();
}
