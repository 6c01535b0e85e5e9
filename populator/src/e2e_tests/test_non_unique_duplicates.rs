//! Non-unique indexes keep every entity and collapse exact repeats.

use crate::e2e_tests::helpers::{TestPopulation, update};
use crate::key::Value;

#[test]
fn test_shared_values_keep_every_entity() {
    let mut test = TestPopulation::new(false);
    test.add(vec![update(3, "red"), update(1, "red"), update(2, "blue")])
        .unwrap();

    let summary = test.complete().unwrap();
    assert_eq!(summary.entries_written, 3);
    assert_eq!(summary.distinct_values, 2);
    assert_eq!(
        test.written(),
        vec![
            (2, vec![Value::from("blue")]),
            (1, vec![Value::from("red")]),
            (3, vec![Value::from("red")]),
        ]
    );
}

#[test]
fn test_rescanned_entities_collapse_across_parts() {
    let mut test = TestPopulation::new(false);
    for _ in 0..5 {
        let updates = (0..100).map(|id| update(id, id % 7)).collect();
        test.add(updates).unwrap();
    }

    let summary = test.complete().unwrap();
    assert_eq!(summary.entries_written, 100);
    assert_eq!(summary.distinct_values, 7);
    assert_eq!(summary.duplicates_collapsed, 400);
}

#[test]
fn test_mixed_value_types_follow_group_order() {
    let mut test = TestPopulation::new(false);
    test.add(vec![
        update(1, 10_i64),
        update(2, "text"),
        update(3, true),
        update(4, vec!["array".to_string()]),
    ])
    .unwrap();

    test.complete().unwrap();
    let ids: Vec<i64> = test.written().iter().map(|(id, _)| *id).collect();
    // text, boolean, number, then arrays
    assert_eq!(ids, vec![2, 3, 1, 4]);
}
