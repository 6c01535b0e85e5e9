//! Uniqueness violations surface only after the merged stream was written.

use crate::e2e_tests::helpers::{TestPopulation, numbered, update};
use crate::error::PopulationError;
use crate::key::Value;

#[test]
fn test_shared_value_is_reported_with_both_entities() {
    let mut test = TestPopulation::new(true);
    test.add(vec![update(1, "alice"), update(2, "alice"), update(3, "bob")])
        .unwrap();

    let err = test.complete().unwrap_err();
    assert_eq!(
        err.to_string(),
        "Both entity 1 and entity 2 share the property value \"alice\" in index test_index"
    );
    // Every surviving value was handed over before the check failed.
    assert_eq!(test.tree.len(), 2);
    assert!(!test.tree.is_finished());
}

#[test]
fn test_same_entity_scanned_twice_is_not_a_conflict() {
    let mut test = TestPopulation::new(true);
    test.add(vec![update(5, "carol"), update(6, "dave")]).unwrap();
    test.add(vec![update(5, "carol")]).unwrap();

    let summary = test.complete().unwrap();
    assert_eq!(summary.entries_written, 2);
    assert_eq!(summary.duplicates_collapsed, 1);
    assert_eq!(
        test.written(),
        vec![
            (5, vec![Value::from("carol")]),
            (6, vec![Value::from("dave")]),
        ]
    );
}

#[test]
fn test_collisions_across_parts_are_detected() {
    let mut test = TestPopulation::new(true);
    // Values repeat every 300 ids, so ids n and n + 300 collide and land in
    // different blocks.
    for chunk in numbered(0..400, 300).chunks(25) {
        test.add(chunk.to_vec()).unwrap();
    }

    let err = test.complete().unwrap_err();
    let PopulationError::ConflictDetected {
        existing_entity_id,
        added_entity_id,
        values,
        ..
    } = err
    else {
        panic!("expected a conflict, got {err}");
    };
    assert_eq!((existing_entity_id - added_entity_id).abs(), 300);
    assert_eq!(values, vec![Value::from(existing_entity_id.min(added_entity_id))]);
    assert_eq!(test.tree.len(), 300);
}

#[test]
fn test_three_way_collision_reports_the_last_pair() {
    let mut test = TestPopulation::new(true);
    test.add(vec![update(10, 1), update(20, 1), update(30, 1)])
        .unwrap();

    let err = test.complete().unwrap_err();
    let PopulationError::ConflictDetected {
        existing_entity_id,
        added_entity_id,
        values,
        ..
    } = err
    else {
        panic!("expected a conflict, got {err}");
    };
    assert_eq!((existing_entity_id, added_entity_id), (20, 30));
    assert_eq!(values, vec![Value::from(1_i64)]);
}

#[test]
fn test_three_way_collision_across_parts_reports_the_last_pair() {
    let mut test = TestPopulation::new(true);
    for id in [10, 20, 30] {
        test.add(vec![update(id, "shared")]).unwrap();
        // Padding spills the three colliding keys into different parts.
        test.add(numbered(id * 100..id * 100 + 60, i64::MAX)).unwrap();
    }

    let err = test.complete().unwrap_err();
    assert!(
        matches!(
            err,
            PopulationError::ConflictDetected {
                existing_entity_id: 20,
                added_entity_id: 30,
                ..
            }
        ),
        "{err}"
    );
}

#[test]
fn test_equal_numbers_of_different_widths_collide() {
    let mut test = TestPopulation::new(true);
    test.add(vec![update(1, 5_i32), update(2, 5_i64), update(3, 5.5)])
        .unwrap();

    let err = test.complete().unwrap_err();
    assert!(matches!(err, PopulationError::ConflictDetected { .. }), "{err}");
}
