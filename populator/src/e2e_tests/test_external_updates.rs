//! Writes made while the scan runs are replayed onto the tree after the
//! merged stream and take part in uniqueness checking.

use crate::e2e_tests::helpers::{TestPopulation, changed, numbered, update};
use crate::error::PopulationError;
use crate::key::Value;
use crate::populator::ExternalUpdate;

#[test]
fn test_added_removed_and_changed_reach_the_tree() {
    let mut test = TestPopulation::new(false);
    test.add(vec![update(1, "a"), update(2, "b"), update(3, "c")])
        .unwrap();
    test.external(vec![
        ExternalUpdate::Added(update(4, "d")),
        ExternalUpdate::Removed(update(2, "b")),
        changed(3, "c", "a"),
        ExternalUpdate::Removed(update(9, "never indexed")),
    ])
    .unwrap();

    let summary = test.complete().unwrap();
    assert_eq!(summary.entries_written, 3);
    assert_eq!(summary.external_updates, 4);
    assert_eq!(
        test.written(),
        vec![
            (1, vec![Value::from("a")]),
            (3, vec![Value::from("a")]),
            (4, vec![Value::from("d")]),
        ]
    );
    assert!(test.tree.is_finished());
}

#[test]
fn test_removal_resolves_a_scanned_conflict() {
    let mut test = TestPopulation::new(true);
    test.add(vec![update(1, "a"), update(2, "a")]).unwrap();
    test.external(vec![ExternalUpdate::Removed(update(2, "a"))])
        .unwrap();

    test.complete().unwrap();
    assert_eq!(test.written(), vec![(1, vec![Value::from("a")])]);
}

#[test]
fn test_removing_the_written_holder_keeps_the_other() {
    let mut test = TestPopulation::new(true);
    test.add(vec![update(1, "a"), update(2, "a")]).unwrap();
    test.external(vec![ExternalUpdate::Removed(update(1, "a"))])
        .unwrap();

    test.complete().unwrap();
    assert_eq!(test.written(), vec![(2, vec![Value::from("a")])]);
}

#[test]
fn test_added_value_colliding_with_the_scan_is_a_conflict() {
    let mut test = TestPopulation::new(true);
    test.add(vec![update(1, "a"), update(3, "b")]).unwrap();
    test.external(vec![ExternalUpdate::Added(update(2, "a"))])
        .unwrap();

    let err = test.complete().unwrap_err();
    assert_eq!(
        err.to_string(),
        "Both entity 1 and entity 2 share the property value \"a\" in index test_index"
    );
    assert!(!test.tree.is_finished());
}

#[test]
fn test_change_onto_a_taken_value_is_a_conflict() {
    let mut test = TestPopulation::new(true);
    test.add(vec![update(1, "a"), update(2, "b")]).unwrap();
    test.external(vec![changed(2, "b", "a")]).unwrap();

    assert!(matches!(
        test.complete(),
        Err(PopulationError::ConflictDetected {
            existing_entity_id: 1,
            added_entity_id: 2,
            ..
        })
    ));
}

#[test]
fn test_swapping_values_through_changes_is_not_a_conflict() {
    let mut test = TestPopulation::new(true);
    test.add(vec![update(1, "a"), update(2, "b")]).unwrap();
    // Entity 1 takes "b" before entity 2 has moved away from it.
    test.external(vec![changed(1, "a", "b"), changed(2, "b", "c")])
        .unwrap();

    let summary = test.complete().unwrap();
    assert_eq!(summary.external_updates, 2);
    assert_eq!(
        test.written(),
        vec![(1, vec![Value::from("b")]), (2, vec![Value::from("c")])]
    );
}

#[test]
fn test_external_updates_are_refused_after_scan_completed() {
    let mut test = TestPopulation::new(false);
    test.add(vec![update(1, 1)]).unwrap();
    test.complete().unwrap();

    assert!(matches!(
        test.external(vec![ExternalUpdate::Added(update(2, 2))]),
        Err(PopulationError::IllegalState(_))
    ));
}

#[test]
fn test_oversized_external_update_rejects_the_whole_call() {
    let mut test = TestPopulation::new(false);
    let err = test
        .external(vec![
            ExternalUpdate::Added(update(1, "fits")),
            changed(2, "old", "z".repeat(10_000)),
        ])
        .unwrap_err();
    assert!(matches!(err, PopulationError::SizeExceeded { entity_id: 2, .. }), "{err}");

    let summary = test.complete().unwrap();
    assert_eq!(summary.external_updates, 0);
    assert!(test.tree.is_empty());
}

#[test]
fn test_logged_updates_spill_and_are_cleaned_up() {
    let mut test = TestPopulation::new(false);
    test.add(numbered(0..50, 1_000)).unwrap();
    for chunk in numbered(1_000..1_300, 10_000).chunks(30) {
        let added = chunk.iter().cloned().map(ExternalUpdate::Added).collect();
        test.external(added).unwrap();
    }
    assert!(test.spilled_files() > 2);

    let summary = test.complete().unwrap();
    assert_eq!(summary.entries_written, 50);
    assert_eq!(summary.external_updates, 300);
    assert_eq!(test.tree.len(), 350);
    assert_eq!(test.spilled_files(), 0);
}
