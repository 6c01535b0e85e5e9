//! Indexes over more than one property.

use crate::e2e_tests::helpers::TestPopulation;
use crate::error::PopulationError;
use crate::key::Value;
use crate::populator::{IndexDescriptor, IndexUpdate};

fn person(entity_id: i64, surname: &str, age: i64) -> IndexUpdate {
    IndexUpdate::new(entity_id, vec![Value::from(surname), Value::from(age)])
}

#[test]
fn test_composite_keys_sort_by_first_property_first() {
    let mut test = TestPopulation::with(IndexDescriptor::new("people", false, 2), |c| c);
    test.add(vec![
        person(1, "smith", 40),
        person(2, "jones", 50),
        person(3, "smith", 30),
    ])
    .unwrap();

    let summary = test.complete().unwrap();
    assert_eq!(summary.distinct_values, 3);
    let ids: Vec<i64> = test.written().iter().map(|(id, _)| *id).collect();
    assert_eq!(ids, vec![2, 3, 1]);
}

#[test]
fn test_composite_conflict_names_every_value() {
    let mut test = TestPopulation::with(IndexDescriptor::new("people", true, 2), |c| c);
    test.add(vec![person(1, "smith", 30), person(2, "smith", 31)])
        .unwrap();
    test.add(vec![person(3, "smith", 30)]).unwrap();

    let err = test.complete().unwrap_err();
    assert_eq!(
        err.to_string(),
        "Both entity 1 and entity 3 share the property value (\"smith\", 30) in index people"
    );
}

#[test]
fn test_update_must_fill_every_slot() {
    let test = TestPopulation::with(IndexDescriptor::new("people", false, 2), |c| c);
    let err = test
        .add(vec![IndexUpdate::new(1, vec![Value::from("smith")])])
        .unwrap_err();
    assert!(matches!(err, PopulationError::IllegalState(_)));
}
