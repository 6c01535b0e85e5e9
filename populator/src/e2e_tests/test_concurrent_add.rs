//! Many producer threads feeding one populator.

use std::thread;

use crate::e2e_tests::helpers::{TestPopulation, update};

#[test]
fn test_concurrent_producers_lose_nothing() {
    const PRODUCERS: i64 = 8;
    const BATCHES: i64 = 50;
    const BATCH_SIZE: i64 = 10;

    let mut test = TestPopulation::new(true);
    thread::scope(|scope| {
        for producer in 0..PRODUCERS {
            let test = &test;
            scope.spawn(move || {
                for batch in 0..BATCHES {
                    let first = (producer * BATCHES + batch) * BATCH_SIZE;
                    let updates = (first..first + BATCH_SIZE)
                        .map(|id| update(id, format!("value-{id:05}")))
                        .collect();
                    test.add(updates).unwrap();
                }
            });
        }
    });

    let total = PRODUCERS * BATCHES * BATCH_SIZE;
    let summary = test.complete().unwrap();
    assert_eq!(summary.entries_written, total as u64);
    assert_eq!(summary.distinct_values, total as u64);

    let ids: Vec<i64> = test.written().iter().map(|(id, _)| *id).collect();
    assert_eq!(ids, (0..total).collect::<Vec<_>>());
}

#[test]
fn test_concurrent_failure_reaches_its_caller_only() {
    let test = TestPopulation::new(false);
    let cap = test.populator.size_cap();
    thread::scope(|scope| {
        let good = scope.spawn(|| {
            (0..100).try_for_each(|id| test.add(vec![update(id, id)]))
        });
        let bad = scope.spawn(|| test.add(vec![update(-1, "z".repeat(cap))]));
        assert!(good.join().unwrap().is_ok());
        assert!(bad.join().unwrap().is_err());
    });
}
