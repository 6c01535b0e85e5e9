//! Merging on the tokio-backed scheduler gives the same result as threads.

use crate::e2e_tests::helpers::{TestPopulation, numbered};
use crate::scheduler::TokioScheduler;

fn populate() -> TestPopulation {
    let test = TestPopulation::new(false);
    for chunk in numbered((0..2_000).rev(), 250).chunks(40) {
        test.add(chunk.to_vec()).unwrap();
    }
    test
}

#[test]
fn test_tokio_scheduler_matches_thread_pool() {
    let mut on_tokio = populate();
    let tokio_summary = on_tokio
        .complete_with(&TokioScheduler::new(3).unwrap())
        .unwrap();

    let mut on_threads = populate();
    let thread_summary = on_threads.complete().unwrap();

    assert_eq!(tokio_summary, thread_summary);
    assert!(tokio_summary.merge_levels >= 1);
    assert_eq!(on_tokio.written(), on_threads.written());
}
