//! Populations large enough to need several merge levels.

use crate::e2e_tests::helpers::{TestPopulation, numbered};
use crate::key::{IndexKey, Value};
use crate::config::PopulatorConfig;
use crate::populator::{BlockBasedPopulator, IndexDescriptor};

#[test]
fn test_many_blocks_merge_into_one_sorted_stream() {
    let mut test = TestPopulation::new(false);
    let mut ids: Vec<i64> = (0..3_000).collect();
    // Deterministic shuffle.
    ids.sort_by_key(|id| (id * 7_919) % 3_001);
    for chunk in numbered(ids, 1_000).chunks(64) {
        test.add(chunk.to_vec()).unwrap();
    }
    assert!(test.spilled_files() > 3);

    let summary = test.complete().unwrap();
    assert_eq!(summary.entries_written, 3_000);
    assert_eq!(summary.distinct_values, 1_000);
    assert!(summary.parts_spilled > 9);
    assert!(summary.merge_levels >= 2);
    assert_eq!(summary.duplicates_collapsed, 0);

    let written = test.written();
    assert!(written.windows(2).all(|w| (&w[0].1, w[0].0) < (&w[1].1, w[1].0)));
    assert_eq!(written[0], (0, vec![Value::from(0_i64)]));
    assert_eq!(written[1], (1_000, vec![Value::from(0_i64)]));
    assert_eq!(test.spilled_files(), 0);
}

#[test]
fn test_wide_merge_factor_skips_intermediate_levels() {
    let mut test = TestPopulation::with(IndexDescriptor::new("wide", false, 1), |config| {
        config.with_merge_factor(64).unwrap()
    });
    for chunk in numbered(0..1_000, 97).chunks(50) {
        test.add(chunk.to_vec()).unwrap();
    }
    let summary = test.complete().unwrap();
    assert_eq!(summary.merge_levels, 0);
    assert_eq!(summary.merge_jobs, 0);
    assert_eq!(summary.entries_written, 1_000);
    let keys: Vec<&IndexKey> = test.tree.entries().iter().map(|(k, _)| k).collect();
    assert!(keys.windows(2).all(|w| w[0].compare(w[1]).is_lt()));
}

#[test]
fn test_spill_directory_is_removed_with_the_populator() {
    let parent = tempfile::tempdir().unwrap();
    let config = PopulatorConfig::default()
        .with_spill_directory(parent.path())
        .with_block_size(PopulatorConfig::MIN_BLOCK_SIZE)
        .unwrap();
    let populator =
        BlockBasedPopulator::new(IndexDescriptor::new("dropped", false, 1), &config).unwrap();
    populator.add(numbered(0..500, 10)).unwrap();
    assert_eq!(std::fs::read_dir(parent.path()).unwrap().count(), 1);

    populator.close(false);
    drop(populator);
    assert_eq!(std::fs::read_dir(parent.path()).unwrap().count(), 0);
}
