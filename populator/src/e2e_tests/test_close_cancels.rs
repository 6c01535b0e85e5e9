//! Closing or cancelling a population stops it and releases spilled parts.

use crate::e2e_tests::helpers::{TestPopulation, numbered, update};
use crate::error::PopulationError;
use crate::key::{GenericLayout, IndexKey, NullValue};
use crate::merge::{CANCELLATION_CHECK_INTERVAL, Cancellation, ValueMerger};
use crate::scheduler::ThreadPoolScheduler;
use crate::tree::{MemoryTree, TreeSink, TreeUpdater};

/// Tree sink that raises the cancellation flag after a number of writes.
struct CancellingSink {
    inner: MemoryTree<GenericLayout>,
    cancellation: Cancellation,
    cancel_after: usize,
}

impl TreeSink<IndexKey, NullValue> for CancellingSink {
    fn max_key_value_size(&self) -> usize {
        self.inner.max_key_value_size()
    }

    fn write(&mut self, key: &IndexKey, value: &NullValue) -> Result<(), PopulationError> {
        self.inner.write(key, value)?;
        if self.inner.len() == self.cancel_after {
            self.cancellation.cancel();
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<(), PopulationError> {
        self.inner.finish()
    }
}

impl TreeUpdater<IndexKey, NullValue> for CancellingSink {
    fn merge(
        &mut self,
        key: IndexKey,
        value: NullValue,
        merger: &dyn ValueMerger<IndexKey, NullValue>,
    ) -> Result<(), PopulationError> {
        self.inner.merge(key, value, merger)
    }

    fn remove(&mut self, key: &IndexKey) -> Result<bool, PopulationError> {
        self.inner.remove(key)
    }
}

#[test]
fn test_add_after_close_fails() {
    let mut test = TestPopulation::new(false);
    test.add(vec![update(1, 1)]).unwrap();
    test.populator.close(false);

    assert!(test.populator.is_closed());
    assert!(matches!(
        test.add(vec![update(2, 2)]),
        Err(PopulationError::IllegalState(_))
    ));
    assert!(matches!(test.complete(), Err(PopulationError::IllegalState(_))));
}

#[test]
fn test_cancel_before_merge_releases_every_part() {
    let mut test = TestPopulation::new(false);
    for chunk in numbered(0..2_000, 500).chunks(100) {
        test.add(chunk.to_vec()).unwrap();
    }
    assert!(test.spilled_files() > 3);

    test.populator.cancellation().cancel();
    let err = test.complete().unwrap_err();
    assert!(err.is_cancelled(), "{err}");
    assert!(test.tree.is_empty());
    assert_eq!(test.spilled_files(), 0);
}

#[test]
fn test_cancel_mid_stream_stops_writing() {
    let test = TestPopulation::new(false);
    for chunk in numbered(0..3_000, 3_000).chunks(100) {
        test.add(chunk.to_vec()).unwrap();
    }

    let mut sink = CancellingSink {
        inner: MemoryTree::new(test.populator.layout(), test.config.page_size),
        cancellation: test.populator.cancellation(),
        cancel_after: 10,
    };
    let err = test
        .populator
        .scan_completed(&ThreadPoolScheduler::new(2), &mut sink)
        .unwrap_err();

    assert!(err.is_cancelled(), "{err}");
    assert!(sink.inner.len() <= 10 + CANCELLATION_CHECK_INTERVAL as usize);
    assert!(!sink.inner.is_finished());
    assert_eq!(test.spilled_files(), 0);

    test.populator.close(false);
    assert!(test.populator.is_closed());
}
