//! Common helpers for end-to-end tests.

use std::path::Path;

use crate::config::PopulatorConfig;
use crate::error::PopulationError;
use crate::key::{GenericLayout, Value};
use crate::populator::{
    BlockBasedPopulator, ExternalUpdate, IndexDescriptor, IndexUpdate, PopulationSummary,
};
use crate::scheduler::{ThreadPoolScheduler, WorkScheduler};
use crate::tree::MemoryTree;

/// RAII guard owning a populator, its target tree and the spill parent
/// directory. Closes the populator and removes every spilled file on drop.
pub struct TestPopulation {
    pub populator: BlockBasedPopulator,
    pub tree: MemoryTree<GenericLayout>,
    pub config: PopulatorConfig,
    spill_parent: tempfile::TempDir,
}

impl TestPopulation {
    /// Single-property index with small blocks, so that a few hundred
    /// updates already spill several parts.
    #[must_use]
    pub fn new(unique: bool) -> Self {
        Self::with(IndexDescriptor::new("test_index", unique, 1), |config| config)
    }

    #[must_use]
    pub fn with(
        descriptor: IndexDescriptor,
        configure: impl FnOnce(PopulatorConfig) -> PopulatorConfig,
    ) -> Self {
        let spill_parent = tempfile::tempdir().unwrap();
        let config = configure(
            PopulatorConfig::default()
                .with_spill_directory(spill_parent.path())
                .with_block_size(PopulatorConfig::MIN_BLOCK_SIZE)
                .unwrap()
                .with_merge_factor(3)
                .unwrap()
                .with_workers(2)
                .unwrap(),
        );
        let populator = BlockBasedPopulator::new(descriptor, &config).unwrap();
        let tree = MemoryTree::new(populator.layout(), config.page_size);
        Self {
            populator,
            tree,
            config,
            spill_parent,
        }
    }

    pub fn add(&self, updates: Vec<IndexUpdate>) -> Result<(), PopulationError> {
        self.populator.add(updates)
    }

    pub fn external(&self, updates: Vec<ExternalUpdate>) -> Result<(), PopulationError> {
        self.populator.process_external(updates)
    }

    /// Completes the scan on a thread pool.
    pub fn complete(&mut self) -> Result<PopulationSummary, PopulationError> {
        let scheduler = ThreadPoolScheduler::new(self.config.workers);
        self.complete_with(&scheduler)
    }

    pub fn complete_with<S: WorkScheduler>(
        &mut self,
        scheduler: &S,
    ) -> Result<PopulationSummary, PopulationError> {
        self.populator.scan_completed(scheduler, &mut self.tree)
    }

    /// `(entity_id, values)` of every entry in the tree, in tree order.
    #[must_use]
    pub fn written(&self) -> Vec<(i64, Vec<Value>)> {
        self.tree
            .entries()
            .iter()
            .map(|(key, _)| (key.entity_id(), key.values().unwrap_or_default()))
            .collect()
    }

    #[must_use]
    pub fn spill_parent(&self) -> &Path {
        self.spill_parent.path()
    }

    /// Part files currently on disk.
    #[must_use]
    pub fn spilled_files(&self) -> usize {
        count_files(self.spill_parent())
    }
}

impl Drop for TestPopulation {
    fn drop(&mut self) {
        self.populator.close(self.tree.is_finished());
    }
}

fn count_files(path: &Path) -> usize {
    std::fs::read_dir(path).map_or(0, |entries| {
        entries
            .filter_map(Result::ok)
            .map(|entry| {
                let path = entry.path();
                if path.is_dir() { count_files(&path) } else { 1 }
            })
            .sum()
    })
}

/// A single-property update.
#[must_use]
pub fn update(entity_id: i64, value: impl Into<Value>) -> IndexUpdate {
    IndexUpdate::new(entity_id, vec![value.into()])
}

/// Updates for `ids`, each with the value `id % modulo`.
#[must_use]
pub fn numbered(ids: impl IntoIterator<Item = i64>, modulo: i64) -> Vec<IndexUpdate> {
    ids.into_iter().map(|id| update(id, id % modulo)).collect()
}

/// A single-property change from `before` to `after`.
#[must_use]
pub fn changed(entity_id: i64, before: impl Into<Value>, after: impl Into<Value>) -> ExternalUpdate {
    ExternalUpdate::Changed {
        entity_id,
        before: vec![before.into()],
        after: vec![after.into()],
    }
}
