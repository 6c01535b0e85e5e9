//! Block-based population of one property index.
//!
//! Producer threads call [`BlockBasedPopulator::add`] with batches of updates
//! taken from a store scan. The updates become index keys, pass the size cap
//! and are buffered into sorted blocks behind a [`WorkSync`] gate. Writes the
//! store accepts while the scan runs arrive through
//! [`BlockBasedPopulator::process_external`] and are logged in arrival order.
//! Once the scan is over, [`BlockBasedPopulator::scan_completed`] merges every
//! block into one sorted stream, writes it to the tree, replays the logged
//! updates on top and only then fails if the index is unique and two entities
//! still share a value.
//!
//! # Lifecycle
//!
//! ```text
//! Populating --scan_completed--> Merging --> Completed
//!      |                            |
//!      +----------close-------------+--> Closed
//! ```

use std::cmp::Ordering;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::block::{BlockStorage, PartCursor, SpillDirectory, UpdateLayout, UpdateStep};
use crate::config::PopulatorConfig;
use crate::conflict::ConflictDetectingValueMerger;
use crate::error::PopulationError;
use crate::key::{GenericLayout, Inclusion, IndexKey, Layout, NullValue, Value};
use crate::merge::{
    CANCELLATION_CHECK_INTERVAL, Cancellation, MergingCursor, PartMerger, ValueMerger, aborted,
};
use crate::scheduler::WorkScheduler;
use crate::tree::TreeUpdater;
use crate::work_sync::{Work, WorkSync};

/// The index being populated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexDescriptor {
    pub name: String,
    pub unique: bool,
    /// Number of properties in the key. Composite indexes have more than one.
    pub slots: usize,
}

impl IndexDescriptor {
    #[must_use]
    pub fn new(name: impl Into<String>, unique: bool, slots: usize) -> Self {
        Self {
            name: name.into(),
            unique,
            slots,
        }
    }
}

/// The property values one entity contributes to the index.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexUpdate {
    pub entity_id: i64,
    /// One value per slot, in slot order.
    pub values: Vec<Value>,
}

impl IndexUpdate {
    #[must_use]
    pub const fn new(entity_id: i64, values: Vec<Value>) -> Self {
        Self { entity_id, values }
    }
}

/// A write to the indexed data made while the scan is running.
#[derive(Debug, Clone, PartialEq)]
pub enum ExternalUpdate {
    Added(IndexUpdate),
    Changed {
        entity_id: i64,
        before: Vec<Value>,
        after: Vec<Value>,
    },
    Removed(IndexUpdate),
}

/// Outcome of a successful population.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PopulationSummary {
    /// Entries handed to the tree.
    pub entries_written: u64,
    /// Distinct property values among the written entries.
    pub distinct_values: u64,
    pub parts_spilled: usize,
    pub merge_levels: usize,
    pub merge_jobs: usize,
    /// Entries dropped because an equal key was already written.
    pub duplicates_collapsed: u64,
    /// Updates replayed after the merged stream. A change counts once.
    pub external_updates: u64,
}

/// Keys gathered from concurrent `add` calls, buffered together.
struct Batch {
    keys: Vec<IndexKey>,
}

impl Work<BlockStorage<GenericLayout>> for Batch {
    fn combine(&mut self, other: Self) {
        self.keys.extend(other.keys);
    }

    fn apply(self, storage: &mut BlockStorage<GenericLayout>) -> Result<(), PopulationError> {
        for key in self.keys {
            storage.add(key, NullValue)?;
        }
        Ok(())
    }
}

type UpdateLog = BlockStorage<UpdateLayout<GenericLayout>>;

/// Logged update steps gathered from concurrent `process_external` calls.
struct UpdateBatch {
    steps: Vec<(IndexKey, UpdateStep)>,
}

impl Work<UpdateLog> for UpdateBatch {
    fn combine(&mut self, other: Self) {
        self.steps.extend(other.steps);
    }

    fn apply(self, log: &mut UpdateLog) -> Result<(), PopulationError> {
        for (key, step) in self.steps {
            log.add(key, step)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Populating,
    Merging,
    Completed,
    Closed,
}

#[derive(Default)]
struct Drained {
    written: u64,
    distinct: u64,
    duplicates: u64,
}

/// Populates one index through external sort-merge.
///
/// # Invariants
/// - every key buffered has passed the size cap
/// - entries reach the sink in strictly ascending key order
/// - logged updates are replayed in arrival order, after the whole stream
/// - conflicts are raised only after the stream and the logged updates were
///   written
pub struct BlockBasedPopulator {
    descriptor: IndexDescriptor,
    layout: Arc<GenericLayout>,
    spill: Arc<SpillDirectory>,
    storage: WorkSync<BlockStorage<GenericLayout>, Batch>,
    external: WorkSync<UpdateLog, UpdateBatch>,
    merge_factor: usize,
    size_cap: usize,
    cancellation: Cancellation,
    phase: Mutex<Phase>,
    merging: Mutex<()>,
}

impl BlockBasedPopulator {
    /// Creates a populator spilling into a fresh directory under
    /// `config.spill_directory`.
    pub fn new(
        descriptor: IndexDescriptor,
        config: &PopulatorConfig,
    ) -> Result<Self, PopulationError> {
        if descriptor.slots == 0 {
            return Err(PopulationError::IllegalState("index must have at least one slot"));
        }
        let layout = Arc::new(GenericLayout::new(descriptor.slots, descriptor.unique));
        let spill = SpillDirectory::create(&config.spill_directory)?;
        let storage = BlockStorage::new(Arc::clone(&layout), Arc::clone(&spill), config.block_size);
        let external = BlockStorage::in_arrival_order(
            Arc::new(UpdateLayout::new(GenericLayout::clone(&layout))),
            Arc::clone(&spill),
            config.block_size,
        );
        tracing::info!(
            index = %descriptor.name,
            unique = descriptor.unique,
            slots = descriptor.slots,
            spill = %spill.path().display(),
            "Population started"
        );
        Ok(Self {
            descriptor,
            layout,
            spill,
            storage: WorkSync::new(storage),
            external: WorkSync::new(external),
            merge_factor: config.merge_factor,
            size_cap: config.key_value_size_cap(),
            cancellation: Cancellation::new(),
            phase: Mutex::new(Phase::Populating),
            merging: Mutex::new(()),
        })
    }

    #[must_use]
    pub const fn descriptor(&self) -> &IndexDescriptor {
        &self.descriptor
    }

    #[must_use]
    pub fn layout(&self) -> Arc<GenericLayout> {
        Arc::clone(&self.layout)
    }

    /// Largest key plus value this populator accepts.
    #[must_use]
    pub const fn size_cap(&self) -> usize {
        self.size_cap
    }

    /// The flag `close` raises. Callers may also cancel through it directly.
    #[must_use]
    pub fn cancellation(&self) -> Cancellation {
        self.cancellation.clone()
    }

    fn phase(&self) -> MutexGuard<'_, Phase> {
        self.phase.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Buffers `updates`. Safe to call from many threads at once.
    ///
    /// The whole call fails and nothing is buffered when any update is too
    /// large to index.
    pub fn add(&self, updates: Vec<IndexUpdate>) -> Result<(), PopulationError> {
        if *self.phase() != Phase::Populating {
            return Err(PopulationError::IllegalState("population no longer accepts updates"));
        }
        if updates.is_empty() {
            return Ok(());
        }
        let keys = updates
            .into_iter()
            .map(|update| self.build_key(update))
            .collect::<Result<Vec<_>, _>>()?;
        self.storage.apply(Batch { keys })
    }

    fn build_key(&self, update: IndexUpdate) -> Result<IndexKey, PopulationError> {
        let key = self.key_for(update.entity_id, update.values)?;
        let size = self.layout.key_size(&key) + self.layout.value_size(&NullValue);
        if size > self.size_cap {
            return Err(PopulationError::SizeExceeded {
                index: self.descriptor.name.clone(),
                entity_id: update.entity_id,
                size,
                cap: self.size_cap,
            });
        }
        Ok(key)
    }

    fn key_for(&self, entity_id: i64, values: Vec<Value>) -> Result<IndexKey, PopulationError> {
        if values.len() != self.descriptor.slots {
            return Err(PopulationError::IllegalState(
                "update value count does not match the index slots",
            ));
        }
        let mut key = self.layout.new_key(entity_id);
        for (slot, value) in values.into_iter().enumerate() {
            key.write_value(slot, value, Inclusion::Neutral)?;
        }
        Ok(key)
    }

    /// Logs writes made to the store while the scan runs. They are applied
    /// to the tree after the merged stream, in the order they were logged.
    /// Safe to call from many threads at once.
    ///
    /// Added and changed values pass the size cap. Removals are not checked,
    /// so removing a value that was never indexable is harmless. The whole
    /// call fails and nothing is logged when any update is rejected.
    pub fn process_external(&self, updates: Vec<ExternalUpdate>) -> Result<(), PopulationError> {
        if *self.phase() != Phase::Populating {
            return Err(PopulationError::IllegalState(
                "scan completed, write to the tree directly",
            ));
        }
        if updates.is_empty() {
            return Ok(());
        }
        let mut steps = Vec::with_capacity(updates.len());
        for update in updates {
            match update {
                ExternalUpdate::Added(update) => {
                    steps.push((self.build_key(update)?, UpdateStep::Add));
                }
                ExternalUpdate::Removed(update) => {
                    let removed = self.key_for(update.entity_id, update.values)?;
                    steps.push((removed, UpdateStep::Remove));
                }
                ExternalUpdate::Changed {
                    entity_id,
                    before,
                    after,
                } => {
                    let added = self.build_key(IndexUpdate::new(entity_id, after))?;
                    steps.push((self.key_for(entity_id, before)?, UpdateStep::ChangeFrom));
                    steps.push((added, UpdateStep::ChangeTo));
                }
            }
        }
        self.external.apply(UpdateBatch { steps })
    }

    /// Merges everything added so far and writes it into `sink`.
    ///
    /// # Errors
    ///
    /// - `ConflictDetected` for a unique index whose values are still shared,
    ///   after the stream and the logged updates were written but before the
    ///   sink is finished
    /// - `Cancelled` when `close` or the cancellation flag interrupted it
    /// - `MergeAborted` when reading or merging parts failed
    pub fn scan_completed<S, T>(
        &self,
        scheduler: &S,
        sink: &mut T,
    ) -> Result<PopulationSummary, PopulationError>
    where
        S: WorkScheduler,
        T: TreeUpdater<IndexKey, NullValue>,
    {
        let merging = self.merging.lock().unwrap_or_else(PoisonError::into_inner);
        {
            let mut phase = self.phase();
            if *phase != Phase::Populating {
                return Err(PopulationError::IllegalState("scan already completed or closed"));
            }
            *phase = Phase::Merging;
        }
        let result = self.merge_into(scheduler, sink);
        {
            let mut phase = self.phase();
            if *phase == Phase::Merging {
                *phase = Phase::Completed;
            }
        }
        drop(merging);
        result
    }

    fn merge_into<S, T>(&self, scheduler: &S, sink: &mut T) -> Result<PopulationSummary, PopulationError>
    where
        S: WorkScheduler,
        T: TreeUpdater<IndexKey, NullValue>,
    {
        if sink.max_key_value_size() < self.size_cap {
            return Err(PopulationError::IllegalState(
                "tree cannot store entries as large as the populator accepts",
            ));
        }
        let parts = self.storage.with_material(BlockStorage::done_adding)?;
        let logged = self.external.with_material(BlockStorage::done_adding)?;
        let parts_spilled = parts.len();

        let detector = Arc::new(ConflictDetectingValueMerger::new(
            self.descriptor.name.clone(),
            self.descriptor.unique,
        ));
        let merger: Arc<dyn ValueMerger<IndexKey, NullValue>> = detector.clone();
        let part_merger = PartMerger::new(
            Arc::clone(&self.layout),
            merger,
            Arc::clone(&self.spill),
            self.merge_factor,
            self.cancellation.clone(),
        )?;
        let (mut cursor, stats) = part_merger.merge(parts, scheduler)?;
        let drained = self.drain(&mut cursor, sink);
        let collapsed = cursor.collapsed();
        cursor.close();
        let drained = drained?;

        let mut external_updates = 0;
        for part in logged {
            let mut updates = part.open()?;
            let applied = self.apply_logged(updates.as_mut(), &detector, sink);
            updates.close();
            external_updates += applied?;
        }

        let mut conflicts = detector.finalize().into_iter();
        if let Some(first) = conflicts.next() {
            for extra in conflicts {
                tracing::warn!(index = %self.descriptor.name, error = %extra, "Additional uniqueness conflict");
            }
            return Err(first);
        }
        sink.finish()?;

        let summary = PopulationSummary {
            entries_written: drained.written,
            distinct_values: drained.distinct,
            parts_spilled,
            merge_levels: stats.levels,
            merge_jobs: stats.jobs,
            duplicates_collapsed: drained.duplicates + collapsed,
            external_updates,
        };
        tracing::info!(
            index = %self.descriptor.name,
            entries = summary.entries_written,
            distinct = summary.distinct_values,
            parts = summary.parts_spilled,
            levels = summary.merge_levels,
            duplicates = summary.duplicates_collapsed,
            external = summary.external_updates,
            "Population completed"
        );
        Ok(summary)
    }

    /// Writes the merged stream, keeping the first of each run of equal keys.
    fn drain<T>(
        &self,
        cursor: &mut MergingCursor<GenericLayout>,
        sink: &mut T,
    ) -> Result<Drained, PopulationError>
    where
        T: TreeUpdater<IndexKey, NullValue>,
    {
        let mut drained = Drained::default();
        let mut last: Option<IndexKey> = None;
        while cursor
            .next()
            .map_err(|e| aborted("reading the merged stream".to_string(), e))?
        {
            let Some((key, value)) = cursor.take() else {
                break;
            };
            match &last {
                Some(previous) if self.layout.compare(previous, &key) == Ordering::Equal => {
                    drained.duplicates += 1;
                    continue;
                }
                Some(previous) if previous.compare_values(&key) == Ordering::Equal => {}
                _ => drained.distinct += 1,
            }
            sink.write(&key, &value)?;
            drained.written += 1;
            last = Some(key);
        }
        Ok(drained)
    }

    /// Replays one logged part onto the tree. Returns the updates applied.
    ///
    /// Additions go through the conflict detector like merged entries do.
    /// A removal releases its entity from the detector, and when it deletes
    /// the entry standing for a still shared value, the next holder takes
    /// its place in the tree.
    fn apply_logged<C, T>(
        &self,
        updates: &mut C,
        detector: &ConflictDetectingValueMerger,
        sink: &mut T,
    ) -> Result<u64, PopulationError>
    where
        C: PartCursor<IndexKey, UpdateStep> + ?Sized,
        T: TreeUpdater<IndexKey, NullValue>,
    {
        let mut applied = 0;
        let mut steps: u64 = 0;
        while updates.next()? {
            if steps % CANCELLATION_CHECK_INTERVAL == 0 {
                self.cancellation.check()?;
            }
            steps += 1;
            let Some((key, step)) = updates.take() else {
                break;
            };
            if step.removes() {
                self.remove_logged(&key, detector, sink)?;
            } else {
                sink.merge(key, NullValue, detector)?;
            }
            if step.completes_update() {
                applied += 1;
            }
        }
        Ok(applied)
    }

    fn remove_logged<T>(
        &self,
        key: &IndexKey,
        detector: &ConflictDetectingValueMerger,
        sink: &mut T,
    ) -> Result<(), PopulationError>
    where
        T: TreeUpdater<IndexKey, NullValue>,
    {
        let removed = sink.remove(key)?;
        let Some(values) = key.values() else {
            return Ok(());
        };
        let Some(holder) = detector.release(&values, key.entity_id()) else {
            return Ok(());
        };
        if removed {
            let replacement = self.key_for(holder, values)?;
            sink.merge(replacement, NullValue, detector)?;
        }
        Ok(())
    }

    /// Ends the population. Cancels a running merge, waits for it to stop
    /// and deletes everything spilled or logged that was not consumed.
    pub fn close(&self, successful: bool) {
        self.cancellation.cancel();
        let merging = self.merging.lock().unwrap_or_else(PoisonError::into_inner);
        *self.phase() = Phase::Closed;
        self.storage.with_material(BlockStorage::release);
        self.external.with_material(BlockStorage::release);
        drop(merging);
        tracing::info!(index = %self.descriptor.name, successful, "Population closed");
    }

    /// Whether `close` has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        *self.phase() == Phase::Closed
    }
}
