//! Level-synchronous reduction of many sorted parts.
//!
//! While more than `merge_factor` parts remain, the parts are cut into
//! consecutive groups of at most `merge_factor` and each group is merged into
//! one new spilled part by a scheduler job. A level starts only after every
//! job of the previous level has finished. The last `merge_factor` (or fewer)
//! parts are not spilled again: they are merged lazily by the returned cursor.
//!
//! Groups are consecutive and ties prefer the lower source, so the final
//! stream is a stable sort of the input parts taken in order.

use std::sync::Arc;

use crate::block::{BoxCursor, Part, PartCursor, PartWriter, SpillDirectory};
use crate::error::PopulationError;
use crate::key::Layout;
use crate::merge::{Cancellation, MergingCursor, ValueMerger};
use crate::scheduler::{Job, WorkScheduler};

/// What a merge did before returning its final cursor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    /// Parts handed to the merge.
    pub input_parts: usize,
    /// Intermediate levels that spilled merged parts.
    pub levels: usize,
    /// Merge jobs submitted across all levels.
    pub jobs: usize,
}

/// Merges sorted parts with bounded parallelism.
pub struct PartMerger<L: Layout> {
    layout: Arc<L>,
    merger: Arc<dyn ValueMerger<L::Key, L::Value>>,
    spill: Arc<SpillDirectory>,
    merge_factor: usize,
    cancellation: Cancellation,
}

impl<L: Layout> PartMerger<L> {
    /// # Pre-conditions
    /// - `merge_factor >= 2`
    pub fn new(
        layout: Arc<L>,
        merger: Arc<dyn ValueMerger<L::Key, L::Value>>,
        spill: Arc<SpillDirectory>,
        merge_factor: usize,
        cancellation: Cancellation,
    ) -> Result<Self, PopulationError> {
        if merge_factor < 2 {
            return Err(PopulationError::IllegalState("merge factor must be at least 2"));
        }
        Ok(Self {
            layout,
            merger,
            spill,
            merge_factor,
            cancellation,
        })
    }

    /// Reduces `parts` to a single sorted cursor.
    ///
    /// Zero parts give an exhausted cursor and a single part is read as it is,
    /// in both cases without submitting any job.
    ///
    /// # Post-conditions
    /// - on error no merged output survives and every opened cursor is closed
    pub fn merge<S: WorkScheduler>(
        &self,
        parts: Vec<Part<L::Key, L::Value>>,
        scheduler: &S,
    ) -> Result<(MergingCursor<L>, MergeStats), PopulationError> {
        let mut stats = MergeStats {
            input_parts: parts.len(),
            ..MergeStats::default()
        };
        let mut parts = parts;

        while parts.len() > self.merge_factor {
            self.cancellation.check()?;
            stats.levels += 1;
            let level = stats.levels;
            let jobs = self.level_jobs(parts);
            stats.jobs += jobs.len();
            tracing::debug!(level, jobs = jobs.len(), "Merging level");

            parts = scheduler
                .run_all(&format!("merge-level-{level}"), jobs)
                .map_err(|e| aborted(format!("merge level {level} failed"), e))?;
        }

        self.cancellation.check()?;
        let cursors = open_all(parts).map_err(|e| aborted("opening final parts".to_string(), e))?;
        tracing::debug!(parts = cursors.len(), levels = stats.levels, "Final merge ready");
        let cursor = MergingCursor::new(
            Arc::clone(&self.layout),
            Arc::clone(&self.merger),
            self.cancellation.clone(),
            cursors,
        );
        Ok((cursor, stats))
    }

    fn level_jobs(&self, parts: Vec<Part<L::Key, L::Value>>) -> Vec<Job<Part<L::Key, L::Value>>> {
        let mut jobs: Vec<Job<Part<L::Key, L::Value>>> = Vec::new();
        let mut remaining = parts.into_iter();
        loop {
            let group: Vec<_> = remaining.by_ref().take(self.merge_factor).collect();
            if group.is_empty() {
                break;
            }
            let layout = Arc::clone(&self.layout);
            let merger = Arc::clone(&self.merger);
            let spill = Arc::clone(&self.spill);
            let cancellation = self.cancellation.clone();
            jobs.push(Box::new(move || {
                merge_group(layout, merger, &spill, cancellation, group)
            }));
        }
        jobs
    }
}

pub(crate) fn aborted(reason: String, source: PopulationError) -> PopulationError {
    if source.is_cancelled() {
        PopulationError::Cancelled
    } else {
        PopulationError::MergeAborted {
            reason,
            source: Box::new(source),
        }
    }
}

fn open_all<K, V>(parts: Vec<Part<K, V>>) -> Result<Vec<BoxCursor<K, V>>, PopulationError> {
    parts.into_iter().map(|part| part.open()).collect()
}

/// Merges one group into a new spilled part. A single-part group is passed
/// through untouched.
fn merge_group<L: Layout>(
    layout: Arc<L>,
    merger: Arc<dyn ValueMerger<L::Key, L::Value>>,
    spill: &Arc<SpillDirectory>,
    cancellation: Cancellation,
    mut group: Vec<Part<L::Key, L::Value>>,
) -> Result<Part<L::Key, L::Value>, PopulationError> {
    if group.len() == 1 {
        return group
            .pop()
            .ok_or(PopulationError::IllegalState("empty merge group"));
    }
    let mut cursor = MergingCursor::new(Arc::clone(&layout), merger, cancellation, open_all(group)?);
    let mut writer = PartWriter::create(spill, layout, "merge")?;
    while cursor.next()? {
        if let Some((key, value)) = cursor.take() {
            writer.append(&key, &value)?;
        }
    }
    Ok(Box::new(writer.finish()?))
}
