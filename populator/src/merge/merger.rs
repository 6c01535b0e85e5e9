/// Outcome of merging two entries with equal keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeResult {
    /// The new value replaces the existing one. The pair collapses to one
    /// entry.
    Replaced,
    /// The existing value was updated in place to hold both. The pair
    /// collapses to one entry.
    Merged,
    /// Both entries are left as they are and both stay in the stream.
    Unchanged,
}

/// Policy applied whenever a merge meets two entries with equal keys.
///
/// Called concurrently from every merge job, hence `Sync`.
pub trait ValueMerger<K, V>: Send + Sync {
    fn merge(
        &self,
        existing_key: &K,
        new_key: &K,
        existing_value: &mut V,
        new_value: &V,
    ) -> MergeResult;
}

/// Keeps every entry.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeepAll;

impl<K, V> ValueMerger<K, V> for KeepAll {
    fn merge(&self, _: &K, _: &K, _: &mut V, _: &V) -> MergeResult {
        MergeResult::Unchanged
    }
}
