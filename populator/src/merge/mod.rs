//! Part merger: reduces sorted parts to one sorted stream.

mod cancellation;
mod cursor;
mod merger;
mod part_merger;

pub use cancellation::Cancellation;
pub use cursor::{CANCELLATION_CHECK_INTERVAL, MergingCursor};
pub use merger::{KeepAll, MergeResult, ValueMerger};
pub use part_merger::{MergeStats, PartMerger};
pub(crate) use part_merger::aborted;
