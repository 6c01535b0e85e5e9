//! End-to-end tests at the populator level.
//!
//! Each test file covers one population scenario, feeding updates through
//! `add` and `process_external`, merging with `scan_completed` and checking
//! what reached the tree.

#![cfg(test)]

mod helpers;

mod test_close_cancels;
mod test_composite;
mod test_concurrent_add;
mod test_external_updates;
mod test_many_blocks;
mod test_non_unique_duplicates;
mod test_size_cap;
mod test_tokio_scheduler;
mod test_unique_conflict;
