//! Block storage: sorted in-memory blocks spilled as immutable parts.

mod part;
mod spill;
mod storage;
mod updates;

pub use part::{BoxCursor, EmptyCursor, MemoryPart, Part, PartCursor, PartSource};
pub use spill::{PartWriter, SpillDirectory, SpilledPart};
pub use storage::{BlockStorage, ENTRY_OVERHEAD};
pub use updates::{UpdateLayout, UpdateStep};
