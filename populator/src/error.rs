//! Error types for index population.
//!
//! Every failure the pipeline can surface is a [`PopulationError`]. The codec
//! has its own [`KeyError`] which converts into it, so `?` works across the
//! boundary.

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

use crate::key::Value;

/// Failure while encoding, decoding or building an index key.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum KeyError {
    /// Input ended before a complete key or value could be read.
    #[error("truncated key: needed {needed} more bytes at offset {offset}")]
    Truncated { offset: usize, needed: usize },
    /// A type tag byte that the codec does not know.
    #[error("unknown type tag {0:#04x}")]
    UnknownTag(u8),
    /// A number type byte that the codec does not know.
    #[error("unknown number type {0:#04x}")]
    UnknownNumberType(u8),
    /// A coordinate reference system the codec does not know.
    #[error("unknown coordinate reference system table {table} code {code}")]
    UnknownCrs { table: u8, code: u32 },
    /// Text payload is not valid UTF-8.
    #[error("text payload is not valid UTF-8")]
    InvalidUtf8,
    /// A string or array is longer than its length prefix can express.
    #[error("length {0} does not fit in a 16-bit length prefix")]
    LengthOverflow(usize),
    /// A point has the wrong number of coordinates for its CRS.
    #[error("point in {crs} needs {expected} coordinates, got {actual}")]
    DimensionMismatch {
        crs: &'static str,
        expected: usize,
        actual: usize,
    },
    /// A point coordinate is NaN or infinite.
    #[error("point coordinate {0} is not finite")]
    InvalidCoordinate(f64),
    /// Points of one array do not share a coordinate reference system.
    #[error("point array mixes coordinate reference systems")]
    MixedCrs,
    /// A slot index past the number of slots the key was created with.
    #[error("slot {slot} is out of range for a key with {slots} slots")]
    SlotOutOfRange { slot: usize, slots: usize },
    /// Range boundary markers only exist in memory.
    #[error("slot {0} holds a range boundary and cannot be stored")]
    UnstorableSlot(usize),
    /// A logged update step byte that the codec does not know.
    #[error("unknown update step {0:#04x}")]
    UnknownUpdateStep(u8),
    /// Bytes were left over after a complete key was read.
    #[error("{0} trailing bytes after key")]
    TrailingBytes(usize),
}

/// Failure of any stage of index population.
#[derive(Debug, Error)]
pub enum PopulationError {
    /// An entry is too large for the backing tree. The wording of this message
    /// is matched on by callers and must stay stable.
    #[error(
        "Property value is too large to index, please see index documentation for limitations. Index: {index}, entity id: {entity_id}, property size: {size}."
    )]
    SizeExceeded {
        index: String,
        entity_id: i64,
        size: usize,
        cap: usize,
    },
    /// Two different entities share a value in a unique index.
    #[error(
        "Both entity {existing_entity_id} and entity {added_entity_id} share the property value {} in index {index}",
        DisplayValues(.values)
    )]
    ConflictDetected {
        index: String,
        existing_entity_id: i64,
        added_entity_id: i64,
        values: Vec<Value>,
    },
    /// The merge failed and no merged stream was produced.
    #[error("merge aborted: {reason}")]
    MergeAborted {
        reason: String,
        #[source]
        source: Box<PopulationError>,
    },
    /// Cancellation was requested and observed.
    #[error("population was cancelled")]
    Cancelled,
    /// I/O failure on spill storage.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Codec failure.
    #[error("key error: {0}")]
    Key(#[from] KeyError),
    /// A spilled part failed its integrity check.
    #[error("corrupt part {}: {reason}", .path.display())]
    CorruptPart { path: PathBuf, reason: String },
    /// An operation was called in a state that does not allow it.
    #[error("illegal state: {0}")]
    IllegalState(&'static str),
    /// A failure shared by every caller of one ingestion batch.
    #[error(transparent)]
    Shared(Arc<PopulationError>),
}

impl PopulationError {
    /// Whether this error is, or wraps, an observed cancellation.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        match self {
            Self::Cancelled => true,
            Self::MergeAborted { source, .. } => source.is_cancelled(),
            Self::Shared(inner) => inner.is_cancelled(),
            _ => false,
        }
    }

    /// Unwraps a shared error when this is its last owner.
    #[must_use]
    pub fn from_shared(shared: Arc<Self>) -> Self {
        Arc::try_unwrap(shared).unwrap_or_else(Self::Shared)
    }
}

/// Formats a composite value as `v` or `(v1, v2, ...)`.
struct DisplayValues<'a>(&'a [Value]);

impl std::fmt::Display for DisplayValues<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0 {
            [single] => write!(f, "{single}"),
            values => {
                f.write_str("(")?;
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{value}")?;
                }
                f.write_str(")")
            }
        }
    }
}
