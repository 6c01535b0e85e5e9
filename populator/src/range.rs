//! Range (bucket) layout of entity ids.
//!
//! Ids map to a bucket of [`RANGE_SIZE`] consecutive ids plus an offset inside
//! it. The mapping uses an arithmetic shift and a mask, so it is a floor
//! division that stays correct for negative ids and never overflows at the
//! `i64` extremes.

/// Ids per range.
pub const RANGE_SIZE: u32 = 64;

/// Maps entity ids to ranges of `1 << shift` ids.
///
/// # Invariants
/// - `mask == (1 << shift) - 1`
/// - for every id: `range_of(id) * range_size() + id_within_range(id) == id`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdLayout {
    shift: u32,
    mask: i64,
}

impl Default for IdLayout {
    fn default() -> Self {
        Self::with_range_size(RANGE_SIZE)
    }
}

impl IdLayout {
    /// # Panics
    /// Panics if `range_size` is not a power of two.
    #[must_use]
    pub const fn with_range_size(range_size: u32) -> Self {
        assert!(range_size.is_power_of_two(), "range size must be a power of two");
        let shift = range_size.trailing_zeros();
        Self {
            shift,
            mask: (1_i64 << shift) - 1,
        }
    }

    #[must_use]
    pub const fn range_size(&self) -> i64 {
        1_i64 << self.shift
    }

    #[must_use]
    pub const fn range_of(&self, id: i64) -> i64 {
        id >> self.shift
    }

    #[must_use]
    pub const fn id_within_range(&self, id: i64) -> i64 {
        id & self.mask
    }

    #[must_use]
    pub const fn first_id_of_range(&self, range: i64) -> i64 {
        range << self.shift
    }

    /// Bit of `id` inside its range's bitmap.
    #[must_use]
    pub const fn bit_of(&self, id: i64) -> u64 {
        1_u64 << self.id_within_range(id)
    }
}
