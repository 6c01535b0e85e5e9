//! Spatial points, their coordinate reference systems and curve order.
//!
//! Points sort by CRS, then by their position on a Z-order space-filling
//! curve inside the CRS envelope, then by raw coordinates. The curve keeps
//! points that are close in space close in the index.
//!
//! # Header Format
//!
//! Every encoded point (or non-empty point array) carries a 3-byte header:
//! ```text
//! +---------+-----------------------------+
//! | 22-23   | CRS table id (2 bits)       |
//! | 0-21    | CRS code (22 bits)          |
//! +---------+-----------------------------+
//! ```
//! A header of 0 marks an empty point array.

use std::cmp::Ordering;
use std::fmt;

use crate::error::KeyError;
use crate::key::codec::{KeyReader, KeyWriter};

/// Bytes of the CRS header.
pub const CRS_HEADER_SIZE: usize = 3;

/// Bytes of the curve value stored before the coordinates.
pub const CURVE_VALUE_SIZE: usize = 8;

const CODE_BITS: u32 = 22;
const CODE_MASK: u32 = (1 << CODE_BITS) - 1;

const CARTESIAN_EXTENT: f64 = 1_000_000.0;

/// Supported coordinate reference systems, in index order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Crs {
    Cartesian,
    Cartesian3D,
    Wgs84,
    #[allow(non_camel_case_types)]
    Wgs84_3D,
}

impl Crs {
    pub const ALL: [Self; 4] = [Self::Cartesian, Self::Cartesian3D, Self::Wgs84, Self::Wgs84_3D];

    #[must_use]
    pub const fn table(self) -> u8 {
        match self {
            Self::Cartesian | Self::Cartesian3D => 1,
            Self::Wgs84 | Self::Wgs84_3D => 2,
        }
    }

    #[must_use]
    pub const fn code(self) -> u32 {
        match self {
            Self::Cartesian => 7203,
            Self::Cartesian3D => 9157,
            Self::Wgs84 => 4326,
            Self::Wgs84_3D => 4979,
        }
    }

    #[must_use]
    pub const fn dimensions(self) -> usize {
        match self {
            Self::Cartesian | Self::Wgs84 => 2,
            Self::Cartesian3D | Self::Wgs84_3D => 3,
        }
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Cartesian => "cartesian",
            Self::Cartesian3D => "cartesian-3d",
            Self::Wgs84 => "wgs-84",
            Self::Wgs84_3D => "wgs-84-3d",
        }
    }

    /// Minimum and maximum of each dimension.
    const fn envelope(self) -> [(f64, f64); 3] {
        let cartesian = (-CARTESIAN_EXTENT, CARTESIAN_EXTENT);
        match self {
            Self::Cartesian | Self::Cartesian3D => [cartesian, cartesian, cartesian],
            Self::Wgs84 | Self::Wgs84_3D => [(-180.0, 180.0), (-90.0, 90.0), cartesian],
        }
    }

    const fn curve_bits(self) -> u32 {
        match self.dimensions() {
            2 => 31,
            _ => 21,
        }
    }

    pub(crate) fn write_header(self, w: &mut KeyWriter<'_>) {
        w.put_u24((u32::from(self.table()) << CODE_BITS) | self.code());
    }

    /// Reads a header. `Ok(None)` is the empty-array marker.
    pub(crate) fn read_header(r: &mut KeyReader<'_>) -> Result<Option<Self>, KeyError> {
        let header = r.u24()?;
        if header == 0 {
            return Ok(None);
        }
        // At most 2 bits remain after the shift.
        #[allow(clippy::cast_possible_truncation)]
        let table = (header >> CODE_BITS) as u8;
        let code = header & CODE_MASK;
        Self::ALL
            .into_iter()
            .find(|crs| crs.table() == table && crs.code() == code)
            .map(Some)
            .ok_or(KeyError::UnknownCrs { table, code })
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A point in one of the supported CRSs.
///
/// # Invariants
/// - exactly `crs.dimensions()` coordinates are significant
/// - all coordinates are finite
/// - `curve` is the Z-order value of the coordinates
#[derive(Debug, Clone, Copy)]
pub struct Point {
    crs: Crs,
    coordinates: [f64; 3],
    curve: u64,
}

impl Point {
    pub fn new(crs: Crs, coordinates: &[f64]) -> Result<Self, KeyError> {
        if coordinates.len() != crs.dimensions() {
            return Err(KeyError::DimensionMismatch {
                crs: crs.name(),
                expected: crs.dimensions(),
                actual: coordinates.len(),
            });
        }
        if let Some(bad) = coordinates.iter().find(|c| !c.is_finite()) {
            return Err(KeyError::InvalidCoordinate(*bad));
        }
        let mut fixed = [0.0; 3];
        fixed[..coordinates.len()].copy_from_slice(coordinates);
        Ok(Self {
            crs,
            coordinates: fixed,
            curve: curve_value(crs, coordinates),
        })
    }

    #[must_use]
    pub const fn crs(&self) -> Crs {
        self.crs
    }

    #[must_use]
    pub fn coordinates(&self) -> &[f64] {
        &self.coordinates[..self.crs.dimensions()]
    }

    #[must_use]
    pub const fn curve_value(&self) -> u64 {
        self.curve
    }

    /// Bytes of curve value plus coordinates, without any header.
    #[must_use]
    pub const fn element_size(crs: Crs) -> usize {
        CURVE_VALUE_SIZE + 8 * crs.dimensions()
    }

    #[must_use]
    pub fn compare(&self, other: &Self) -> Ordering {
        self.crs
            .cmp(&other.crs)
            .then(self.curve.cmp(&other.curve))
            .then_with(|| {
                self.coordinates()
                    .iter()
                    .zip(other.coordinates())
                    .map(|(a, b)| a.partial_cmp(b).unwrap_or(Ordering::Equal))
                    .find(|c| c.is_ne())
                    .unwrap_or(Ordering::Equal)
            })
    }

    /// Writes curve value and coordinates. The CRS header is written by the
    /// caller.
    pub(crate) fn write_body(&self, w: &mut KeyWriter<'_>) {
        w.put_u64(self.curve);
        for c in self.coordinates() {
            w.put_f64(*c);
        }
    }

    pub(crate) fn read_body(crs: Crs, r: &mut KeyReader<'_>) -> Result<Self, KeyError> {
        let _stored_curve = r.u64()?;
        let mut coordinates = [0.0; 3];
        for c in coordinates.iter_mut().take(crs.dimensions()) {
            *c = r.f64()?;
        }
        Self::new(crs, &coordinates[..crs.dimensions()])
    }
}

impl PartialEq for Point {
    fn eq(&self, other: &Self) -> bool {
        self.compare(other) == Ordering::Equal
    }
}

impl Eq for Point {}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "point({}", self.crs)?;
        for c in self.coordinates() {
            write!(f, ", {c}")?;
        }
        f.write_str(")")
    }
}

/// Interleaves the normalized coordinates, most significant bit first.
fn curve_value(crs: Crs, coordinates: &[f64]) -> u64 {
    let bits = crs.curve_bits();
    let envelope = crs.envelope();
    let max_cell = (1_u64 << bits) - 1;
    let mut cells = [0_u64; 3];
    for (dim, (c, (min, max))) in coordinates.iter().zip(envelope).enumerate() {
        let clamped = c.clamp(min, max);
        // Bounded by max_cell after normalization.
        #[allow(
            clippy::cast_possible_truncation,
            clippy::cast_sign_loss,
            clippy::cast_precision_loss
        )]
        let cell = ((clamped - min) / (max - min) * max_cell as f64) as u64;
        cells[dim] = cell.min(max_cell);
    }
    let mut value = 0_u64;
    for bit in (0..bits).rev() {
        for cell in &cells[..coordinates.len()] {
            value = (value << 1) | ((cell >> bit) & 1);
        }
    }
    value
}
