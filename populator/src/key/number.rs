//! Numeric values and their cross-width ordering.
//!
//! Numbers of different widths compare by mathematical value, so `Int(5)`
//! equals `Long(5)` and `Long(1)` sorts below `Double(1.5)`. NaN sorts above
//! every other number.

use std::cmp::Ordering;
use std::fmt;

use crate::error::KeyError;
use crate::key::codec::{KeyReader, KeyWriter};

/// Width tag stored in front of every numeric payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum NumberType {
    Byte = 0,
    Short = 1,
    Int = 2,
    Long = 3,
    Float = 4,
    Double = 5,
}

impl NumberType {
    /// Bytes of the raw payload.
    #[must_use]
    pub const fn width(self) -> usize {
        match self {
            Self::Byte => 1,
            Self::Short => 2,
            Self::Int | Self::Float => 4,
            Self::Long | Self::Double => 8,
        }
    }
}

impl TryFrom<u8> for NumberType {
    type Error = KeyError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Byte),
            1 => Ok(Self::Short),
            2 => Ok(Self::Int),
            3 => Ok(Self::Long),
            4 => Ok(Self::Float),
            5 => Ok(Self::Double),
            other => Err(KeyError::UnknownNumberType(other)),
        }
    }
}

/// A single number of any supported width.
#[derive(Debug, Clone, Copy)]
pub enum Number {
    Byte(i8),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
}

enum Exact {
    Integral(i64),
    Floating(f64),
}

impl Number {
    #[must_use]
    pub const fn number_type(&self) -> NumberType {
        match self {
            Self::Byte(_) => NumberType::Byte,
            Self::Short(_) => NumberType::Short,
            Self::Int(_) => NumberType::Int,
            Self::Long(_) => NumberType::Long,
            Self::Float(_) => NumberType::Float,
            Self::Double(_) => NumberType::Double,
        }
    }

    fn exact(self) -> Exact {
        match self {
            Self::Byte(v) => Exact::Integral(i64::from(v)),
            Self::Short(v) => Exact::Integral(i64::from(v)),
            Self::Int(v) => Exact::Integral(i64::from(v)),
            Self::Long(v) => Exact::Integral(v),
            Self::Float(v) => Exact::Floating(f64::from(v)),
            Self::Double(v) => Exact::Floating(v),
        }
    }

    /// Total order by mathematical value.
    #[must_use]
    pub fn compare(&self, other: &Self) -> Ordering {
        match (self.exact(), other.exact()) {
            (Exact::Integral(a), Exact::Integral(b)) => a.cmp(&b),
            (Exact::Floating(a), Exact::Floating(b)) => compare_floats(a, b),
            (Exact::Integral(a), Exact::Floating(b)) => compare_integral_to_float(a, b),
            (Exact::Floating(a), Exact::Integral(b)) => {
                compare_integral_to_float(b, a).reverse()
            }
        }
    }

    pub(crate) fn write_raw(&self, w: &mut KeyWriter<'_>) {
        match self {
            Self::Byte(v) => w.put_bytes(&v.to_le_bytes()),
            Self::Short(v) => w.put_bytes(&v.to_le_bytes()),
            Self::Int(v) => w.put_bytes(&v.to_le_bytes()),
            Self::Long(v) => w.put_bytes(&v.to_le_bytes()),
            Self::Float(v) => w.put_bytes(&v.to_le_bytes()),
            Self::Double(v) => w.put_bytes(&v.to_le_bytes()),
        }
    }

    pub(crate) fn read_raw(ty: NumberType, r: &mut KeyReader<'_>) -> Result<Self, KeyError> {
        Ok(match ty {
            NumberType::Byte => Self::Byte(i8::from_le_bytes(r.array()?)),
            NumberType::Short => Self::Short(i16::from_le_bytes(r.array()?)),
            NumberType::Int => Self::Int(i32::from_le_bytes(r.array()?)),
            NumberType::Long => Self::Long(i64::from_le_bytes(r.array()?)),
            NumberType::Float => Self::Float(f32::from_le_bytes(r.array()?)),
            NumberType::Double => Self::Double(f64::from_le_bytes(r.array()?)),
        })
    }
}

/// `Double.compare` semantics except that the two zeros are equal, which
/// keeps the order transitive alongside integral zero.
fn compare_floats(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
    }
}

/// Exact comparison of an integer with a float, without the precision loss of
/// converting the integer to `f64`.
fn compare_integral_to_float(i: i64, f: f64) -> Ordering {
    const TWO_POW_63: f64 = 9_223_372_036_854_775_808.0;

    if f.is_nan() || f >= TWO_POW_63 {
        return Ordering::Less;
    }
    if f < -TWO_POW_63 {
        return Ordering::Greater;
    }
    let whole = f.trunc();
    // In range after the checks above, and integral.
    #[allow(clippy::cast_possible_truncation)]
    let whole_int = whole as i64;
    match i.cmp(&whole_int) {
        Ordering::Equal => {
            let fraction = f - whole;
            if fraction > 0.0 {
                Ordering::Less
            } else if fraction < 0.0 {
                Ordering::Greater
            } else {
                Ordering::Equal
            }
        }
        other => other,
    }
}

impl PartialEq for Number {
    fn eq(&self, other: &Self) -> bool {
        self.compare(other) == Ordering::Equal
    }
}

impl Eq for Number {}

impl PartialOrd for Number {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Number {
    fn cmp(&self, other: &Self) -> Ordering {
        self.compare(other)
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Byte(v) => write!(f, "{v}"),
            Self::Short(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Long(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Double(v) => write!(f, "{v}"),
        }
    }
}

/// A homogeneous array of numbers.
#[derive(Debug, Clone)]
pub enum NumberArray {
    Byte(Vec<i8>),
    Short(Vec<i16>),
    Int(Vec<i32>),
    Long(Vec<i64>),
    Float(Vec<f32>),
    Double(Vec<f64>),
}

impl NumberArray {
    #[must_use]
    pub const fn number_type(&self) -> NumberType {
        match self {
            Self::Byte(_) => NumberType::Byte,
            Self::Short(_) => NumberType::Short,
            Self::Int(_) => NumberType::Int,
            Self::Long(_) => NumberType::Long,
            Self::Float(_) => NumberType::Float,
            Self::Double(_) => NumberType::Double,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Byte(v) => v.len(),
            Self::Short(v) => v.len(),
            Self::Int(v) => v.len(),
            Self::Long(v) => v.len(),
            Self::Float(v) => v.len(),
            Self::Double(v) => v.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Element at `index`, widened to a [`Number`].
    #[must_use]
    pub fn get(&self, index: usize) -> Option<Number> {
        match self {
            Self::Byte(v) => v.get(index).copied().map(Number::Byte),
            Self::Short(v) => v.get(index).copied().map(Number::Short),
            Self::Int(v) => v.get(index).copied().map(Number::Int),
            Self::Long(v) => v.get(index).copied().map(Number::Long),
            Self::Float(v) => v.get(index).copied().map(Number::Float),
            Self::Double(v) => v.get(index).copied().map(Number::Double),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = Number> + '_ {
        (0..self.len()).filter_map(|i| self.get(i))
    }

    /// Element-wise, then shorter first.
    #[must_use]
    pub fn compare(&self, other: &Self) -> Ordering {
        self.iter()
            .zip(other.iter())
            .map(|(a, b)| a.compare(&b))
            .find(|c| c.is_ne())
            .unwrap_or_else(|| self.len().cmp(&other.len()))
    }

    pub(crate) fn write_raw(&self, w: &mut KeyWriter<'_>) {
        for number in self.iter() {
            number.write_raw(w);
        }
    }

    pub(crate) fn read_raw(
        ty: NumberType,
        len: usize,
        r: &mut KeyReader<'_>,
    ) -> Result<Self, KeyError> {
        macro_rules! read_all {
            ($variant:ident, $t:ty) => {
                Self::$variant(
                    (0..len)
                        .map(|_| Ok(<$t>::from_le_bytes(r.array()?)))
                        .collect::<Result<Vec<$t>, KeyError>>()?,
                )
            };
        }
        Ok(match ty {
            NumberType::Byte => read_all!(Byte, i8),
            NumberType::Short => read_all!(Short, i16),
            NumberType::Int => read_all!(Int, i32),
            NumberType::Long => read_all!(Long, i64),
            NumberType::Float => read_all!(Float, f32),
            NumberType::Double => read_all!(Double, f64),
        })
    }
}
