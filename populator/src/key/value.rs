//! The closed set of indexable values and their per-type encoding.
//!
//! # Slot Format
//!
//! Each slot starts with a one-byte [`TypeTag`] followed by a payload:
//! ```text
//! boolean          | tag | 0/1 (1)                                     |
//! number           | tag | number type (1) | raw (1/2/4/8)             |
//! text             | tag | utf8 length (2) | utf8 bytes                |
//! temporal         | tag | fixed fields (8/12/16/28)                   |
//! point            | tag | crs header (3) | curve (8) | coords (8 * d) |
//! number array     | tag | number type (1) | length (2) | raw ...      |
//! text array       | tag | length (2) | (utf8 length (2) | bytes) ... |
//! point array      | tag | length (2) | crs header (3) | (curve | coords) ... |
//! other arrays     | tag | length (2) | fixed elements ...             |
//! ```
//! All integers are little-endian. Sizes in this module are the exact byte
//! counts the encoder produces.

use std::cmp::Ordering;
use std::fmt;

use crate::error::KeyError;
use crate::key::codec::{KeyReader, KeyWriter};
use crate::key::number::{Number, NumberArray, NumberType};
use crate::key::spatial::{CRS_HEADER_SIZE, Crs, Point};
use crate::key::temporal::{Date, DateTime, Duration, LocalDateTime, LocalTime, TemporalField, Time};

/// Bytes of the type tag.
pub const TAG_SIZE: usize = 1;

/// Bytes of a string or array length prefix.
pub const LENGTH_PREFIX_SIZE: usize = 2;

/// Type tag, numbered in cross-type sort order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum TypeTag {
    Point = 1,
    DateTime = 2,
    LocalDateTime = 3,
    Date = 4,
    Time = 5,
    LocalTime = 6,
    Duration = 7,
    Text = 8,
    Boolean = 9,
    Number = 10,
    PointArray = 11,
    DateTimeArray = 12,
    LocalDateTimeArray = 13,
    DateArray = 14,
    TimeArray = 15,
    LocalTimeArray = 16,
    DurationArray = 17,
    TextArray = 18,
    BooleanArray = 19,
    NumberArray = 20,
    NoValue = 21,
}

impl TryFrom<u8> for TypeTag {
    type Error = KeyError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            1 => Self::Point,
            2 => Self::DateTime,
            3 => Self::LocalDateTime,
            4 => Self::Date,
            5 => Self::Time,
            6 => Self::LocalTime,
            7 => Self::Duration,
            8 => Self::Text,
            9 => Self::Boolean,
            10 => Self::Number,
            11 => Self::PointArray,
            12 => Self::DateTimeArray,
            13 => Self::LocalDateTimeArray,
            14 => Self::DateArray,
            15 => Self::TimeArray,
            16 => Self::LocalTimeArray,
            17 => Self::DurationArray,
            18 => Self::TextArray,
            19 => Self::BooleanArray,
            20 => Self::NumberArray,
            21 => Self::NoValue,
            other => return Err(KeyError::UnknownTag(other)),
        })
    }
}

/// A property value that can be stored in an index slot.
#[derive(Debug, Clone)]
pub enum Value {
    Boolean(bool),
    Number(Number),
    Text(String),
    Date(Date),
    LocalTime(LocalTime),
    Time(Time),
    LocalDateTime(LocalDateTime),
    DateTime(DateTime),
    Duration(Duration),
    Point(Point),
    BooleanArray(Vec<bool>),
    NumberArray(NumberArray),
    TextArray(Vec<String>),
    DateArray(Vec<Date>),
    LocalTimeArray(Vec<LocalTime>),
    TimeArray(Vec<Time>),
    LocalDateTimeArray(Vec<LocalDateTime>),
    DateTimeArray(Vec<DateTime>),
    DurationArray(Vec<Duration>),
    PointArray(Vec<Point>),
}

impl Value {
    #[must_use]
    pub const fn tag(&self) -> TypeTag {
        match self {
            Self::Boolean(_) => TypeTag::Boolean,
            Self::Number(_) => TypeTag::Number,
            Self::Text(_) => TypeTag::Text,
            Self::Date(_) => TypeTag::Date,
            Self::LocalTime(_) => TypeTag::LocalTime,
            Self::Time(_) => TypeTag::Time,
            Self::LocalDateTime(_) => TypeTag::LocalDateTime,
            Self::DateTime(_) => TypeTag::DateTime,
            Self::Duration(_) => TypeTag::Duration,
            Self::Point(_) => TypeTag::Point,
            Self::BooleanArray(_) => TypeTag::BooleanArray,
            Self::NumberArray(_) => TypeTag::NumberArray,
            Self::TextArray(_) => TypeTag::TextArray,
            Self::DateArray(_) => TypeTag::DateArray,
            Self::LocalTimeArray(_) => TypeTag::LocalTimeArray,
            Self::TimeArray(_) => TypeTag::TimeArray,
            Self::LocalDateTimeArray(_) => TypeTag::LocalDateTimeArray,
            Self::DateTimeArray(_) => TypeTag::DateTimeArray,
            Self::DurationArray(_) => TypeTag::DurationArray,
            Self::PointArray(_) => TypeTag::PointArray,
        }
    }

    /// Exact encoded size of the slot, tag included.
    #[must_use]
    pub fn encoded_size(&self) -> usize {
        const ARRAY_HEADER: usize = TAG_SIZE + LENGTH_PREFIX_SIZE;
        match self {
            Self::Boolean(_) => TAG_SIZE + 1,
            Self::Number(n) => TAG_SIZE + 1 + n.number_type().width(),
            Self::Text(s) => TAG_SIZE + LENGTH_PREFIX_SIZE + s.len(),
            Self::Date(_) => TAG_SIZE + Date::WIDTH,
            Self::LocalTime(_) => TAG_SIZE + LocalTime::WIDTH,
            Self::Time(_) => TAG_SIZE + Time::WIDTH,
            Self::LocalDateTime(_) => TAG_SIZE + LocalDateTime::WIDTH,
            Self::DateTime(_) => TAG_SIZE + DateTime::WIDTH,
            Self::Duration(_) => TAG_SIZE + Duration::WIDTH,
            Self::Point(p) => TAG_SIZE + CRS_HEADER_SIZE + Point::element_size(p.crs()),
            Self::BooleanArray(v) => ARRAY_HEADER + v.len(),
            Self::NumberArray(a) => ARRAY_HEADER + 1 + a.len() * a.number_type().width(),
            Self::TextArray(v) => {
                ARRAY_HEADER + v.iter().map(|s| LENGTH_PREFIX_SIZE + s.len()).sum::<usize>()
            }
            Self::DateArray(v) => ARRAY_HEADER + v.len() * Date::WIDTH,
            Self::LocalTimeArray(v) => ARRAY_HEADER + v.len() * LocalTime::WIDTH,
            Self::TimeArray(v) => ARRAY_HEADER + v.len() * Time::WIDTH,
            Self::LocalDateTimeArray(v) => ARRAY_HEADER + v.len() * LocalDateTime::WIDTH,
            Self::DateTimeArray(v) => ARRAY_HEADER + v.len() * DateTime::WIDTH,
            Self::DurationArray(v) => ARRAY_HEADER + v.len() * Duration::WIDTH,
            Self::PointArray(v) => {
                ARRAY_HEADER
                    + CRS_HEADER_SIZE
                    + v.iter().map(|p| Point::element_size(p.crs())).sum::<usize>()
            }
        }
    }

    /// Checks everything that would make [`Value::write`] fail.
    pub fn validate(&self) -> Result<(), KeyError> {
        fn fits(len: usize) -> Result<(), KeyError> {
            u16::try_from(len)
                .map(|_| ())
                .map_err(|_| KeyError::LengthOverflow(len))
        }
        match self {
            Self::Text(s) => fits(s.len()),
            Self::TextArray(v) => {
                fits(v.len())?;
                v.iter().try_for_each(|s| fits(s.len()))
            }
            Self::PointArray(v) => {
                fits(v.len())?;
                match v.split_first() {
                    Some((first, rest)) if rest.iter().any(|p| p.crs() != first.crs()) => {
                        Err(KeyError::MixedCrs)
                    }
                    _ => Ok(()),
                }
            }
            Self::BooleanArray(v) => fits(v.len()),
            Self::NumberArray(a) => fits(a.len()),
            Self::DateArray(v) => fits(v.len()),
            Self::LocalTimeArray(v) => fits(v.len()),
            Self::TimeArray(v) => fits(v.len()),
            Self::LocalDateTimeArray(v) => fits(v.len()),
            Self::DateTimeArray(v) => fits(v.len()),
            Self::DurationArray(v) => fits(v.len()),
            _ => Ok(()),
        }
    }

    /// Total order: type group first, then value within the group.
    #[must_use]
    pub fn compare(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Boolean(a), Self::Boolean(b)) => a.cmp(b),
            (Self::Number(a), Self::Number(b)) => a.compare(b),
            (Self::Text(a), Self::Text(b)) => a.cmp(b),
            (Self::Date(a), Self::Date(b)) => a.cmp(b),
            (Self::LocalTime(a), Self::LocalTime(b)) => a.cmp(b),
            (Self::Time(a), Self::Time(b)) => a.cmp(b),
            (Self::LocalDateTime(a), Self::LocalDateTime(b)) => a.cmp(b),
            (Self::DateTime(a), Self::DateTime(b)) => a.cmp(b),
            (Self::Duration(a), Self::Duration(b)) => a.cmp(b),
            (Self::Point(a), Self::Point(b)) => a.compare(b),
            (Self::BooleanArray(a), Self::BooleanArray(b)) => a.cmp(b),
            (Self::NumberArray(a), Self::NumberArray(b)) => a.compare(b),
            (Self::TextArray(a), Self::TextArray(b)) => a.cmp(b),
            (Self::DateArray(a), Self::DateArray(b)) => a.cmp(b),
            (Self::LocalTimeArray(a), Self::LocalTimeArray(b)) => a.cmp(b),
            (Self::TimeArray(a), Self::TimeArray(b)) => a.cmp(b),
            (Self::LocalDateTimeArray(a), Self::LocalDateTimeArray(b)) => a.cmp(b),
            (Self::DateTimeArray(a), Self::DateTimeArray(b)) => a.cmp(b),
            (Self::DurationArray(a), Self::DurationArray(b)) => a.cmp(b),
            (Self::PointArray(a), Self::PointArray(b)) => a
                .iter()
                .zip(b)
                .map(|(x, y)| x.compare(y))
                .find(|c| c.is_ne())
                .unwrap_or_else(|| a.len().cmp(&b.len())),
            _ => self.tag().cmp(&other.tag()),
        }
    }

    /// Encodes the slot, tag included.
    pub fn write(&self, w: &mut KeyWriter<'_>) -> Result<(), KeyError> {
        fn fixed<T: TemporalField>(w: &mut KeyWriter<'_>, values: &[T]) -> Result<(), KeyError> {
            w.put_len(values.len())?;
            values.iter().for_each(|v| v.write(w));
            Ok(())
        }

        w.put_u8(self.tag() as u8);
        match self {
            Self::Boolean(b) => w.put_u8(u8::from(*b)),
            Self::Number(n) => {
                w.put_u8(n.number_type() as u8);
                n.write_raw(w);
            }
            Self::Text(s) => {
                w.put_len(s.len())?;
                w.put_bytes(s.as_bytes());
            }
            Self::Date(v) => v.write(w),
            Self::LocalTime(v) => v.write(w),
            Self::Time(v) => v.write(w),
            Self::LocalDateTime(v) => v.write(w),
            Self::DateTime(v) => v.write(w),
            Self::Duration(v) => v.write(w),
            Self::Point(p) => {
                p.crs().write_header(w);
                p.write_body(w);
            }
            Self::BooleanArray(v) => {
                w.put_len(v.len())?;
                v.iter().for_each(|b| w.put_u8(u8::from(*b)));
            }
            Self::NumberArray(a) => {
                w.put_u8(a.number_type() as u8);
                w.put_len(a.len())?;
                a.write_raw(w);
            }
            Self::TextArray(v) => {
                w.put_len(v.len())?;
                for s in v {
                    w.put_len(s.len())?;
                    w.put_bytes(s.as_bytes());
                }
            }
            Self::DateArray(v) => fixed(w, v)?,
            Self::LocalTimeArray(v) => fixed(w, v)?,
            Self::TimeArray(v) => fixed(w, v)?,
            Self::LocalDateTimeArray(v) => fixed(w, v)?,
            Self::DateTimeArray(v) => fixed(w, v)?,
            Self::DurationArray(v) => fixed(w, v)?,
            Self::PointArray(v) => {
                w.put_len(v.len())?;
                match v.first() {
                    None => w.put_u24(0),
                    Some(first) => {
                        if v.iter().any(|p| p.crs() != first.crs()) {
                            return Err(KeyError::MixedCrs);
                        }
                        first.crs().write_header(w);
                    }
                }
                v.iter().for_each(|p| p.write_body(w));
            }
        }
        Ok(())
    }

    /// Decodes the payload for a tag that has already been read.
    pub fn read(tag: TypeTag, r: &mut KeyReader<'_>) -> Result<Option<Self>, KeyError> {
        fn fixed<T: TemporalField>(r: &mut KeyReader<'_>) -> Result<Vec<T>, KeyError> {
            let len = r.length_prefix()?;
            (0..len).map(|_| T::read(r)).collect()
        }
        fn text(r: &mut KeyReader<'_>) -> Result<String, KeyError> {
            let len = r.length_prefix()?;
            String::from_utf8(r.take(len)?.to_vec()).map_err(|_| KeyError::InvalidUtf8)
        }

        let value = match tag {
            TypeTag::NoValue => return Ok(None),
            TypeTag::Boolean => Self::Boolean(r.u8()? != 0),
            TypeTag::Number => {
                let ty = NumberType::try_from(r.u8()?)?;
                Self::Number(Number::read_raw(ty, r)?)
            }
            TypeTag::Text => Self::Text(text(r)?),
            TypeTag::Date => Self::Date(Date::read(r)?),
            TypeTag::LocalTime => Self::LocalTime(LocalTime::read(r)?),
            TypeTag::Time => Self::Time(Time::read(r)?),
            TypeTag::LocalDateTime => Self::LocalDateTime(LocalDateTime::read(r)?),
            TypeTag::DateTime => Self::DateTime(DateTime::read(r)?),
            TypeTag::Duration => Self::Duration(Duration::read(r)?),
            TypeTag::Point => {
                let crs = Crs::read_header(r)?.ok_or(KeyError::UnknownCrs { table: 0, code: 0 })?;
                Self::Point(Point::read_body(crs, r)?)
            }
            TypeTag::BooleanArray => {
                let len = r.length_prefix()?;
                Self::BooleanArray(r.take(len)?.iter().map(|b| *b != 0).collect())
            }
            TypeTag::NumberArray => {
                let ty = NumberType::try_from(r.u8()?)?;
                let len = r.length_prefix()?;
                Self::NumberArray(NumberArray::read_raw(ty, len, r)?)
            }
            TypeTag::TextArray => {
                let len = r.length_prefix()?;
                Self::TextArray((0..len).map(|_| text(r)).collect::<Result<_, _>>()?)
            }
            TypeTag::DateArray => Self::DateArray(fixed(r)?),
            TypeTag::LocalTimeArray => Self::LocalTimeArray(fixed(r)?),
            TypeTag::TimeArray => Self::TimeArray(fixed(r)?),
            TypeTag::LocalDateTimeArray => Self::LocalDateTimeArray(fixed(r)?),
            TypeTag::DateTimeArray => Self::DateTimeArray(fixed(r)?),
            TypeTag::DurationArray => Self::DurationArray(fixed(r)?),
            TypeTag::PointArray => {
                let len = r.length_prefix()?;
                let points = match Crs::read_header(r)? {
                    None => Vec::new(),
                    Some(crs) => (0..len)
                        .map(|_| Point::read_body(crs, r))
                        .collect::<Result<_, _>>()?,
                };
                Self::PointArray(points)
            }
        };
        Ok(Some(value))
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.compare(other) == Ordering::Equal
    }
}

impl Eq for Value {}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        self.compare(other)
    }
}

fn write_list<T>(
    f: &mut fmt::Formatter<'_>,
    items: impl IntoIterator<Item = T>,
    mut each: impl FnMut(&mut fmt::Formatter<'_>, T) -> fmt::Result,
) -> fmt::Result {
    f.write_str("[")?;
    for (i, item) in items.into_iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        each(f, item)?;
    }
    f.write_str("]")
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Boolean(v) => write!(f, "{v}"),
            Self::Number(v) => write!(f, "{v}"),
            Self::Text(v) => write!(f, "{v:?}"),
            Self::Date(v) => write!(f, "{v}"),
            Self::LocalTime(v) => write!(f, "{v}"),
            Self::Time(v) => write!(f, "{v}"),
            Self::LocalDateTime(v) => write!(f, "{v}"),
            Self::DateTime(v) => write!(f, "{v}"),
            Self::Duration(v) => write!(f, "{v}"),
            Self::Point(v) => write!(f, "{v}"),
            Self::BooleanArray(v) => write_list(f, v, |f, x| write!(f, "{x}")),
            Self::NumberArray(v) => write_list(f, v.iter(), |f, x| write!(f, "{x}")),
            Self::TextArray(v) => write_list(f, v, |f, x| write!(f, "{x:?}")),
            Self::DateArray(v) => write_list(f, v, |f, x| write!(f, "{x}")),
            Self::LocalTimeArray(v) => write_list(f, v, |f, x| write!(f, "{x}")),
            Self::TimeArray(v) => write_list(f, v, |f, x| write!(f, "{x}")),
            Self::LocalDateTimeArray(v) => write_list(f, v, |f, x| write!(f, "{x}")),
            Self::DateTimeArray(v) => write_list(f, v, |f, x| write!(f, "{x}")),
            Self::DurationArray(v) => write_list(f, v, |f, x| write!(f, "{x}")),
            Self::PointArray(v) => write_list(f, v, |f, x| write!(f, "{x}")),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Boolean(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Number(Number::Int(v))
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Number(Number::Long(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Number(Number::Double(v))
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Text(v.to_owned())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<Point> for Value {
    fn from(v: Point) -> Self {
        Self::Point(v)
    }
}

impl From<Vec<String>> for Value {
    fn from(v: Vec<String>) -> Self {
        Self::TextArray(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoded(value: &Value) -> Vec<u8> {
        let mut buf = Vec::new();
        value.write(&mut KeyWriter::new(&mut buf)).unwrap();
        buf
    }

    fn decoded(bytes: &[u8]) -> Value {
        let mut r = KeyReader::new(bytes);
        let tag = TypeTag::try_from(r.u8().unwrap()).unwrap();
        let value = Value::read(tag, &mut r).unwrap().unwrap();
        r.finish().unwrap();
        value
    }

    fn point(crs: Crs, coords: &[f64]) -> Point {
        Point::new(crs, coords).unwrap()
    }

    fn duration(seconds: i64) -> Duration {
        Duration {
            months: 0,
            days: 0,
            seconds,
            nanos: 0,
        }
    }

    #[test]
    fn test_scalar_sizes() {
        let cases: Vec<(Value, usize)> = vec![
            (Value::Boolean(true), 2),
            (Value::Number(Number::Byte(1)), 3),
            (Value::Number(Number::Short(1)), 4),
            (Value::Number(Number::Int(1)), 6),
            (Value::Number(Number::Long(1)), 10),
            (Value::Number(Number::Float(1.0)), 6),
            (Value::Number(Number::Double(1.0)), 10),
            (Value::from("héllo"), 3 + 6),
            (Value::from(""), 3),
            (Value::Date(Date { epoch_day: 1 }), 9),
            (Value::LocalTime(LocalTime { nano_of_day: 1 }), 9),
            (
                Value::Time(Time {
                    nano_of_day_utc: 1,
                    offset_seconds: 0,
                }),
                13,
            ),
            (
                Value::LocalDateTime(LocalDateTime {
                    epoch_second: 1,
                    nano_of_second: 0,
                }),
                13,
            ),
            (
                Value::DateTime(DateTime {
                    epoch_second_utc: 1,
                    nano_of_second: 0,
                    offset_seconds: 0,
                }),
                17,
            ),
            (Value::Duration(duration(1)), 29),
            (Value::Point(point(Crs::Cartesian, &[1.0, 2.0])), 28),
            (Value::Point(point(Crs::Wgs84_3D, &[1.0, 2.0, 3.0])), 36),
        ];
        for (value, expected) in cases {
            assert_eq!(value.encoded_size(), expected, "{value}");
            assert_eq!(encoded(&value).len(), expected, "{value}");
        }
    }

    #[test]
    fn test_array_sizes() {
        let cases: Vec<(Value, usize)> = vec![
            (Value::BooleanArray(vec![true, false]), 3 + 2),
            (Value::NumberArray(NumberArray::Short(vec![1, 2, 3])), 4 + 6),
            (Value::NumberArray(NumberArray::Double(vec![])), 4),
            (
                Value::TextArray(vec!["ab".to_string(), String::new()]),
                3 + (2 + 2) + 2,
            ),
            (Value::DateArray(vec![Date { epoch_day: 0 }; 3]), 3 + 24),
            (Value::DurationArray(vec![duration(1), duration(2)]), 3 + 56),
            (Value::PointArray(vec![]), 6),
            (
                Value::PointArray(vec![
                    point(Crs::Cartesian, &[0.0, 0.0]),
                    point(Crs::Cartesian, &[1.0, 1.0]),
                ]),
                6 + 2 * 24,
            ),
            (
                Value::PointArray(vec![point(Crs::Cartesian3D, &[0.0, 0.0, 0.0])]),
                6 + 32,
            ),
        ];
        for (value, expected) in cases {
            assert_eq!(value.encoded_size(), expected, "{value}");
            assert_eq!(encoded(&value).len(), expected, "{value}");
        }
    }

    #[test]
    fn test_decode_restores_value() {
        let values = vec![
            Value::from(-12_i64),
            Value::Number(Number::Float(1.5)),
            Value::NumberArray(NumberArray::Byte(vec![-1, 0, 1])),
            Value::from("text"),
            Value::TextArray(vec!["a".to_string(), "ö".to_string()]),
            Value::PointArray(vec![point(Crs::Wgs84, &[12.5, 55.0])]),
            Value::PointArray(vec![]),
            Value::TimeArray(vec![Time {
                nano_of_day_utc: 5,
                offset_seconds: -60,
            }]),
        ];
        for value in values {
            let back = decoded(&encoded(&value));
            assert_eq!(back, value);
            assert_eq!(back.tag(), value.tag());
        }
    }

    #[test]
    fn test_cross_type_order_follows_groups() {
        let ordered = [
            Value::Point(point(Crs::Cartesian, &[0.0, 0.0])),
            Value::Date(Date { epoch_day: 0 }),
            Value::Duration(duration(0)),
            Value::from("zzz"),
            Value::Boolean(false),
            Value::from(i64::MIN),
            Value::PointArray(vec![]),
            Value::TextArray(vec![]),
            Value::NumberArray(NumberArray::Int(vec![])),
        ];
        for pair in ordered.windows(2) {
            assert_eq!(pair[0].compare(&pair[1]), Ordering::Less, "{} < {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_text_arrays_order_elementwise_then_length() {
        let a = Value::TextArray(vec!["a".to_string()]);
        let ab = Value::TextArray(vec!["a".to_string(), "b".to_string()]);
        let b = Value::TextArray(vec!["b".to_string()]);
        assert!(a < ab);
        assert!(ab < b);
    }

    #[test]
    fn test_mixed_crs_point_array_is_rejected() {
        let mixed = Value::PointArray(vec![
            point(Crs::Cartesian, &[0.0, 0.0]),
            point(Crs::Wgs84, &[0.0, 0.0]),
        ]);
        assert_eq!(mixed.validate(), Err(KeyError::MixedCrs));
        let mut buf = Vec::new();
        assert_eq!(mixed.write(&mut KeyWriter::new(&mut buf)), Err(KeyError::MixedCrs));
    }

    #[test]
    fn test_oversized_text_is_rejected_before_encoding() {
        let long = Value::from("x".repeat(70_000));
        assert_eq!(long.validate(), Err(KeyError::LengthOverflow(70_000)));
    }
}
