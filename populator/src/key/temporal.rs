//! Temporal values as the raw fields the key stores.
//!
//! Field order in each struct is comparison order, so the derived `Ord` is
//! the index order. `Duration` is the exception and orders by its average
//! length first.

use std::cmp::Ordering;
use std::fmt;

use crate::error::KeyError;
use crate::key::codec::{KeyReader, KeyWriter};

/// Seconds in an average Gregorian month.
pub const AVG_SECONDS_PER_MONTH: i64 = 2_629_746;

const SECONDS_PER_DAY: i64 = 86_400;

/// Days since 1970-01-01.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Date {
    pub epoch_day: i64,
}

/// Nanoseconds since midnight, no zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LocalTime {
    pub nano_of_day: i64,
}

/// Time of day normalized to UTC plus the original offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Time {
    pub nano_of_day_utc: i64,
    pub offset_seconds: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LocalDateTime {
    pub epoch_second: i64,
    pub nano_of_second: i32,
}

/// Instant in UTC plus the original offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DateTime {
    pub epoch_second_utc: i64,
    pub nano_of_second: i32,
    pub offset_seconds: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Duration {
    pub months: i64,
    pub days: i64,
    pub seconds: i64,
    pub nanos: i32,
}

impl Duration {
    /// Length in seconds using average month and day lengths.
    #[must_use]
    pub fn average_seconds(&self) -> i128 {
        i128::from(self.months) * i128::from(AVG_SECONDS_PER_MONTH)
            + i128::from(self.days) * i128::from(SECONDS_PER_DAY)
            + i128::from(self.seconds)
    }
}

impl PartialOrd for Duration {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Duration {
    fn cmp(&self, other: &Self) -> Ordering {
        self.average_seconds()
            .cmp(&other.average_seconds())
            .then(self.nanos.cmp(&other.nanos))
            .then(self.months.cmp(&other.months))
            .then(self.days.cmp(&other.days))
    }
}

/// Fixed-width encoding shared by the scalar and array forms.
pub trait TemporalField: Sized + Ord + Copy + fmt::Display {
    /// Encoded width in bytes.
    const WIDTH: usize;

    fn write(&self, w: &mut KeyWriter<'_>);

    fn read(r: &mut KeyReader<'_>) -> Result<Self, KeyError>;
}

impl TemporalField for Date {
    const WIDTH: usize = 8;

    fn write(&self, w: &mut KeyWriter<'_>) {
        w.put_i64(self.epoch_day);
    }

    fn read(r: &mut KeyReader<'_>) -> Result<Self, KeyError> {
        Ok(Self { epoch_day: r.i64()? })
    }
}

impl TemporalField for LocalTime {
    const WIDTH: usize = 8;

    fn write(&self, w: &mut KeyWriter<'_>) {
        w.put_i64(self.nano_of_day);
    }

    fn read(r: &mut KeyReader<'_>) -> Result<Self, KeyError> {
        Ok(Self {
            nano_of_day: r.i64()?,
        })
    }
}

impl TemporalField for Time {
    const WIDTH: usize = 12;

    fn write(&self, w: &mut KeyWriter<'_>) {
        w.put_i64(self.nano_of_day_utc);
        w.put_i32(self.offset_seconds);
    }

    fn read(r: &mut KeyReader<'_>) -> Result<Self, KeyError> {
        Ok(Self {
            nano_of_day_utc: r.i64()?,
            offset_seconds: r.i32()?,
        })
    }
}

impl TemporalField for LocalDateTime {
    const WIDTH: usize = 12;

    fn write(&self, w: &mut KeyWriter<'_>) {
        w.put_i64(self.epoch_second);
        w.put_i32(self.nano_of_second);
    }

    fn read(r: &mut KeyReader<'_>) -> Result<Self, KeyError> {
        Ok(Self {
            epoch_second: r.i64()?,
            nano_of_second: r.i32()?,
        })
    }
}

impl TemporalField for DateTime {
    const WIDTH: usize = 16;

    fn write(&self, w: &mut KeyWriter<'_>) {
        w.put_i64(self.epoch_second_utc);
        w.put_i32(self.nano_of_second);
        w.put_i32(self.offset_seconds);
    }

    fn read(r: &mut KeyReader<'_>) -> Result<Self, KeyError> {
        Ok(Self {
            epoch_second_utc: r.i64()?,
            nano_of_second: r.i32()?,
            offset_seconds: r.i32()?,
        })
    }
}

impl TemporalField for Duration {
    const WIDTH: usize = 28;

    fn write(&self, w: &mut KeyWriter<'_>) {
        w.put_i64(self.months);
        w.put_i64(self.days);
        w.put_i64(self.seconds);
        w.put_i32(self.nanos);
    }

    fn read(r: &mut KeyReader<'_>) -> Result<Self, KeyError> {
        Ok(Self {
            months: r.i64()?,
            days: r.i64()?,
            seconds: r.i64()?,
            nanos: r.i32()?,
        })
    }
}

impl fmt::Display for Date {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "date(epochDay={})", self.epoch_day)
    }
}

impl fmt::Display for LocalTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "localtime(nanoOfDay={})", self.nano_of_day)
    }
}

impl fmt::Display for Time {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "time(nanoOfDayUtc={}, offset={}s)",
            self.nano_of_day_utc, self.offset_seconds
        )
    }
}

impl fmt::Display for LocalDateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "localdatetime(epochSecond={}, nanos={})",
            self.epoch_second, self.nano_of_second
        )
    }
}

impl fmt::Display for DateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "datetime(epochSecondUtc={}, nanos={}, offset={}s)",
            self.epoch_second_utc, self.nano_of_second, self.offset_seconds
        )
    }
}

impl fmt::Display for Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "P{}M{}DT{}.{:09}S",
            self.months, self.days, self.seconds, self.nanos
        )
    }
}
