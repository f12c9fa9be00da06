//! Timestamps carried in KDM validity windows
//!
//! Key blocks store their validity bounds as fixed 25-byte ASCII strings of
//! the form `YYYY-MM-DDThh:mm:ss±hh:mm`. `LocalTime` keeps the original UTC
//! offset so that a decoded block re-encodes to the same bytes.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Offset, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Length in bytes of a formatted timestamp
pub const TIMESTAMP_LENGTH: usize = 25;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%:z";
const TIMESTAMP_FORMAT_NO_OFFSET: &str = "%Y-%m-%dT%H:%M:%S";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimeError {
    #[error("Bad time string '{value}': {reason}")]
    InvalidFormat { value: String, reason: String },

    #[error("Year {0} cannot be written as a 4-digit timestamp")]
    YearOutOfRange(i32),

    #[error("UTC offset of {0} seconds is not a whole number of minutes")]
    OffsetNotWholeMinutes(i32),
}

/// A wall-clock time with its UTC offset, to one-second precision
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LocalTime(DateTime<FixedOffset>);

impl LocalTime {
    /// Parse the strict 25-byte form `YYYY-MM-DDThh:mm:ss±hh:mm`
    pub fn parse(s: &str) -> Result<Self, TimeError> {
        if s.len() != TIMESTAMP_LENGTH {
            return Err(TimeError::InvalidFormat {
                value: s.to_string(),
                reason: format!("expected {} bytes, got {}", TIMESTAMP_LENGTH, s.len()),
            });
        }
        let dt = DateTime::parse_from_str(s, TIMESTAMP_FORMAT).map_err(|e| {
            TimeError::InvalidFormat {
                value: s.to_string(),
                reason: e.to_string(),
            }
        })?;
        Self::new(dt)
    }

    /// Parse either the strict form or `YYYY-MM-DDThh:mm:ss`, which is taken as UTC
    pub fn parse_lenient(s: &str) -> Result<Self, TimeError> {
        let s = s.trim();
        if s.len() == TIMESTAMP_LENGTH {
            return Self::parse(s);
        }
        let naive = NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT_NO_OFFSET).map_err(|e| {
            TimeError::InvalidFormat {
                value: s.to_string(),
                reason: e.to_string(),
            }
        })?;
        Self::new(DateTime::from_naive_utc_and_offset(naive, Utc.fix()))
    }

    /// Construct from any offset-aware time, dropping sub-second precision
    ///
    /// The offset must be whole minutes and the local year must fit in four
    /// digits, so that `as_string` always yields 25 bytes naming this instant.
    pub fn new(dt: DateTime<FixedOffset>) -> Result<Self, TimeError> {
        let offset = dt.offset().local_minus_utc();
        if offset % 60 != 0 {
            return Err(TimeError::OffsetNotWholeMinutes(offset));
        }
        let year = chrono::Datelike::year(&dt);
        if !(0..=9999).contains(&year) {
            return Err(TimeError::YearOutOfRange(year));
        }
        Ok(LocalTime(dt.trunc_subsecs(0)))
    }

    /// Construct from a UTC time, written with a `+00:00` offset
    pub fn from_utc(dt: DateTime<Utc>) -> Result<Self, TimeError> {
        Self::new(dt.with_timezone(&Utc.fix()))
    }

    /// The same instant expressed in a different offset
    pub fn with_offset(&self, offset: FixedOffset) -> Result<Self, TimeError> {
        Self::new(self.0.with_timezone(&offset))
    }

    /// Current time in UTC
    pub fn now() -> Result<Self, TimeError> {
        Self::from_utc(Utc::now())
    }

    /// Format as the 25-byte `YYYY-MM-DDThh:mm:ss±hh:mm` string
    pub fn as_string(&self) -> String {
        self.0.format(TIMESTAMP_FORMAT).to_string()
    }

    /// Calendar date in this value's own offset
    pub fn date(&self) -> NaiveDate {
        self.0.date_naive()
    }

    /// True if this value falls on `date` or a later day
    pub fn day_on_or_after(&self, date: NaiveDate) -> bool {
        self.date() >= date
    }

    /// True if this value falls on `date` or an earlier day
    pub fn day_on_or_before(&self, date: NaiveDate) -> bool {
        self.date() <= date
    }

    pub fn as_datetime(&self) -> &DateTime<FixedOffset> {
        &self.0
    }

    pub fn to_utc(&self) -> DateTime<Utc> {
        self.0.with_timezone(&Utc)
    }
}

impl fmt::Display for LocalTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_string())
    }
}

impl fmt::Debug for LocalTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LocalTime({})", self.as_string())
    }
}

impl FromStr for LocalTime {
    type Err = TimeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_lenient(s)
    }
}

impl Serialize for LocalTime {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.as_string())
    }
}

impl<'de> Deserialize<'de> for LocalTime {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        LocalTime::parse(&s).map_err(serde::de::Error::custom)
    }
}
