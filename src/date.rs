//! A UTC, 1-second-resolution date type with a null sentinel, ISO-8601
//! round-tripping, and a test-only frozen clock (§3, §9 "shared global now").

use std::fmt;
use std::ops::{Add, Sub};
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{NaiveDateTime, TimeZone, Utc};

use crate::error::{Error, ParseError};

/// A signed count of seconds, the result of subtracting two [`Date`]s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DateDiff(i64);

impl DateDiff {
    pub const fn from_seconds(secs: i64) -> Self {
        DateDiff(secs)
    }

    pub const fn from_days(days: i64) -> Self {
        DateDiff(days * 86_400)
    }

    pub const fn as_seconds(self) -> i64 {
        self.0
    }
}

impl Add for DateDiff {
    type Output = DateDiff;
    fn add(self, rhs: DateDiff) -> DateDiff {
        DateDiff(self.0 + rhs.0)
    }
}

impl Sub for DateDiff {
    type Output = DateDiff;
    fn sub(self, rhs: DateDiff) -> DateDiff {
        DateDiff(self.0 - rhs.0)
    }
}

/// A UTC point in time with 1-second resolution, spanning years 1-9999.
///
/// The null date (`Date::null()`) compares less than every other date, matching
/// the "unset" sentinel used for fields like expiry timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Date(Option<i64>);

impl Date {
    /// The sentinel date that is less than all others.
    pub const fn null() -> Self {
        Date(None)
    }

    pub fn is_null(self) -> bool {
        self.0.is_none()
    }

    fn from_naive(dt: NaiveDateTime) -> Self {
        Date(Some(dt.and_utc().timestamp()))
    }

    fn to_naive(self) -> Option<NaiveDateTime> {
        self.0
            .map(|s| Utc.timestamp_opt(s, 0).single().unwrap().naive_utc())
    }

    pub fn from_ymd_hms(year: i32, month: u32, day: u32, hour: u32, min: u32, sec: u32) -> Option<Self> {
        chrono::NaiveDate::from_ymd_opt(year, month, day)
            .and_then(|d| d.and_hms_opt(hour, min, sec))
            .map(Self::from_naive)
    }

    /// The current time, as seen through the ambient [`Clock`].
    pub fn now() -> Self {
        CLOCK.now()
    }

    /// Parse `YYYY-MM-DDThh:mm:ssZ`. An empty string parses to the null date.
    pub fn from_iso8601(s: &str) -> Result<Self, ParseError> {
        let s = s.trim();
        if s.is_empty() {
            return Ok(Date::null());
        }
        let dt = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%SZ")
            .map_err(|e| ParseError::new(format!("invalid ISO-8601 date {s:?}: {e}")))?;
        Ok(Self::from_naive(dt))
    }

    /// Render as `YYYY-MM-DDThh:mm:ssZ`. The null date renders as an empty string;
    /// this is the unspecified-but-round-tripping form mentioned in §6.
    pub fn to_iso8601(self) -> String {
        match self.to_naive() {
            Some(dt) => dt.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
            None => String::new(),
        }
    }

    pub fn year(self) -> Option<i32> {
        self.to_naive().map(|dt| chrono::Datelike::year(&dt))
    }

    pub fn month(self) -> Option<u32> {
        self.to_naive().map(|dt| chrono::Datelike::month(&dt))
    }
}

impl fmt::Display for Date {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_iso8601())
    }
}

impl PartialOrd for Date {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Date {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        match (self.0, other.0) {
            (None, None) => std::cmp::Ordering::Equal,
            (None, Some(_)) => std::cmp::Ordering::Less,
            (Some(_), None) => std::cmp::Ordering::Greater,
            (Some(a), Some(b)) => a.cmp(&b),
        }
    }
}

impl Add<DateDiff> for Date {
    type Output = Date;
    fn add(self, rhs: DateDiff) -> Date {
        match self.0 {
            None => self,
            Some(s) => Date(Some(s + rhs.as_seconds())),
        }
    }
}

impl Sub<DateDiff> for Date {
    type Output = Date;
    fn sub(self, rhs: DateDiff) -> Date {
        self + DateDiff(-rhs.as_seconds())
    }
}

impl Sub<Date> for Date {
    type Output = DateDiff;
    fn sub(self, rhs: Date) -> DateDiff {
        match (self.0, rhs.0) {
            (Some(a), Some(b)) => DateDiff(a - b),
            _ => DateDiff(0),
        }
    }
}

impl TryFrom<&str> for Date {
    type Error = Error;
    fn try_from(s: &str) -> Result<Self, Error> {
        Ok(Date::from_iso8601(s)?)
    }
}

/// Source of "now" for [`Date::now`]. Tests use [`freeze_now`]/[`unfreeze_now`]
/// rather than threading a clock parameter through every call site, matching
/// the original's single `setFrozenValueOfNow` test hook.
static FROZEN: AtomicI64 = AtomicI64::new(i64::MIN);

struct AmbientClock;

impl AmbientClock {
    fn now(&self) -> Date {
        let frozen = FROZEN.load(Ordering::SeqCst);
        if frozen != i64::MIN {
            return Date(Some(frozen));
        }
        Date(Some(Utc::now().timestamp()))
    }
}

static CLOCK: AmbientClock = AmbientClock;

/// Freeze [`Date::now`] to the given instant. Test-only.
pub fn freeze_now(at: Date) {
    FROZEN.store(at.0.unwrap_or(i64::MIN), Ordering::SeqCst);
}

/// Release a previous [`freeze_now`], returning to the system clock.
pub fn unfreeze_now() {
    FROZEN.store(i64::MIN, Ordering::SeqCst);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_is_less_than_everything() {
        let d = Date::from_ymd_hms(2020, 1, 1, 0, 0, 0).unwrap();
        assert!(Date::null() < d);
        assert_eq!(Date::null(), Date::null());
    }

    #[test]
    fn iso8601_roundtrip() {
        let d = Date::from_ymd_hms(2020, 6, 15, 12, 34, 56).unwrap();
        assert_eq!(Date::from_iso8601(&d.to_iso8601()).unwrap(), d);
        assert_eq!(d.to_iso8601(), "2020-06-15T12:34:56Z");
    }

    #[test]
    fn null_roundtrips_through_empty_string() {
        assert_eq!(Date::from_iso8601("").unwrap(), Date::null());
        assert_eq!(Date::null().to_iso8601(), "");
    }

    #[test]
    fn arithmetic_is_total() {
        let d1 = Date::from_ymd_hms(2020, 1, 1, 0, 0, 0).unwrap();
        let d2 = Date::from_ymd_hms(2020, 1, 2, 0, 0, 0).unwrap();
        let diff = d2 - d1;
        assert_eq!(diff, DateDiff::from_days(1));
        assert_eq!(d1 + diff, d2);
        assert_eq!((d1 - d2) + d2, d1);
    }

    #[test]
    fn frozen_clock() {
        let frozen = Date::from_ymd_hms(2030, 5, 5, 5, 5, 5).unwrap();
        freeze_now(frozen);
        assert_eq!(Date::now(), frozen);
        unfreeze_now();
    }
}
