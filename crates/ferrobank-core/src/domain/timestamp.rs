use std::fmt::{Display, Formatter};
use std::ops::{Add, Sub};
use std::time::Duration;

use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, Month, OffsetDateTime, PrimitiveDateTime, Time, UtcOffset};

use crate::ValidationError;

/// Instant normalized to UTC. Provider payloads with an explicit offset are
/// converted, naive timestamps and plain dates are read as UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UtcDateTime(OffsetDateTime);

impl UtcDateTime {
    pub fn now() -> Self {
        Self(OffsetDateTime::now_utc())
    }

    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let input = input.trim();
        if let Ok(parsed) = OffsetDateTime::parse(input, &Rfc3339) {
            return Ok(Self(parsed.to_offset(UtcOffset::UTC)));
        }

        let naive = format_description!(
            "[year]-[month]-[day]T[hour]:[minute]:[second][optional [.[subsecond]]]"
        );
        if let Ok(parsed) = PrimitiveDateTime::parse(input, naive) {
            return Ok(Self(parsed.assume_utc()));
        }

        let date_only = format_description!("[year]-[month]-[day]");
        if let Ok(date) = Date::parse(input, date_only) {
            return Ok(Self(date.midnight().assume_utc()));
        }

        Err(ValidationError::InvalidTimestamp {
            value: input.to_owned(),
        })
    }

    pub fn from_unix_timestamp(seconds: i64) -> Result<Self, ValidationError> {
        OffsetDateTime::from_unix_timestamp(seconds)
            .map(Self)
            .map_err(|_| ValidationError::InvalidTimestamp {
                value: seconds.to_string(),
            })
    }

    pub fn from_date(date: Date) -> Self {
        Self(date.midnight().assume_utc())
    }

    pub fn from_offset_datetime(value: OffsetDateTime) -> Self {
        Self(value.to_offset(UtcOffset::UTC))
    }

    pub fn into_inner(self) -> OffsetDateTime {
        self.0
    }

    pub fn unix_timestamp(self) -> i64 {
        self.0.unix_timestamp()
    }

    pub fn date(self) -> Date {
        self.0.date()
    }

    pub fn day(self) -> u8 {
        self.0.day()
    }

    /// First instant of the calendar month containing this timestamp.
    pub fn month_start(self) -> Self {
        let date = self.0.date();
        Self::from_date(first_of_month(date.year(), date.month()))
    }

    /// Same wall-clock time `months` calendar months earlier, clamping the
    /// day to the length of the target month.
    pub fn months_before(self, months: u32) -> Self {
        let date = shift_months(self.0.date(), -(months as i32));
        Self(PrimitiveDateTime::new(date, self.0.time()).assume_utc())
    }

    pub fn months_after(self, months: u32) -> Self {
        let date = shift_months(self.0.date(), months as i32);
        Self(PrimitiveDateTime::new(date, self.0.time()).assume_utc())
    }

    /// Last instant (23:59:59) of the given date.
    pub fn end_of_day(date: Date) -> Self {
        let last_second = Time::from_hms(23, 59, 59).unwrap_or(Time::MIDNIGHT);
        Self(PrimitiveDateTime::new(date, last_second).assume_utc())
    }

    /// Seconds elapsed from `earlier` to `self`, negative when `earlier` is later.
    pub fn seconds_since(self, earlier: Self) -> i64 {
        (self.0 - earlier.0).whole_seconds()
    }

    /// `None` when the result falls outside the representable range.
    pub fn checked_add(self, rhs: Duration) -> Option<Self> {
        let rhs = time::Duration::try_from(rhs).ok()?;
        self.0.checked_add(rhs).map(Self)
    }

    pub fn checked_sub(self, rhs: Duration) -> Option<Self> {
        let rhs = time::Duration::try_from(rhs).ok()?;
        self.0.checked_sub(rhs).map(Self)
    }

    pub fn format_rfc3339(self) -> String {
        self.0
            .format(&Rfc3339)
            .unwrap_or_else(|_| self.0.unix_timestamp().to_string())
    }
}

pub(crate) fn first_of_month(year: i32, month: Month) -> Date {
    Date::from_calendar_date(year, month, 1).unwrap_or(Date::MIN)
}

fn shift_months(date: Date, months: i32) -> Date {
    let zero_based = date.year() * 12 + i32::from(date.month() as u8) - 1 + months;
    let year = zero_based.div_euclid(12);
    let month_number = (zero_based.rem_euclid(12) + 1) as u8;
    let month = Month::try_from(month_number).unwrap_or(Month::January);
    let day = date.day().min(time::util::days_in_year_month(year, month));
    Date::from_calendar_date(year, month, day).unwrap_or(date)
}

impl Add<Duration> for UtcDateTime {
    type Output = Self;

    /// Saturates at the latest representable instant.
    fn add(self, rhs: Duration) -> Self::Output {
        self.checked_add(rhs)
            .unwrap_or_else(|| Self(PrimitiveDateTime::MAX.assume_utc()))
    }
}

impl Sub<Duration> for UtcDateTime {
    type Output = Self;

    /// Saturates at the earliest representable instant.
    fn sub(self, rhs: Duration) -> Self::Output {
        self.checked_sub(rhs)
            .unwrap_or_else(|| Self(PrimitiveDateTime::MIN.assume_utc()))
    }
}

impl Display for UtcDateTime {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.format_rfc3339())
    }
}

impl Serialize for UtcDateTime {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.format_rfc3339())
    }
}

impl<'de> Deserialize<'de> for UtcDateTime {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        Self::parse(&value).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_utc_timestamp() {
        let parsed = UtcDateTime::parse("2024-01-01T00:00:00Z").expect("must parse");
        assert_eq!(parsed.format_rfc3339(), "2024-01-01T00:00:00Z");
    }

    #[test]
    fn converts_offset_timestamp_to_utc() {
        let parsed = UtcDateTime::parse("2024-01-01T03:00:00+03:00").expect("must parse");
        assert_eq!(parsed.format_rfc3339(), "2024-01-01T00:00:00Z");
    }

    #[test]
    fn accepts_naive_and_date_only_inputs() {
        let naive = UtcDateTime::parse("2024-02-06T12:30:00").expect("naive");
        assert_eq!(naive.format_rfc3339(), "2024-02-06T12:30:00Z");

        let date = UtcDateTime::parse("2024-02-06").expect("date");
        assert_eq!(date.format_rfc3339(), "2024-02-06T00:00:00Z");
    }

    #[test]
    fn rejects_garbage() {
        let err = UtcDateTime::parse("yesterday").expect_err("must fail");
        assert!(matches!(err, ValidationError::InvalidTimestamp { .. }));
    }

    #[test]
    fn month_arithmetic_clamps_day() {
        let end_of_march = UtcDateTime::parse("2024-03-31T10:00:00Z").expect("valid");
        assert_eq!(
            end_of_march.months_before(1).format_rfc3339(),
            "2024-02-29T10:00:00Z"
        );
        assert_eq!(
            end_of_march.months_before(3).format_rfc3339(),
            "2023-12-31T10:00:00Z"
        );
        assert_eq!(
            end_of_march.month_start().format_rfc3339(),
            "2024-03-01T00:00:00Z"
        );
    }

    #[test]
    fn arithmetic_past_the_calendar_range_saturates() {
        let start = UtcDateTime::parse("2024-01-01T00:00:00Z").expect("valid");

        assert_eq!(start.checked_add(Duration::from_secs(u64::MAX)), None);
        assert_eq!(start.checked_sub(Duration::from_secs(u64::MAX)), None);

        let far_future = start + Duration::from_secs(u64::MAX);
        assert!(far_future > start);
        assert_eq!(far_future, far_future + Duration::from_secs(1));

        let far_past = start - Duration::from_secs(u64::MAX);
        assert!(far_past < start);
    }
}
