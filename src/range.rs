//! Date-range presets and query parameters shared by the finance endpoints.

use std::str::FromStr;

use serde::Deserialize;
use time::{Date, Duration, Month, OffsetDateTime, Time};
use time_tz::{Offset, OffsetDateTimeExt, OffsetResult, PrimitiveDateTimeExt, TimeZone, Tz};

use crate::{
    Error,
    query_params::{empty_as_none, optional_rfc3339},
};

/// A named shorthand that resolves to a concrete `[from, to]` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangePreset {
    Day,
    Week,
    Month,
    LastMonth,
}

impl RangePreset {
    pub fn label(self) -> &'static str {
        match self {
            Self::Day => "Today",
            Self::Week => "This week",
            Self::Month => "This month",
            Self::LastMonth => "Last month",
        }
    }
}

impl FromStr for RangePreset {
    type Err = String;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        match text {
            "day" => Ok(Self::Day),
            "week" => Ok(Self::Week),
            "month" => Ok(Self::Month),
            "lastMonth" => Ok(Self::LastMonth),
            other => Err(format!(
                "unknown range {other}, expected one of day, week, month, lastMonth"
            )),
        }
    }
}

/// An inclusive range of timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub from: OffsetDateTime,
    pub to: OffsetDateTime,
}

impl TimeRange {
    pub fn contains(&self, timestamp: OffsetDateTime) -> bool {
        self.from <= timestamp && timestamp <= self.to
    }
}

/// The range parameters accepted by the finance endpoints.
///
/// A preset takes priority over explicit `from`/`to` timestamps.
#[derive(Debug, Default, Deserialize)]
pub struct RangeQuery {
    #[serde(default, deserialize_with = "empty_as_none")]
    pub range: Option<RangePreset>,
    #[serde(default, deserialize_with = "optional_rfc3339")]
    pub from: Option<OffsetDateTime>,
    #[serde(default, deserialize_with = "optional_rfc3339")]
    pub to: Option<OffsetDateTime>,
}

impl RangeQuery {
    /// Resolve the query into a concrete range, `None` meaning all time.
    ///
    /// Presets are resolved against the calendar of `timezone`.
    ///
    /// # Errors
    /// Returns [Error::InvalidRange] if `from` is after `to`.
    pub fn resolve(
        &self,
        now: OffsetDateTime,
        timezone: &Tz,
    ) -> Result<Option<TimeRange>, Error> {
        if let Some(preset) = self.range {
            return Ok(Some(resolve_range(preset, now, timezone)));
        }

        let range = match (self.from, self.to) {
            (None, None) => return Ok(None),
            (Some(from), None) => TimeRange { from, to: now },
            (None, Some(to)) => TimeRange {
                from: OffsetDateTime::UNIX_EPOCH,
                to,
            },
            (Some(from), Some(to)) => TimeRange { from, to },
        };

        if range.from > range.to {
            return Err(Error::InvalidRange(format!(
                "{} is after {}",
                range.from, range.to
            )));
        }

        Ok(Some(range))
    }

    /// A human readable description of the range for report headings.
    pub fn label(&self, resolved: Option<TimeRange>) -> String {
        match (self.range, resolved) {
            (Some(preset), _) => preset.label().to_owned(),
            (None, Some(range)) => format!("{} to {}", range.from.date(), range.to.date()),
            (None, None) => "All time".to_owned(),
        }
    }
}

/// Resolve `preset` relative to `now`.
///
/// Each boundary is midnight in `timezone` on its own date, so a range that
/// spans a daylight saving change has boundaries with different offsets.
pub fn resolve_range(preset: RangePreset, now: OffsetDateTime, timezone: &Tz) -> TimeRange {
    let now = now.to_timezone(timezone);
    let today = now.date();

    match preset {
        RangePreset::Day => TimeRange {
            from: start_of_day(timezone, today),
            to: now,
        },
        RangePreset::Week => {
            let days_since_monday = today.weekday().number_days_from_monday() as i64;
            TimeRange {
                from: start_of_day(timezone, today - Duration::days(days_since_monday)),
                to: now,
            }
        }
        RangePreset::Month => TimeRange {
            from: start_of_day(timezone, first_of_month(today)),
            to: now,
        },
        RangePreset::LastMonth => {
            let this_month = start_of_day(timezone, first_of_month(today));
            let last_day_of_previous_month = first_of_month(today) - Duration::days(1);
            TimeRange {
                from: start_of_day(timezone, first_of_month(last_day_of_previous_month)),
                to: this_month - Duration::milliseconds(1),
            }
        }
    }
}

/// The first day of the month that `date` falls in.
pub fn first_of_month(date: Date) -> Date {
    date - Duration::days(date.day() as i64 - 1)
}

/// The first day of the month `months_back` months before the month of `date`.
pub fn first_of_month_before(date: Date, months_back: u32) -> Date {
    let mut first = first_of_month(date);

    for _ in 0..months_back {
        first = first_of_month(first - Duration::days(1));
    }

    first
}

/// The first day of the month after the month of `date`.
pub fn first_of_next_month(date: Date) -> Date {
    first_of_month(date) + Duration::days(days_in_month(date.year(), date.month()) as i64)
}

/// The number of days in `month` of `year`.
pub fn days_in_month(year: i32, month: Month) -> u8 {
    match month {
        Month::February if time::util::is_leap_year(year) => 29,
        Month::February => 28,
        Month::April | Month::June | Month::September | Month::November => 30,
        _ => 31,
    }
}

/// The first instant of `date` in `timezone`.
///
/// When the clocks go forward at midnight the day starts at the end of the gap,
/// when midnight happens twice the day starts at the first one.
pub fn start_of_day(timezone: &Tz, date: Date) -> OffsetDateTime {
    let midnight = date.with_time(Time::MIDNIGHT);

    match midnight.assume_timezone(timezone) {
        OffsetResult::Some(start) => start,
        OffsetResult::Ambiguous(first, second) => first.min(second),
        OffsetResult::None => {
            let offset_before_gap = timezone
                .get_offset_utc(&(midnight.assume_utc() - Duration::days(1)))
                .to_utc();
            midnight.assume_offset(offset_before_gap)
        }
    }
}

pub fn month_abbrev(month: Month) -> &'static str {
    match month {
        Month::January => "Jan",
        Month::February => "Feb",
        Month::March => "Mar",
        Month::April => "Apr",
        Month::May => "May",
        Month::June => "Jun",
        Month::July => "Jul",
        Month::August => "Aug",
        Month::September => "Sep",
        Month::October => "Oct",
        Month::November => "Nov",
        Month::December => "Dec",
    }
}
