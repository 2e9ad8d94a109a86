//! Calendar boundaries in the caller's time zone, converted to UTC instants
//! for store filters.

use chrono::{DateTime, Datelike, Days, NaiveDate, TimeZone, Utc};

use crate::errors::{AppError, Result};

/// First instant of `date` in `tz`. Skips forward through a DST gap at
/// midnight.
pub fn start_of_day<Tz: TimeZone>(tz: &Tz, date: NaiveDate) -> Result<DateTime<Utc>> {
    for hour in 0..3 {
        let Some(naive) = date.and_hms_opt(hour, 0, 0) else {
            continue;
        };
        if let Some(instant) = tz.from_local_datetime(&naive).earliest() {
            return Ok(instant.with_timezone(&Utc));
        }
    }
    Err(AppError::invalid_data(format!("no local midnight on {}", date)))
}

fn first_of_month(year: i32, month: u32) -> Result<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| AppError::invalid_data(format!("invalid month {}-{}", year, month)))
}

fn previous_month(year: i32, month: u32) -> (i32, u32) {
    if month == 1 {
        (year - 1, 12)
    } else {
        (year, month - 1)
    }
}

fn next_month(year: i32, month: u32) -> (i32, u32) {
    if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    }
}

/// `now` plus the current and previous calendar-month starts. The previous
/// month is `[previous_start, current_start)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthWindow {
    pub now: DateTime<Utc>,
    pub current_start: DateTime<Utc>,
    pub previous_start: DateTime<Utc>,
}

impl MonthWindow {
    pub fn containing<Tz: TimeZone>(now: &DateTime<Tz>) -> Result<Self> {
        let tz = now.timezone();
        let local = now.date_naive();
        let (prev_year, prev_month) = previous_month(local.year(), local.month());

        Ok(MonthWindow {
            now: now.with_timezone(&Utc),
            current_start: start_of_day(&tz, first_of_month(local.year(), local.month())?)?,
            previous_start: start_of_day(&tz, first_of_month(prev_year, prev_month)?)?,
        })
    }
}

/// Half-open `[start, end)` range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

pub fn day_span<Tz: TimeZone>(now: &DateTime<Tz>) -> Result<Span> {
    let tz = now.timezone();
    let today = now.date_naive();
    let tomorrow = today
        .checked_add_days(Days::new(1))
        .ok_or_else(|| AppError::invalid_data("date out of range"))?;

    Ok(Span {
        start: start_of_day(&tz, today)?,
        end: start_of_day(&tz, tomorrow)?,
    })
}

/// Week starting on Sunday.
pub fn week_span<Tz: TimeZone>(now: &DateTime<Tz>) -> Result<Span> {
    let tz = now.timezone();
    let today = now.date_naive();
    let offset = u64::from(today.weekday().num_days_from_sunday());
    let sunday = today
        .checked_sub_days(Days::new(offset))
        .ok_or_else(|| AppError::invalid_data("date out of range"))?;
    let next_sunday = sunday
        .checked_add_days(Days::new(7))
        .ok_or_else(|| AppError::invalid_data("date out of range"))?;

    Ok(Span {
        start: start_of_day(&tz, sunday)?,
        end: start_of_day(&tz, next_sunday)?,
    })
}

pub fn month_span<Tz: TimeZone>(now: &DateTime<Tz>) -> Result<Span> {
    let tz = now.timezone();
    let local = now.date_naive();
    let (next_year, next) = next_month(local.year(), local.month());

    Ok(Span {
        start: start_of_day(&tz, first_of_month(local.year(), local.month())?)?,
        end: start_of_day(&tz, first_of_month(next_year, next)?)?,
    })
}
