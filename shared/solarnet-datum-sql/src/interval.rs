//! Calendar partitioning of local date ranges across two aggregation levels
//!
//! A range is split into at most three contiguous intervals: a leading
//! remainder at the fine level, the longest run of whole coarse periods, and a
//! trailing remainder at the fine level. All values are zone-local date-times;
//! the database resolves them against each stream's own time zone.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::Serialize;
use std::fmt;

use solarnet_core::{Aggregation, DatumError, Result};

/// Half-open `[start, end)` range of local date-times served by one aggregation level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalDateInterval {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub aggregation: Aggregation,
}

impl LocalDateInterval {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime, aggregation: Aggregation) -> Self {
        Self {
            start,
            end,
            aggregation,
        }
    }
}

impl fmt::Display for LocalDateInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}) {}", self.start, self.end, self.aggregation)
    }
}

/// Start of the `level` period containing `date`.
pub fn truncate(level: Aggregation, date: NaiveDateTime) -> Result<NaiveDateTime> {
    let day = date.date();
    let truncated = match level {
        Aggregation::Hour => day.and_hms_opt(date.hour(), 0, 0),
        Aggregation::Day => Some(day.and_time(NaiveTime::MIN)),
        Aggregation::Month => {
            NaiveDate::from_ymd_opt(day.year(), day.month(), 1).map(|d| d.and_time(NaiveTime::MIN))
        }
        Aggregation::Year => {
            NaiveDate::from_ymd_opt(day.year(), 1, 1).map(|d| d.and_time(NaiveTime::MIN))
        }
        other => return Err(DatumError::UnsupportedAggregation(other.to_string())),
    };
    truncated.ok_or_else(|| out_of_range(level, date))
}

/// Boundary one `level` period after `boundary`.
pub fn next_boundary(level: Aggregation, boundary: NaiveDateTime) -> Result<NaiveDateTime> {
    let next = match level {
        Aggregation::Hour => boundary.checked_add_signed(Duration::hours(1)),
        Aggregation::Day => boundary.checked_add_days(chrono::Days::new(1)),
        Aggregation::Month => boundary.checked_add_months(chrono::Months::new(1)),
        Aggregation::Year => boundary.checked_add_months(chrono::Months::new(12)),
        other => return Err(DatumError::UnsupportedAggregation(other.to_string())),
    };
    next.ok_or_else(|| out_of_range(level, boundary))
}

/// Nearest `level` boundary at or after `date`.
pub fn ceil(level: Aggregation, date: NaiveDateTime) -> Result<NaiveDateTime> {
    let floor = truncate(level, date)?;
    if floor < date {
        next_boundary(level, floor)
    } else {
        Ok(floor)
    }
}

/// Split `[start, end)` into intervals served by `coarse` where whole coarse
/// periods fit and by `fine` elsewhere.
///
/// The result is sorted, contiguous and covers the input range exactly.
pub fn partition(
    coarse: Aggregation,
    fine: Aggregation,
    start: NaiveDateTime,
    end: NaiveDateTime,
) -> Result<Vec<LocalDateInterval>> {
    if start >= end {
        return Err(DatumError::invalid_range(
            "start must precede end",
            format_args!("[{start}, {end})"),
        ));
    }
    if !coarse.contains(fine) {
        return Err(DatumError::InvalidLevelOrder {
            coarse: coarse.to_string(),
            fine: fine.to_string(),
        });
    }

    let aligned_start = ceil(coarse, start)?;
    let aligned_end = truncate(coarse, end)?;

    if aligned_start >= aligned_end {
        return Ok(vec![LocalDateInterval::new(start, end, fine)]);
    }

    let mut intervals = Vec::with_capacity(3);
    if start < aligned_start {
        intervals.push(LocalDateInterval::new(start, aligned_start, fine));
    }
    intervals.push(LocalDateInterval::new(aligned_start, aligned_end, coarse));
    if aligned_end < end {
        intervals.push(LocalDateInterval::new(aligned_end, end, fine));
    }
    Ok(intervals)
}

/// Re-partition every interval tagged `level` into `level` and `finer`,
/// leaving other intervals untouched.
pub fn refine(
    intervals: Vec<LocalDateInterval>,
    level: Aggregation,
    finer: Aggregation,
) -> Result<Vec<LocalDateInterval>> {
    let mut refined = Vec::with_capacity(intervals.len() + 2);
    for interval in intervals {
        if interval.aggregation == level {
            refined.extend(partition(level, finer, interval.start, interval.end)?);
        } else {
            refined.push(interval);
        }
    }
    Ok(refined)
}

fn out_of_range(level: Aggregation, date: NaiveDateTime) -> DatumError {
    DatumError::invalid_range(
        format!("{level} boundary out of range"),
        format_args!("{date}"),
    )
}
