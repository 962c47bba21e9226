//! Month-end calendar arithmetic and timestamp parsing.
//!
//! Every series is keyed by the last calendar day of its month before it is
//! joined. Raw timestamps may be naive or carry a UTC offset; offsets are
//! resolved to UTC and then dropped so both kinds compare correctly.

use crate::error::{PanelError, Result};
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, NaiveTime};
use polars::prelude::*;

/// Days between 0001-01-01 (CE day 1) and the Unix epoch.
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

/// Zoned formats tried after RFC 3339.
const ZONED_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%:z", "%Y-%m-%d %H:%M:%S%z", "%Y-%m-%d %H:%M:%S%.f%:z"];

/// Naive datetime formats.
const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
];

/// Naive date formats.
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"];

/// Last calendar day of the month containing `date`.
pub fn month_end(date: NaiveDate) -> NaiveDate {
    let (year, month) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1)
        .and_then(|first_of_next| first_of_next.pred_opt())
        .unwrap_or(NaiveDate::MAX)
}

/// Whether `date` is already the last day of its month.
pub fn is_month_end(date: NaiveDate) -> bool {
    month_end(date) == date
}

/// Parse a raw timestamp string into a naive UTC datetime.
///
/// Accepts RFC 3339, `YYYY-MM-DD HH:MM:SS±HH:MM`, naive datetimes, plain
/// dates and `YYYY-MM` (taken as the first day of the month).
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_utc());
    }
    for fmt in ZONED_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(raw, fmt) {
            return Some(dt.naive_utc());
        }
    }
    for fmt in NAIVE_DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(dt);
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(raw, fmt) {
            return Some(d.and_time(NaiveTime::MIN));
        }
    }
    NaiveDate::parse_from_str(&format!("{raw}-01"), "%Y-%m-%d")
        .ok()
        .map(|d| d.and_time(NaiveTime::MIN))
}

/// Convert a physical `Date` value (days since the Unix epoch) to a date.
pub fn date_from_epoch_days(days: i32) -> Option<NaiveDate> {
    NaiveDate::from_num_days_from_ce_opt(days.checked_add(UNIX_EPOCH_DAYS_FROM_CE)?)
}

/// Convert a date to its physical `Date` value.
pub fn epoch_days(date: NaiveDate) -> i32 {
    date.num_days_from_ce() - UNIX_EPOCH_DAYS_FROM_CE
}

fn datetime_from_epoch(value: i64, unit: TimeUnit) -> Option<NaiveDateTime> {
    let utc = match unit {
        TimeUnit::Nanoseconds => Some(DateTime::from_timestamp_nanos(value)),
        TimeUnit::Microseconds => DateTime::from_timestamp_micros(value),
        TimeUnit::Milliseconds => DateTime::from_timestamp_millis(value),
    };
    utc.map(|dt| dt.naive_utc())
}

/// Read a date-like column as naive UTC timestamps.
///
/// String columns are parsed with [`parse_timestamp`]; an unparseable
/// non-empty value is an error. `Date` and `Datetime` columns are converted
/// directly, resolving any time zone to UTC. Nulls stay `None`.
pub fn timestamps(df: &DataFrame, table: &str, column: &str) -> Result<Vec<Option<NaiveDateTime>>> {
    let col = df.column(column).map_err(|_| PanelError::MissingColumn {
        table: table.to_string(),
        column: column.to_string(),
    })?;

    match col.dtype() {
        DataType::String => col
            .str()?
            .into_iter()
            .map(|raw| match raw {
                None => Ok(None),
                Some(raw) if raw.trim().is_empty() => Ok(None),
                Some(raw) => parse_timestamp(raw).map(Some).ok_or_else(|| {
                    PanelError::InvalidTimestamp {
                        column: column.to_string(),
                        value: raw.to_string(),
                    }
                }),
            })
            .collect(),
        DataType::Date => {
            let days = col.cast(&DataType::Int32)?;
            Ok(days
                .i32()?
                .into_iter()
                .map(|d| d.and_then(date_from_epoch_days).map(|d| d.and_time(NaiveTime::MIN)))
                .collect())
        }
        DataType::Datetime(unit, _) => {
            let unit = *unit;
            let raw = col.cast(&DataType::Int64)?;
            Ok(raw
                .i64()?
                .into_iter()
                .map(|v| v.and_then(|v| datetime_from_epoch(v, unit)))
                .collect())
        }
        other => Err(PanelError::InvalidTimestamp {
            column: column.to_string(),
            value: format!("<{other}>"),
        }),
    }
}

/// Read a date-like column as calendar dates.
pub fn dates(df: &DataFrame, table: &str, column: &str) -> Result<Vec<Option<NaiveDate>>> {
    Ok(timestamps(df, table, column)?
        .into_iter()
        .map(|ts| ts.map(|ts| ts.date()))
        .collect())
}

/// Build a `Date` column from calendar dates.
pub fn date_column(name: &str, dates: &[NaiveDate]) -> Result<Column> {
    let days: Vec<i32> = dates.iter().copied().map(epoch_days).collect();
    let series = Series::new(name.into(), days).cast(&DataType::Date)?;
    Ok(series.into())
}
