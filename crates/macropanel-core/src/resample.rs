//! Native-frequency to month-end resampling.
//!
//! Rows are ordered by timestamp, gaps are forward-filled along the native
//! timeline (a market holiday or reporting lag means "unchanged", not
//! "missing"), and the filled rows are bucketed by the last day of their
//! month. Only months that have at least one native row are emitted.

use crate::calendar::{self, month_end};
use crate::error::Result;
use crate::frame::{column_names, float_column, float_values};
use crate::series::Aggregation;
use chrono::NaiveDate;
use polars::prelude::*;
use tracing::debug;

/// Resample a time-indexed table to one row per calendar month.
///
/// Every column other than `date_column` is treated as a value column and
/// cast to `Float64`. The output holds `date_column` (as `Date`, dated at
/// month-end) followed by the value columns, strictly ascending with no
/// duplicate months.
///
/// # Errors
///
/// Fails if the date column is missing or holds an unparseable value.
pub fn resample(table: &DataFrame, date_column: &str, method: Aggregation) -> Result<DataFrame> {
    let stamps = calendar::timestamps(table, "resample", date_column)?;

    let value_columns: Vec<String> = column_names(table)
        .into_iter()
        .filter(|name| name != date_column)
        .collect();
    let values = value_columns
        .iter()
        .map(|name| float_values(table, "resample", name))
        .collect::<Result<Vec<_>>>()?;

    // Stable sort keeps source order for equal timestamps.
    let mut order: Vec<usize> = (0..table.height()).filter(|&i| stamps[i].is_some()).collect();
    order.sort_by_key(|&i| stamps[i]);

    let dropped = table.height() - order.len();
    if dropped > 0 {
        debug!(rows = dropped, column = date_column, "dropping rows without a timestamp");
    }

    let filled: Vec<Vec<Option<f64>>> = values
        .iter()
        .map(|column| forward_fill(order.iter().map(|&i| column[i])))
        .collect();

    let buckets = month_buckets(
        order
            .iter()
            .filter_map(|&i| stamps[i])
            .map(|ts| month_end(ts.date())),
    );

    let months: Vec<NaiveDate> = buckets.iter().map(|b| b.month).collect();
    let mut columns = Vec::with_capacity(value_columns.len() + 1);
    columns.push(calendar::date_column(date_column, &months)?);

    for (name, column) in value_columns.iter().zip(&filled) {
        let aggregated: Vec<Option<f64>> = buckets
            .iter()
            .map(|b| aggregate(&column[b.start..b.end], method))
            .collect();
        columns.push(float_column(name, aggregated));
    }

    Ok(DataFrame::new(columns)?)
}

/// Resample with the aggregation method given by name.
///
/// # Errors
///
/// Fails with [`PanelError::UnknownAggregation`](crate::PanelError::UnknownAggregation)
/// before touching the data if `method` is not `last`, `mean` or `sum`.
pub fn resample_named(table: &DataFrame, date_column: &str, method: &str) -> Result<DataFrame> {
    let method: Aggregation = method.parse()?;
    resample(table, date_column, method)
}

/// Carry the last observed value through gaps.
pub fn forward_fill(values: impl IntoIterator<Item = Option<f64>>) -> Vec<Option<f64>> {
    let mut last = None;
    values
        .into_iter()
        .map(|v| {
            if v.is_some() {
                last = v;
            }
            last
        })
        .collect()
}

/// Aggregate one month's values, ignoring missing cells.
///
/// A month whose cells are all missing stays missing for every method.
pub fn aggregate(values: &[Option<f64>], method: Aggregation) -> Option<f64> {
    match method {
        Aggregation::Last => values.iter().rev().find_map(|v| *v),
        Aggregation::Mean => {
            let (sum, count) = values
                .iter()
                .flatten()
                .fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
            (count > 0).then(|| sum / count as f64)
        }
        Aggregation::Sum => {
            let mut present = values.iter().flatten().peekable();
            present.peek()?;
            Some(present.sum())
        }
    }
}

#[derive(Debug)]
struct MonthBucket {
    month: NaiveDate,
    start: usize,
    end: usize,
}

/// Group consecutive positions sharing the same month-end.
fn month_buckets(months: impl Iterator<Item = NaiveDate>) -> Vec<MonthBucket> {
    let mut buckets: Vec<MonthBucket> = Vec::new();
    for (pos, month) in months.enumerate() {
        match buckets.last_mut() {
            Some(bucket) if bucket.month == month => bucket.end = pos + 1,
            _ => buckets.push(MonthBucket {
                month,
                start: pos,
                end: pos + 1,
            }),
        }
    }
    buckets
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::dates;
    use crate::error::PanelError;
    use approx::assert_relative_eq;
    use rstest::rstest;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn values(df: &DataFrame, column: &str) -> Vec<Option<f64>> {
        float_values(df, "test", column).unwrap()
    }

    #[test]
    fn test_forward_fill_then_last() {
        let df = df!(
            "date" => &["2021-01-01", "2021-01-15"],
            "sp500" => &[10.0, 12.0],
        )
        .unwrap();

        let monthly = resample(&df, "date", Aggregation::Last).unwrap();
        assert_eq!(monthly.height(), 1);
        assert_eq!(dates(&monthly, "t", "date").unwrap(), vec![Some(d(2021, 1, 31))]);
        assert_eq!(values(&monthly, "sp500"), vec![Some(12.0)]);
    }

    #[rstest]
    #[case(Aggregation::Mean, 2.0)]
    #[case(Aggregation::Sum, 6.0)]
    #[case(Aggregation::Last, 3.0)]
    fn test_aggregation_policies(#[case] method: Aggregation, #[case] expected: f64) {
        let df = df!(
            "date" => &["2021-03-01", "2021-03-10", "2021-03-20"],
            "flow" => &[1.0, 2.0, 3.0],
        )
        .unwrap();

        let monthly = resample(&df, "date", method).unwrap();
        assert_eq!(monthly.height(), 1);
        assert_relative_eq!(values(&monthly, "flow")[0].unwrap(), expected);
    }

    #[test]
    fn test_month_end_input_is_unchanged_with_last() {
        let dates_in = [d(2021, 1, 31), d(2021, 2, 28), d(2021, 3, 31)];
        let df = DataFrame::new(vec![
            calendar::date_column("date", &dates_in).unwrap(),
            float_column("vix", vec![Some(20.0), Some(25.5), Some(19.25)]),
        ])
        .unwrap();

        let monthly = resample(&df, "date", Aggregation::Last).unwrap();
        assert!(monthly.equals_missing(&df));
    }

    #[test]
    fn test_gaps_are_forward_filled_before_mean() {
        let df = DataFrame::new(vec![
            Series::new("date".into(), &["2021-01-05", "2021-01-20", "2021-02-03", "2021-02-10"]).into(),
            float_column("x", vec![Some(1.0), None, None, Some(4.0)]),
        ])
        .unwrap();

        let monthly = resample(&df, "date", Aggregation::Mean).unwrap();
        let x = values(&monthly, "x");
        assert_relative_eq!(x[0].unwrap(), 1.0);
        // February sees the carried 1.0 on the 3rd, then 4.0
        assert_relative_eq!(x[1].unwrap(), 2.5);
    }

    #[test]
    fn test_empty_months_are_not_fabricated() {
        let df = df!(
            "date" => &["2021-01-10", "2021-03-10"],
            "x" => &[1.0, 3.0],
        )
        .unwrap();

        let monthly = resample(&df, "date", Aggregation::Last).unwrap();
        assert_eq!(
            dates(&monthly, "t", "date").unwrap(),
            vec![Some(d(2021, 1, 31)), Some(d(2021, 3, 31))]
        );
    }

    #[test]
    fn test_unsorted_and_zoned_input() {
        let df = df!(
            "date" => &[
                "2021-02-01 00:00:00-05:00",
                "2021-01-04 00:00:00-05:00",
                "2021-01-29",
            ],
            "x" => &[3.0, 1.0, 2.0],
        )
        .unwrap();

        let monthly = resample(&df, "date", Aggregation::Last).unwrap();
        assert_eq!(monthly.height(), 2);
        assert_eq!(values(&monthly, "x"), vec![Some(2.0), Some(3.0)]);
    }

    #[test]
    fn test_multiple_value_columns_keep_order() {
        let df = df!(
            "x" => &[1.0, 2.0],
            "date" => &["2021-01-04", "2021-01-05"],
            "y" => &[10.0, 20.0],
        )
        .unwrap();

        let monthly = resample(&df, "date", Aggregation::Sum).unwrap();
        assert_eq!(column_names(&monthly), vec!["date", "x", "y"]);
        assert_eq!(values(&monthly, "y"), vec![Some(30.0)]);
    }

    #[test]
    fn test_custom_date_column_name_is_restored() {
        let df = df!("obs_date" => &["2021-05-03"], "x" => &[1.0]).unwrap();
        let monthly = resample(&df, "obs_date", Aggregation::Last).unwrap();
        assert_eq!(column_names(&monthly), vec!["obs_date", "x"]);
        assert_eq!(
            monthly.column("obs_date").unwrap().dtype(),
            &DataType::Date
        );
    }

    #[test]
    fn test_unknown_method_name_fails() {
        let df = df!("date" => &["2021-01-04"], "x" => &[1.0]).unwrap();
        let err = resample_named(&df, "date", "median").unwrap_err();
        assert!(matches!(err, PanelError::UnknownAggregation(_)));
    }

    #[test]
    fn test_all_missing_month_stays_missing() {
        assert_eq!(aggregate(&[None, None], Aggregation::Sum), None);
        assert_eq!(aggregate(&[None, None], Aggregation::Mean), None);
        assert_eq!(aggregate(&[], Aggregation::Last), None);
    }

    #[test]
    fn test_forward_fill_keeps_leading_gaps() {
        assert_eq!(
            forward_fill([None, Some(1.0), None, Some(2.0), None]),
            vec![None, Some(1.0), Some(1.0), Some(2.0), Some(2.0)]
        );
    }
}
