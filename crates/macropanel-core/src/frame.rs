//! Column access helpers shared by the resampler, merger and transformer.

use crate::error::{PanelError, Result};
use polars::prelude::*;

/// Whether `df` has a column named `name`.
pub fn has_column(df: &DataFrame, name: &str) -> bool {
    df.get_column_index(name).is_some()
}

/// Column names of `df` as owned strings.
pub fn column_names(df: &DataFrame) -> Vec<String> {
    df.get_column_names()
        .into_iter()
        .map(|name| name.to_string())
        .collect()
}

/// Read a column as optional floats.
///
/// The column is cast to `Float64` non-strictly, so unparseable text becomes
/// missing. `NaN` is folded into missing as well.
pub fn float_values(df: &DataFrame, table: &str, column: &str) -> Result<Vec<Option<f64>>> {
    let col = df.column(column).map_err(|_| PanelError::MissingColumn {
        table: table.to_string(),
        column: column.to_string(),
    })?;
    let values = col.cast(&DataType::Float64)?;
    Ok(values
        .f64()?
        .into_iter()
        .map(|v| v.filter(|v| !v.is_nan()))
        .collect())
}

/// Build a `Float64` column from optional values.
pub fn float_column(name: &str, values: Vec<Option<f64>>) -> Column {
    Series::new(name.into(), values).into()
}

/// Normalize a column name for alias matching: lowercase, no whitespace.
pub fn normalize_name(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Find the first column of `df` whose normalized name matches any alias.
pub fn find_column(df: &DataFrame, aliases: &[String]) -> Option<String> {
    let wanted: Vec<String> = aliases.iter().map(|a| normalize_name(a)).collect();
    column_names(df)
        .into_iter()
        .find(|name| wanted.contains(&normalize_name(name)))
}

/// Count missing cells (null or `NaN`) in a column.
pub fn missing_count(column: &Column) -> usize {
    match column.dtype() {
        DataType::Float64 | DataType::Float32 => column
            .cast(&DataType::Float64)
            .ok()
            .and_then(|c| {
                c.f64()
                    .ok()
                    .map(|ca| ca.into_iter().filter(|v| v.is_none_or(f64::is_nan)).count())
            })
            .unwrap_or_else(|| column.null_count()),
        _ => column.null_count(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("  Price ", "price")]
    #[case("P/E 10", "p/e10")]
    #[case("CAPE", "cape")]
    #[case("gdp_nominal", "gdp_nominal")]
    fn test_normalize_name(#[case] raw: &str, #[case] expected: &str) {
        assert_eq!(normalize_name(raw), expected);
    }

    #[test]
    fn test_find_column_is_case_and_whitespace_insensitive() {
        let df = df!(
            "Date" => &["2021-01-01"],
            " Earnings " => &[1.0],
            "CAPE" => &[30.0],
        )
        .unwrap();

        let aliases = vec!["earnings".to_string(), "e".to_string()];
        assert_eq!(find_column(&df, &aliases), Some(" Earnings ".to_string()));
        assert_eq!(find_column(&df, &["cape".to_string()]), Some("CAPE".to_string()));
        assert_eq!(find_column(&df, &["dividend".to_string()]), None);
    }

    #[test]
    fn test_float_values_casts_and_drops_nan() {
        let df = df!("v" => &["1.5", ".", "NaN", "2"]).unwrap();
        let values = float_values(&df, "t", "v").unwrap();
        assert_eq!(values, vec![Some(1.5), None, None, Some(2.0)]);
    }

    #[test]
    fn test_missing_count_counts_nan_and_null() {
        let col = float_column("x", vec![Some(1.0), None, Some(f64::NAN), Some(2.0)]);
        assert_eq!(missing_count(&col), 2);
    }

    #[test]
    fn test_has_column() {
        let df = df!("date" => &[1i32]).unwrap();
        assert!(has_column(&df, "date"));
        assert!(!has_column(&df, "value"));
    }
}
