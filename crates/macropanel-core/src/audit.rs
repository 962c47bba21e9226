//! Missing-value audit of a panel.

use crate::frame::missing_count;
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Missing-cell count of one column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnMissing {
    /// Column name
    pub column: String,
    /// Null or `NaN` cells
    pub missing: usize,
    /// `missing / rows`; absent for an empty panel
    pub fraction: Option<f64>,
}

/// Per-column missing counts of a panel, in column order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MissingReport {
    /// Panel height
    pub rows: usize,
    /// One entry per column
    pub columns: Vec<ColumnMissing>,
}

impl MissingReport {
    /// Count missing cells in every column of `df`.
    pub fn from_frame(df: &DataFrame) -> Self {
        let rows = df.height();
        let columns = df
            .get_columns()
            .iter()
            .map(|c| {
                let missing = missing_count(c);
                ColumnMissing {
                    column: c.name().to_string(),
                    missing,
                    fraction: (rows > 0).then(|| missing as f64 / rows as f64),
                }
            })
            .collect();
        Self { rows, columns }
    }

    /// Entry for `column`.
    pub fn get(&self, column: &str) -> Option<&ColumnMissing> {
        self.columns.iter().find(|c| c.column == column)
    }

    /// Columns with at least one missing cell, most missing first.
    pub fn incomplete(&self) -> Vec<&ColumnMissing> {
        let mut out: Vec<&ColumnMissing> = self.columns.iter().filter(|c| c.missing > 0).collect();
        out.sort_by(|a, b| b.missing.cmp(&a.missing));
        out
    }

    /// Whether no cell is missing.
    pub fn is_complete(&self) -> bool {
        self.columns.iter().all(|c| c.missing == 0)
    }

    /// Total missing cells.
    pub fn total_missing(&self) -> usize {
        self.columns.iter().map(|c| c.missing).sum()
    }
}

impl fmt::Display for MissingReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let incomplete = self.incomplete();
        if incomplete.is_empty() {
            return writeln!(f, "No missing values ({} rows)", self.rows);
        }
        writeln!(f, "{:<24} {:>8} {:>8}", "Variable", "Missing", "%")?;
        for c in incomplete {
            let pct = c.fraction.map_or_else(|| "-".to_string(), |p| format!("{:.1}", p * 100.0));
            writeln!(f, "{:<24} {:>8} {:>8}", c.column, c.missing, pct)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use polars::prelude::*;

    fn frame() -> DataFrame {
        df!(
            "date" => &[1i32, 2, 3, 4],
            "a" => &[Some(1.0), None, Some(f64::NAN), Some(4.0)],
            "b" => &[Some(1.0), Some(2.0), Some(3.0), None],
            "c" => &[1.0, 2.0, 3.0, 4.0],
        )
        .unwrap()
    }

    #[test]
    fn test_counts_null_and_nan() {
        let report = MissingReport::from_frame(&frame());
        assert_eq!(report.rows, 4);
        assert_eq!(report.get("a").unwrap().missing, 2);
        assert_relative_eq!(report.get("a").unwrap().fraction.unwrap(), 0.5);
        assert_eq!(report.get("c").unwrap().missing, 0);
        assert_eq!(report.total_missing(), 3);
        assert!(!report.is_complete());
    }

    #[test]
    fn test_incomplete_sorted_descending() {
        let report = MissingReport::from_frame(&frame());
        let names: Vec<&str> = report.incomplete().iter().map(|c| c.column.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn test_empty_panel_has_no_fraction() {
        let df = df!("x" => Vec::<f64>::new()).unwrap();
        let report = MissingReport::from_frame(&df);
        assert_eq!(report.get("x").unwrap().fraction, None);
        assert!(report.is_complete());
        assert!(report.to_string().contains("No missing values"));
    }

    #[test]
    fn test_display_lists_only_incomplete_columns() {
        let text = MissingReport::from_frame(&frame()).to_string();
        assert!(text.contains("Variable"));
        assert!(text.lines().any(|l| l.starts_with('a') && l.contains("50.0")));
        assert!(!text.lines().any(|l| l.starts_with('c')));
    }
}
