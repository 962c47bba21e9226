//! Run summary of a panel build.
//!
//! Collects the shape and period of the final panel, which series were
//! joined or skipped, which derived columns could be computed, and the
//! missing-value profile. Rendered for the terminal, as Markdown, or as JSON
//! next to the panel files.

use crate::export::{ExportError, ExportFormat, Exporter, csv_string, json_string};
use chrono::{DateTime, NaiveDate, Utc};
use macropanel_core::merge::{Interpolation, SkippedSeries, UnresolvedColumn};
use macropanel_core::transform::SkippedDerivation;
use macropanel_core::{MergeReport, MissingReport, PANEL_DATE_COLUMN, calendar};
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::Duration;

/// Summary of one panel build.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// When the summary was produced
    pub generated_at: DateTime<Utc>,
    /// Panel rows
    pub observations: usize,
    /// Panel columns other than the date
    pub variables: usize,
    /// First panel month
    pub period_start: Option<NaiveDate>,
    /// Last panel month
    pub period_end: Option<NaiveDate>,
    /// Series joined onto the panel
    pub loaded: Vec<String>,
    /// Series left out, with reasons
    pub skipped: Vec<SkippedSeries>,
    /// Alias sets that matched no column
    pub unresolved: Vec<UnresolvedColumn>,
    /// Interpolated quarterly columns
    pub interpolated: Vec<Interpolation>,
    /// Derived columns computed
    pub derived: Vec<String>,
    /// Derived columns skipped for missing inputs
    pub skipped_derivations: Vec<SkippedDerivation>,
    /// Missing cells per column
    pub missing: MissingReport,
    /// Files written by the run
    pub artifacts: Vec<String>,
    /// Wall-clock duration in milliseconds
    pub elapsed_ms: u64,
}

impl RunSummary {
    /// Start a summary from the final panel.
    ///
    /// # Errors
    ///
    /// Fails if the panel has no readable date column.
    pub fn from_panel(panel: &DataFrame) -> Result<Self, ExportError> {
        let days: Vec<NaiveDate> = calendar::dates(panel, "panel", PANEL_DATE_COLUMN)?
            .into_iter()
            .flatten()
            .collect();
        Ok(Self {
            generated_at: Utc::now(),
            observations: panel.height(),
            variables: panel.width().saturating_sub(1),
            period_start: days.iter().min().copied(),
            period_end: days.iter().max().copied(),
            loaded: Vec::new(),
            skipped: Vec::new(),
            unresolved: Vec::new(),
            interpolated: Vec::new(),
            derived: Vec::new(),
            skipped_derivations: Vec::new(),
            missing: MissingReport::from_frame(panel),
            artifacts: Vec::new(),
            elapsed_ms: 0,
        })
    }

    /// Record the merge outcome.
    pub fn with_merge(mut self, report: &MergeReport) -> Self {
        self.loaded = report.joined.iter().map(|j| j.key.clone()).collect();
        self.skipped = report.skipped.clone();
        self.unresolved = report.unresolved.clone();
        self.interpolated = report.interpolated.clone();
        self
    }

    /// Record the transform outcome.
    pub fn with_derivations(mut self, applied: &[String], skipped: &[SkippedDerivation]) -> Self {
        self.derived = applied.to_vec();
        self.skipped_derivations = skipped.to_vec();
        self
    }

    /// Record a written file.
    pub fn with_artifact(mut self, path: &Path) -> Self {
        self.artifacts.push(path.display().to_string());
        self
    }

    /// Record the run duration.
    pub fn with_elapsed(mut self, elapsed: Duration) -> Self {
        self.elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Period as `YYYY-MM to YYYY-MM`.
    pub fn period(&self) -> String {
        match (self.period_start, self.period_end) {
            (Some(start), Some(end)) => {
                format!("{} to {}", start.format("%Y-%m"), end.format("%Y-%m"))
            }
            _ => "empty".to_string(),
        }
    }

    /// Format as ASCII table for terminal display.
    pub fn to_ascii_table(&self) -> String {
        let mut output = String::new();

        output.push_str("\nMonthly Panel Summary\n");
        output.push_str(&"=".repeat(70));
        output.push('\n');
        output.push_str(&format!("  Observations:   {}\n", self.observations));
        output.push_str(&format!("  Variables:      {}\n", self.variables));
        output.push_str(&format!("  Period:         {}\n", self.period()));
        output.push_str(&format!(
            "  Elapsed:        {:.2}s\n",
            self.elapsed_ms as f64 / 1000.0
        ));

        output.push_str("\nSeries:\n");
        output.push_str(&"-".repeat(70));
        output.push('\n');
        for key in &self.loaded {
            output.push_str(&format!("  ✓ {key}\n"));
        }
        for s in &self.skipped {
            output.push_str(&format!("  ✗ {:<15} {}\n", s.key, s.reason));
        }
        for u in &self.unresolved {
            output.push_str(&format!("  ! {:<15} no column for '{}'\n", u.key, u.canonical));
        }
        for i in &self.interpolated {
            output.push_str(&format!(
                "  ~ {:<15} interpolated {} months between {} observations\n",
                i.column, i.filled, i.known
            ));
        }

        if !self.skipped_derivations.is_empty() {
            output.push_str("\nDerived columns not computed:\n");
            output.push_str(&"-".repeat(70));
            output.push('\n');
            for s in &self.skipped_derivations {
                output.push_str(&format!(
                    "  {:<18} missing {}\n",
                    s.output,
                    s.missing_inputs.join(", ")
                ));
            }
        }

        output.push_str("\nMissing values:\n");
        output.push_str(&"-".repeat(70));
        output.push('\n');
        let incomplete = self.missing.incomplete();
        if incomplete.is_empty() {
            output.push_str("  ✓ no missing values\n");
        } else {
            output.push_str(&format!("  {:<22} {:>8} {:>8}\n", "Variable", "Missing", "%"));
            for c in incomplete {
                let pct = c.fraction.map_or(0.0, |p| p * 100.0);
                output.push_str(&format!("  {:<22} {:>8} {:>7.1}%\n", c.column, c.missing, pct));
            }
        }

        if !self.artifacts.is_empty() {
            output.push_str("\nFiles:\n");
            output.push_str(&"-".repeat(70));
            output.push('\n');
            for path in &self.artifacts {
                output.push_str(&format!("  {path}\n"));
            }
        }

        output.push_str(&"=".repeat(70));
        output.push('\n');
        output
    }

    /// Format as Markdown for documentation.
    pub fn to_markdown(&self) -> String {
        let mut output = String::new();

        output.push_str("# Monthly Panel Summary\n\n");
        output.push_str(&format!("- **Observations:** {}\n", self.observations));
        output.push_str(&format!("- **Variables:** {}\n", self.variables));
        output.push_str(&format!("- **Period:** {}\n\n", self.period()));

        output.push_str("## Series\n\n");
        output.push_str("| Series | Status |\n");
        output.push_str("|--------|--------|\n");
        for key in &self.loaded {
            output.push_str(&format!("| {key} | loaded |\n"));
        }
        for s in &self.skipped {
            output.push_str(&format!("| {} | skipped: {} |\n", s.key, s.reason));
        }

        let incomplete = self.missing.incomplete();
        if !incomplete.is_empty() {
            output.push_str("\n## Missing Values\n\n");
            output.push_str("| Variable | Missing | % |\n");
            output.push_str("|----------|---------|---|\n");
            for c in incomplete {
                let pct = c.fraction.map_or(0.0, |p| p * 100.0);
                output.push_str(&format!("| {} | {} | {:.1}% |\n", c.column, c.missing, pct));
            }
        }

        output
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Panel: {} months x {} variables ({})",
            self.observations,
            self.variables,
            self.period()
        )?;
        writeln!(
            f,
            "  Series: {} loaded, {} skipped",
            self.loaded.len(),
            self.skipped.len()
        )?;
        writeln!(f, "  Missing cells: {}", self.missing.total_missing())
    }
}

impl Exporter for RunSummary {
    fn export_to_string(&self, format: ExportFormat) -> Result<String, ExportError> {
        match format {
            ExportFormat::Csv => csv_string(&self.missing.columns),
            ExportFormat::Json | ExportFormat::PrettyJson => json_string(self, format),
        }
    }
}

/// First and last `rows` rows of the panel.
pub fn preview(panel: &DataFrame, rows: usize) -> String {
    format!(
        "First {rows} rows:\n{}\n\nLast {rows} rows:\n{}",
        panel.head(Some(rows)),
        panel.tail(Some(rows))
    )
}
