//! End-to-end panel build.
//!
//! Load every configured series from a [`SeriesSource`], resample base and
//! monthly series to month-end, merge onto the base series, append derived
//! columns, trim to the configured range and audit missing values. The
//! result can then be written next to its event calendar and run summary.

use crate::error::Result;
use crate::settings::Settings;
use macropanel_core::frame::find_column;
use macropanel_core::transform::SkippedDerivation;
use macropanel_core::{
    DateRange, MergeReport, Merger, MissingReport, PANEL_DATE_COLUMN, SeriesRegistry, Transformer,
    calendar, resample,
};
use macropanel_data::SeriesSource;
use macropanel_output::{
    EventAnnotation, ExportFormat, Exporter, PanelFormat, RunSummary, annotate, write_panel,
};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{info, warn};

/// File name of the event calendar.
pub const EVENTS_FILE: &str = "events.csv";

/// File name of the run summary.
pub const SUMMARY_FILE: &str = "run_summary.json";

/// Load outcome for one series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadedSeries {
    /// Series key
    pub key: String,
    /// Rows in the raw table
    pub raw_rows: usize,
    /// Rows registered (after resampling, where applicable)
    pub rows: usize,
}

/// What the load stage found.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadReport {
    /// Series registered, in configuration order
    pub loaded: Vec<LoadedSeries>,
    /// Series marked absent, with reasons
    pub absent: Vec<(String, String)>,
}

impl fmt::Display for LoadReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for s in &self.loaded {
            writeln!(f, "  ✓ {:<14} {:>6} rows -> {:>4} months", s.key, s.raw_rows, s.rows)?;
        }
        for (key, reason) in &self.absent {
            writeln!(f, "  ✗ {key:<14} {reason}")?;
        }
        Ok(())
    }
}

/// A built panel with everything learned while building it.
#[derive(Debug, Clone)]
pub struct Built {
    /// Final panel, ascending by date
    pub panel: DataFrame,
    /// Load stage outcome
    pub load: LoadReport,
    /// Merge stage outcome
    pub merge: MergeReport,
    /// Derived columns computed
    pub applied: Vec<String>,
    /// Derived columns skipped
    pub skipped_derivations: Vec<SkippedDerivation>,
    /// Missing-value profile of the final panel
    pub missing: MissingReport,
}

impl Built {
    /// Months of the panel.
    ///
    /// # Errors
    ///
    /// Fails if the date column cannot be read.
    pub fn dates(&self) -> Result<Vec<chrono::NaiveDate>> {
        Ok(calendar::dates(&self.panel, "panel", PANEL_DATE_COLUMN)?
            .into_iter()
            .flatten()
            .collect())
    }
}

/// Panel build pipeline.
#[derive(Debug, Clone)]
pub struct Pipeline {
    settings: Settings,
}

impl Pipeline {
    /// Create a pipeline for `settings`.
    pub const fn new(settings: Settings) -> Self {
        Self { settings }
    }

    /// Settings in use.
    pub const fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Load and register every configured series.
    ///
    /// Base and monthly tables are resampled to month-end here; quarterly
    /// and external tables are registered as read. A series the source does
    /// not have, or one that cannot be read or resampled, is marked absent.
    pub fn load(&self, source: &dyn SeriesSource) -> (SeriesRegistry, LoadReport) {
        let mut registry = SeriesRegistry::new();
        let mut report = LoadReport::default();

        for desc in &self.settings.panel.series {
            let loaded = source.load(desc).map_err(|e| e.to_string()).and_then(|table| {
                let Some(table) = table else {
                    return Ok(None);
                };
                if !desc.role.is_resampled() {
                    return Ok(Some((table.height(), table)));
                }
                let date = find_column(&table, std::slice::from_ref(&desc.date_column))
                    .ok_or_else(|| format!("no '{}' column", desc.date_column))?;
                let monthly = resample(&table, &date, desc.aggregation).map_err(|e| e.to_string())?;
                Ok(Some((table.height(), monthly)))
            });

            match loaded {
                Ok(Some((raw_rows, table))) => {
                    info!(series = %desc.key, raw_rows, rows = table.height(), "series loaded");
                    report.loaded.push(LoadedSeries {
                        key: desc.key.clone(),
                        raw_rows,
                        rows: table.height(),
                    });
                    registry.insert(&desc.key, table);
                }
                Ok(None) => {
                    let reason = format!("not available from {}", source.name());
                    warn!(series = %desc.key, %reason, "series absent");
                    registry.mark_absent(&desc.key, reason.as_str());
                    report.absent.push((desc.key.clone(), reason));
                }
                Err(reason) => {
                    warn!(series = %desc.key, %reason, "series could not be loaded");
                    registry.mark_absent(&desc.key, reason.as_str());
                    report.absent.push((desc.key.clone(), reason));
                }
            }
        }
        (registry, report)
    }

    /// Build the panel from `source`.
    ///
    /// # Errors
    ///
    /// Fails on invalid settings, a missing base series or a polars error.
    /// Absent optional series only narrow the panel.
    pub fn build(&self, source: &dyn SeriesSource) -> Result<Built> {
        self.settings.validate()?;
        let (registry, load) = self.load(source);
        self.build_from(&registry, load)
    }

    /// Build the panel from an already filled registry.
    ///
    /// # Errors
    ///
    /// Fails on a missing base series or a polars error.
    pub fn build_from(&self, registry: &SeriesRegistry, load: LoadReport) -> Result<Built> {
        let config = &self.settings.panel;
        let merged = Merger::new(config).merge(registry)?;
        let transformed = Transformer::new(config.derivations.clone()).transform(&merged.panel)?;

        // Derivations run on the full panel so the first kept month still
        // has its difference against the month before the range.
        let panel = trim(transformed.panel, config.date_range)?;
        let missing = MissingReport::from_frame(&panel);
        info!(
            rows = panel.height(),
            columns = panel.width(),
            incomplete = missing.incomplete().len(),
            "panel built"
        );

        Ok(Built {
            panel,
            load,
            merge: merged.report,
            applied: transformed.applied,
            skipped_derivations: transformed.skipped,
            missing,
        })
    }

    /// Write the panel (CSV and Parquet), the event calendar and the run
    /// summary into the processed directory.
    ///
    /// # Errors
    ///
    /// Fails on I/O or encoding errors.
    pub fn persist(&self, built: &Built, started: Instant) -> Result<RunSummary> {
        let paths = &self.settings.paths;
        fs::create_dir_all(&paths.processed_dir)?;

        let mut summary = RunSummary::from_panel(&built.panel)?
            .with_merge(&built.merge)
            .with_derivations(&built.applied, &built.skipped_derivations);

        for format in PanelFormat::all() {
            let path = paths.panel_path(format.extension());
            write_panel(&built.panel, &path, format)?;
            summary = summary.with_artifact(&path);
        }

        let events: Vec<EventAnnotation> = annotate(&built.dates()?, &self.settings.events);
        let events_path = paths.processed_dir.join(EVENTS_FILE);
        events.export_to_file(&events_path, ExportFormat::Csv)?;
        summary = summary.with_artifact(&events_path);

        let summary_path: PathBuf = paths.processed_dir.join(SUMMARY_FILE);
        summary = summary
            .with_artifact(&summary_path)
            .with_elapsed(started.elapsed());
        summary.export_to_file(&summary_path, ExportFormat::PrettyJson)?;

        info!(dir = %paths.processed_dir.display(), files = summary.artifacts.len(), "panel written");
        Ok(summary)
    }

    /// Build and persist in one call.
    ///
    /// # Errors
    ///
    /// See [`build`](Self::build) and [`persist`](Self::persist).
    pub fn run(&self, source: &dyn SeriesSource) -> Result<RunSummary> {
        let started = Instant::now();
        let built = self.build(source)?;
        self.persist(&built, started)
    }
}

/// Keep rows whose date falls inside `range`.
fn trim(panel: DataFrame, range: DateRange) -> Result<DataFrame> {
    let date = col(PANEL_DATE_COLUMN);
    Ok(panel
        .lazy()
        .filter(date.clone().gt_eq(lit(range.start)).and(date.lt_eq(lit(range.end))))
        .collect()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use macropanel_core::frame::float_values;
    use macropanel_data::MemorySource;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_trim_is_inclusive() {
        let panel = DataFrame::new(vec![
            calendar::date_column(
                PANEL_DATE_COLUMN,
                &[d(2020, 1, 31), d(2020, 2, 29), d(2020, 3, 31)],
            )
            .unwrap(),
            macropanel_core::frame::float_column("x", vec![Some(1.0), Some(2.0), Some(3.0)]),
        ])
        .unwrap();
        let range = DateRange::new(d(2020, 1, 31), d(2020, 2, 29)).unwrap();
        let trimmed = trim(panel, range).unwrap();
        assert_eq!(float_values(&trimmed, "t", "x").unwrap(), vec![Some(1.0), Some(2.0)]);
    }

    #[test]
    fn test_load_resamples_base_and_marks_absent() {
        let sp500 = df!(
            "Date" => &["2021-01-04", "2021-01-29", "2021-02-26"],
            "sp500" => &[3700.0, 3714.0, 3811.0],
        )
        .unwrap();
        let source = MemorySource::new().with("sp500", sp500);
        let pipeline = Pipeline::new(Settings::default());

        let (registry, report) = pipeline.load(&source);
        assert_eq!(registry.get("sp500").unwrap().height(), 2);
        assert_eq!(report.loaded.len(), 1);
        assert_eq!(report.loaded[0].raw_rows, 3);
        assert_eq!(report.absent.len(), 8);
        assert!(report.absent.iter().all(|(_, reason)| reason == "not available from memory"));
    }

    #[test]
    fn test_load_without_date_column_is_absent() {
        let vix = df!("when" => &["2021-01-04"], "vix" => &[20.0]).unwrap();
        let source = MemorySource::new().with("vix", vix);
        let (registry, report) = Pipeline::new(Settings::default()).load(&source);
        assert!(!registry.is_loaded("vix"));
        let (_, reason) = report.absent.iter().find(|(k, _)| k == "vix").unwrap();
        assert_eq!(reason, "no 'date' column");
    }
}
