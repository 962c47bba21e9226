//! Alignment of monthly, quarterly and external tables onto the base series.
//!
//! The base series defines the panel's rows. Monthly series are left-joined
//! in the configured order, quarterly series are joined and linearly
//! interpolated between known points, and external tables are joined whole
//! after their alias columns are renamed to canonical names. Every table is
//! normalized to month-end dates and de-duplicated per month before joining,
//! so no join can add rows.

use crate::calendar::{self, month_end};
use crate::config::{PanelConfig, PANEL_DATE_COLUMN};
use crate::error::{PanelError, Result};
use crate::frame::{column_names, find_column, float_column, float_values, has_column};
use crate::registry::{SeriesEntry, SeriesRegistry};
use crate::series::{SeriesDescriptor, SeriesRole};
use chrono::NaiveDate;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// A series joined onto the panel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinedSeries {
    /// Series key
    pub key: String,
    /// Merge role
    pub role: SeriesRole,
    /// Panel columns contributed
    pub columns: Vec<String>,
    /// Months in the normalized table
    pub rows: usize,
    /// Rows dropped because their month was already present
    pub duplicates: usize,
}

/// A series left out of the panel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedSeries {
    /// Series key
    pub key: String,
    /// Why it was left out
    pub reason: String,
}

/// Canonical column no alias matched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnresolvedColumn {
    /// Series key
    pub key: String,
    /// Canonical column name
    pub canonical: String,
}

/// Interpolation applied to a quarterly column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interpolation {
    /// Panel column
    pub column: String,
    /// Rows with an observed value
    pub known: usize,
    /// Rows filled by interpolation
    pub filled: usize,
}

/// What the merge did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeReport {
    /// Rows of the base series, hence of the panel
    pub base_rows: usize,
    /// Joined series in join order
    pub joined: Vec<JoinedSeries>,
    /// Series omitted from the panel
    pub skipped: Vec<SkippedSeries>,
    /// Alias sets that matched no column
    pub unresolved: Vec<UnresolvedColumn>,
    /// Interpolated quarterly columns
    pub interpolated: Vec<Interpolation>,
}

/// Merged panel with its report.
#[derive(Debug, Clone)]
pub struct Merged {
    /// Wide monthly panel, ascending by date
    pub panel: DataFrame,
    /// Merge report
    pub report: MergeReport,
}

/// Aligns the registry's tables into one panel.
#[derive(Debug, Clone, Copy)]
pub struct Merger<'a> {
    config: &'a PanelConfig,
}

impl<'a> Merger<'a> {
    /// Create a merger for `config`.
    pub fn new(config: &'a PanelConfig) -> Self {
        Self { config }
    }

    /// Merge every configured series present in `registry`.
    ///
    /// # Errors
    ///
    /// Fails with [`PanelError::MissingBaseSeries`] if the base series is not
    /// loaded, or if the base table lacks its date or value column. Problems
    /// with optional series are logged and reported instead.
    pub fn merge(&self, registry: &SeriesRegistry) -> Result<Merged> {
        let base = self.config.base_descriptor()?;
        let table = registry
            .get(&base.key)
            .ok_or_else(|| PanelError::MissingBaseSeries(base.key.clone()))?;

        let normalized = normalize(table, base)?;
        if normalized.columns.is_empty() {
            return Err(PanelError::MissingColumn {
                table: base.key.clone(),
                column: base.column.clone(),
            });
        }

        let mut report = MergeReport {
            base_rows: normalized.frame.height(),
            ..MergeReport::default()
        };
        info!(series = %base.key, rows = report.base_rows, "base series defines the panel");
        report.joined.push(JoinedSeries {
            key: base.key.clone(),
            role: base.role,
            columns: normalized.columns.clone(),
            rows: normalized.frame.height(),
            duplicates: normalized.duplicates,
        });
        let mut panel = normalized.frame;

        for key in &self.config.join_order {
            let desc = self.config.descriptor(key).ok_or_else(|| {
                PanelError::Config(format!("join order names unknown series '{key}'"))
            })?;
            panel = self.join(panel, registry, desc, &mut report)?.0;
        }

        for desc in self.config.series_with_role(SeriesRole::Quarterly) {
            let (joined, columns) = self.join(panel, registry, desc, &mut report)?;
            panel = sort_by_date(joined)?;
            for column in columns {
                let values = float_values(&panel, &desc.key, &column)?;
                let filled = interpolate_linear(&values);
                let known = values.iter().flatten().count();
                let added = filled.iter().flatten().count() - known;
                debug!(column = %column, known, filled = added, "interpolated quarterly series");
                panel.with_column(float_column(&column, filled))?;
                report.interpolated.push(Interpolation {
                    column,
                    known,
                    filled: added,
                });
            }
        }

        for desc in self.config.series_with_role(SeriesRole::External) {
            panel = self.join(panel, registry, desc, &mut report)?.0;
        }

        let panel = sort_by_date(panel)?;
        info!(
            rows = panel.height(),
            columns = panel.width(),
            skipped = report.skipped.len(),
            "panel merged"
        );
        Ok(Merged { panel, report })
    }

    /// Left-join one optional series, returning the panel and the columns added.
    fn join(
        &self,
        panel: DataFrame,
        registry: &SeriesRegistry,
        desc: &SeriesDescriptor,
        report: &mut MergeReport,
    ) -> Result<(DataFrame, Vec<String>)> {
        let Some(table) = registry.get(&desc.key) else {
            let reason = match registry.entry(&desc.key) {
                Some(SeriesEntry::Absent { reason }) => reason.clone(),
                _ => "not loaded".to_string(),
            };
            warn!(series = %desc.key, %reason, "series absent, its columns are omitted");
            report.skipped.push(SkippedSeries {
                key: desc.key.clone(),
                reason,
            });
            return Ok((panel, Vec::new()));
        };

        let mut normalized = match normalize(table, desc) {
            Ok(n) => n,
            Err(e) => {
                warn!(series = %desc.key, error = %e, "series unusable, its columns are omitted");
                report.skipped.push(SkippedSeries {
                    key: desc.key.clone(),
                    reason: e.to_string(),
                });
                return Ok((panel, Vec::new()));
            }
        };

        for canonical in &normalized.unresolved {
            warn!(series = %desc.key, column = %canonical, "no column matches any alias");
            report.unresolved.push(UnresolvedColumn {
                key: desc.key.clone(),
                canonical: canonical.clone(),
            });
        }

        let usable = match desc.role {
            SeriesRole::External => normalized.frame.width() > 1,
            _ => !normalized.columns.is_empty(),
        };
        if !usable {
            warn!(series = %desc.key, "no value column found, series omitted");
            report.skipped.push(SkippedSeries {
                key: desc.key.clone(),
                reason: format!("no column matching '{}'", desc.column),
            });
            return Ok((panel, Vec::new()));
        }

        let mut added = Vec::new();
        for name in column_names(&normalized.frame) {
            if name == PANEL_DATE_COLUMN {
                continue;
            }
            if has_column(&panel, &name) {
                let renamed = format!("{}_{}", desc.key, name);
                warn!(series = %desc.key, column = %name, renamed = %renamed, "column already in panel, renaming");
                normalized.frame.rename(&name, renamed.as_str().into())?;
                added.push(renamed);
            } else {
                added.push(name);
            }
        }

        let joined = left_join(panel, normalized.frame.clone())?;
        debug!(series = %desc.key, columns = ?added, "joined");
        report.joined.push(JoinedSeries {
            key: desc.key.clone(),
            role: desc.role,
            columns: added.clone(),
            rows: normalized.frame.height(),
            duplicates: normalized.duplicates,
        });

        let value_columns = added
            .iter()
            .filter(|c| normalized.columns.contains(c))
            .cloned()
            .collect();
        Ok((joined, value_columns))
    }
}

/// Merge in one call.
pub fn merge(registry: &SeriesRegistry, config: &PanelConfig) -> Result<Merged> {
    Merger::new(config).merge(registry)
}

/// A table reduced to month-end dates, one row per month.
#[derive(Debug)]
struct Normalized {
    frame: DataFrame,
    /// Canonical columns resolved through aliases
    columns: Vec<String>,
    unresolved: Vec<String>,
    duplicates: usize,
}

/// Normalize dates to month-end, resolve aliases and keep the last row of
/// every month.
///
/// Only resolved columns are kept, except for external tables, which keep
/// every column.
fn normalize(table: &DataFrame, desc: &SeriesDescriptor) -> Result<Normalized> {
    let date_name = find_column(table, std::slice::from_ref(&desc.date_column)).ok_or_else(|| {
        PanelError::MissingColumn {
            table: desc.key.clone(),
            column: desc.date_column.clone(),
        }
    })?;

    let mut resolved: Vec<(String, String)> = Vec::new();
    let mut unresolved = Vec::new();
    for set in desc.alias_sets() {
        match find_column(table, &set.aliases) {
            Some(raw) if raw != date_name && !resolved.iter().any(|(r, _)| *r == raw) => {
                resolved.push((raw, set.canonical))
            }
            _ => unresolved.push(set.canonical),
        }
    }

    let mut selected: Vec<String> = resolved.iter().map(|(raw, _)| raw.clone()).collect();
    if desc.role == SeriesRole::External {
        let canonical: Vec<&str> = resolved.iter().map(|(_, c)| c.as_str()).collect();
        let extra: Vec<String> = column_names(table)
            .into_iter()
            .filter(|name| {
                *name != date_name
                    && name != PANEL_DATE_COLUMN
                    && !selected.contains(name)
                    && !canonical.contains(&name.as_str())
            })
            .collect();
        selected.extend(extra);
    }

    let months: Vec<Option<NaiveDate>> = calendar::dates(table, &desc.key, &date_name)?
        .into_iter()
        .map(|d| d.map(month_end))
        .collect();
    let (keep, duplicates) = last_per_month(&months);
    if duplicates > 0 {
        debug!(series = %desc.key, rows = duplicates, "dropping duplicate months");
    }

    let idx = IdxCa::from_vec("idx".into(), keep.iter().map(|&i| i as IdxSize).collect());
    let mut values = table.select(selected.iter().map(String::as_str))?.take(&idx)?;
    for (raw, canonical) in &resolved {
        if raw != canonical {
            values.rename(raw, canonical.as_str().into())?;
        }
    }

    // The panel holds only Float64 values next to its date. Extra external
    // columns with no numeric content are dropped.
    let mut numeric = Vec::with_capacity(values.width());
    for column in values.get_columns() {
        let cast = column.cast(&DataType::Float64)?;
        let name = column.name().as_str();
        let canonical = resolved.iter().any(|(_, c)| c == name);
        let lost = cast.null_count() == cast.len() && column.null_count() < column.len();
        if !canonical && lost {
            debug!(series = %desc.key, column = %column.name(), "dropping non-numeric column");
            continue;
        }
        numeric.push(cast);
    }
    let values = DataFrame::new(numeric)?;

    let kept_months: Vec<NaiveDate> = keep.iter().filter_map(|&i| months[i]).collect();
    let frame = DataFrame::new(vec![calendar::date_column(PANEL_DATE_COLUMN, &kept_months)?])?
        .hstack(values.get_columns())?;

    Ok(Normalized {
        frame,
        columns: resolved.into_iter().map(|(_, c)| c).collect(),
        unresolved,
        duplicates,
    })
}

/// Row positions to keep, ascending by month, last occurrence winning.
/// Rows without a date are dropped and not counted as duplicates.
fn last_per_month(months: &[Option<NaiveDate>]) -> (Vec<usize>, usize) {
    let mut order: Vec<usize> = (0..months.len()).filter(|&i| months[i].is_some()).collect();
    order.sort_by_key(|&i| months[i]);

    let mut keep: Vec<usize> = Vec::with_capacity(order.len());
    let mut duplicates = 0;
    for i in order {
        match keep.last_mut() {
            Some(last) if months[*last] == months[i] => {
                *last = i;
                duplicates += 1;
            }
            _ => keep.push(i),
        }
    }
    (keep, duplicates)
}

fn left_join(panel: DataFrame, other: DataFrame) -> Result<DataFrame> {
    Ok(panel
        .lazy()
        .join(
            other.lazy(),
            [col(PANEL_DATE_COLUMN)],
            [col(PANEL_DATE_COLUMN)],
            JoinArgs::new(JoinType::Left),
        )
        .collect()?)
}

fn sort_by_date(panel: DataFrame) -> Result<DataFrame> {
    Ok(panel.sort([PANEL_DATE_COLUMN], SortMultipleOptions::default())?)
}

/// Linear interpolation by row position between known values.
///
/// Cells before the first or after the last known value stay missing.
pub fn interpolate_linear(values: &[Option<f64>]) -> Vec<Option<f64>> {
    let mut out = values.to_vec();
    let known: Vec<(usize, f64)> = values
        .iter()
        .enumerate()
        .filter_map(|(i, v)| v.map(|v| (i, v)))
        .collect();

    for pair in known.windows(2) {
        let ((i0, v0), (i1, v1)) = (pair[0], pair[1]);
        let span = (i1 - i0) as f64;
        for (k, cell) in out.iter_mut().enumerate().take(i1).skip(i0 + 1) {
            *cell = Some(v0 + (v1 - v0) * (k - i0) as f64 / span);
        }
    }
    out
}
