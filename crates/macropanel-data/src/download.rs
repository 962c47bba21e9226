//! Raw-table downloads.
//!
//! Fetches every descriptor from its provider and writes one
//! `{date, <column>}` CSV per series into the raw directory. A failing
//! series is recorded and skipped; the run always completes.

use crate::error::{DataError, Result};
use crate::fred::FredClient;
use crate::observation::{Observation, observations_frame};
use crate::yahoo::YahooQuoteProvider;
use chrono::NaiveDate;
use indicatif::{ProgressBar, ProgressStyle};
use macropanel_core::{SeriesDescriptor, SourceKind};
use polars::prelude::*;
use std::fmt;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// What happened to one series.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadStatus {
    /// Table written
    Written {
        /// Rows written
        observations: usize,
    },
    /// Fetch or write failed
    Failed {
        /// Error message
        error: String,
    },
    /// Source is not downloadable
    NotFetched {
        /// What the user must do instead
        reason: String,
    },
}

/// Outcome for one series.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadOutcome {
    /// Series key
    pub key: String,
    /// Provider name
    pub provider: String,
    /// Ticker, series id or URL
    pub code: String,
    /// Target file
    pub file: PathBuf,
    /// Result
    pub status: DownloadStatus,
}

/// Outcomes of a download run, in descriptor order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DownloadReport {
    /// One entry per descriptor
    pub outcomes: Vec<DownloadOutcome>,
}

impl DownloadReport {
    /// Series written successfully.
    pub fn succeeded(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, DownloadStatus::Written { .. }))
            .count()
    }

    /// Series that failed.
    pub fn failed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, DownloadStatus::Failed { .. }))
            .count()
    }
}

impl fmt::Display for DownloadReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:<14} {:<12} {:<16} {:>8}", "Series", "Provider", "Code", "Obs")?;
        writeln!(f, "{}", "-".repeat(56))?;
        for o in &self.outcomes {
            let code: String = o.code.chars().take(16).collect();
            match &o.status {
                DownloadStatus::Written { observations } => writeln!(
                    f,
                    "{:<14} {:<12} {:<16} {:>8}",
                    o.key, o.provider, code, observations
                )?,
                DownloadStatus::Failed { error } => {
                    writeln!(f, "{:<14} {:<12} {:<16} {:>8}  {error}", o.key, o.provider, code, "✗")?
                }
                DownloadStatus::NotFetched { reason } => {
                    writeln!(f, "{:<14} {:<12} {:<16} {:>8}  {reason}", o.key, o.provider, code, "-")?
                }
            }
        }
        writeln!(
            f,
            "{} written, {} failed",
            self.succeeded(),
            self.failed()
        )
    }
}

/// Downloads raw tables for a set of descriptors.
#[derive(Debug)]
pub struct Downloader {
    raw_dir: PathBuf,
    start: NaiveDate,
    end: NaiveDate,
    yahoo: Option<YahooQuoteProvider>,
    fred: Option<FredClient>,
    show_progress: bool,
}

impl Downloader {
    /// Create a downloader writing into `raw_dir` for the given range.
    pub fn new(raw_dir: impl Into<PathBuf>, start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            raw_dir: raw_dir.into(),
            start,
            end,
            yahoo: None,
            fred: None,
            show_progress: false,
        }
    }

    /// Use `provider` for Yahoo Finance series.
    pub fn with_yahoo(mut self, provider: YahooQuoteProvider) -> Self {
        self.yahoo = Some(provider);
        self
    }

    /// Use `client` for FRED series.
    pub fn with_fred(mut self, client: FredClient) -> Self {
        self.fred = Some(client);
        self
    }

    /// Show a progress bar on stderr.
    pub const fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Fetch and write every descriptor.
    pub async fn run(&self, descriptors: &[SeriesDescriptor]) -> DownloadReport {
        let pb = if self.show_progress {
            let pb = ProgressBar::new(descriptors.len() as u64);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("█▓░"),
            );
            pb
        } else {
            ProgressBar::hidden()
        };

        let mut report = DownloadReport::default();
        for desc in descriptors {
            pb.set_message(desc.key.clone());
            let file = self.raw_dir.join(&desc.file);
            let status = match &desc.source {
                SourceKind::Spreadsheet { url } => DownloadStatus::NotFetched {
                    reason: format!("save an export of {url} as {}", desc.file),
                },
                _ => match self.download(desc, &file).await {
                    Ok(observations) => {
                        info!(series = %desc.key, observations, path = %file.display(), "downloaded");
                        DownloadStatus::Written { observations }
                    }
                    Err(e) => {
                        warn!(series = %desc.key, error = %e, "download failed");
                        DownloadStatus::Failed {
                            error: e.to_string(),
                        }
                    }
                },
            };
            report.outcomes.push(DownloadOutcome {
                key: desc.key.clone(),
                provider: desc.source.provider().to_string(),
                code: desc.source.code().to_string(),
                file,
                status,
            });
            pb.inc(1);
        }
        pb.finish_with_message(format!("{} series written", report.succeeded()));
        report
    }

    async fn download(&self, desc: &SeriesDescriptor, file: &Path) -> Result<usize> {
        let observations = match &desc.source {
            SourceKind::Yahoo { ticker } => {
                let provider = self
                    .yahoo
                    .as_ref()
                    .ok_or_else(|| DataError::Unsupported("Yahoo Finance client not configured".to_string()))?;
                provider.fetch_adjusted_close(ticker, self.start, self.end).await?
            }
            SourceKind::Fred { series_id } => {
                let client = self
                    .fred
                    .as_ref()
                    .ok_or_else(|| DataError::Unsupported("FRED client not configured".to_string()))?;
                client.fetch(series_id, self.start, self.end).await?
            }
            SourceKind::Spreadsheet { url } => {
                return Err(DataError::Unsupported(format!("spreadsheet {url}")));
            }
        };
        write_observations(file, &desc.date_column, &desc.column, &observations)
    }
}

/// Write observations as a two-column CSV, returning the row count.
///
/// # Errors
///
/// Fails on I/O or encoding errors.
pub fn write_observations(
    path: &Path,
    date_column: &str,
    value_column: &str,
    observations: &[Observation],
) -> Result<usize> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut df = observations_frame(date_column, value_column, observations)?;
    let mut file = File::create(path)?;
    CsvWriter::new(&mut file).include_header(true).finish(&mut df)?;
    Ok(df.height())
}
