//! Persistence of the final panel.
//!
//! The panel is written as CSV (human-readable) and Parquet (typed,
//! compact). Reading either back yields the same frame: a `Date` column
//! followed by `Float64` value columns.

use crate::export::ExportError;
use macropanel_core::calendar;
use macropanel_core::frame::column_names;
use macropanel_core::PANEL_DATE_COLUMN;
use polars::prelude::*;
use std::fs::{self, File};
use std::io::Cursor;
use std::path::Path;
use tracing::info;

/// On-disk panel format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelFormat {
    /// Comma-separated values with a header row
    Csv,
    /// Apache Parquet
    Parquet,
}

impl PanelFormat {
    /// File extension for this format.
    pub const fn extension(&self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Parquet => "parquet",
        }
    }

    /// All supported formats.
    pub const fn all() -> [Self; 2] {
        [Self::Csv, Self::Parquet]
    }
}

/// Write `panel` to `path`, creating parent directories.
///
/// # Errors
///
/// Fails on I/O or encoding errors.
pub fn write_panel(panel: &DataFrame, path: &Path, format: PanelFormat) -> Result<(), ExportError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut df = panel.clone();
    let mut file = File::create(path)?;
    match format {
        PanelFormat::Csv => {
            CsvWriter::new(&mut file).include_header(true).finish(&mut df)?;
        }
        PanelFormat::Parquet => {
            ParquetWriter::new(&mut file).finish(&mut df)?;
        }
    }
    info!(path = %path.display(), rows = df.height(), format = format.extension(), "panel written");
    Ok(())
}

/// Read a panel written by [`write_panel`].
///
/// # Errors
///
/// Fails on I/O or decoding errors, or if the date column is absent.
pub fn read_panel(path: &Path, format: PanelFormat) -> Result<DataFrame, ExportError> {
    match format {
        PanelFormat::Csv => {
            let bytes = fs::read(path)?;
            let df = CsvReadOptions::default()
                .with_has_header(true)
                .with_infer_schema_length(None)
                .into_reader_with_file_handle(Cursor::new(bytes))
                .finish()?;
            restore_types(df)
        }
        PanelFormat::Parquet => Ok(ParquetReader::new(File::open(path)?).finish()?),
    }
}

/// Re-type a panel read from text: `Date` first, every other column `Float64`.
fn restore_types(df: DataFrame) -> Result<DataFrame, ExportError> {
    let days: Vec<_> = calendar::dates(&df, "panel", PANEL_DATE_COLUMN)?
        .into_iter()
        .collect::<Option<Vec<_>>>()
        .ok_or_else(|| ExportError::InvalidFormat("panel has rows without a date".to_string()))?;

    let mut columns = vec![calendar::date_column(PANEL_DATE_COLUMN, &days)?];
    for name in column_names(&df) {
        if name == PANEL_DATE_COLUMN {
            continue;
        }
        columns.push(df.column(&name)?.cast(&DataType::Float64)?);
    }
    Ok(DataFrame::new(columns)?)
}
