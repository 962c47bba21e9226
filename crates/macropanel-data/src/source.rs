//! Sources of raw series tables.
//!
//! The pipeline asks a [`SeriesSource`] for one table per descriptor. A
//! source answers with a table, with `None` when the series is simply not
//! available, or with an error when a table exists but cannot be read.

use crate::error::{DataError, Result};
use macropanel_core::frame::{column_names, find_column};
use macropanel_core::{SeriesDescriptor, SeriesRole};
use polars::prelude::*;
use std::collections::HashMap;
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Provider of raw series tables.
pub trait SeriesSource: Send + Sync {
    /// Human-readable name of this source.
    fn name(&self) -> &str;

    /// Load the raw table for `desc`, or `None` if it is unavailable.
    ///
    /// # Errors
    ///
    /// Fails if a table exists but cannot be decoded.
    fn load(&self, desc: &SeriesDescriptor) -> Result<Option<DataFrame>>;
}

/// Reads `{raw_dir}/{file}` for market and FRED series and
/// `{external_dir}/{file}` for external tables.
#[derive(Debug, Clone)]
pub struct CsvDirectorySource {
    raw_dir: PathBuf,
    external_dir: PathBuf,
}

impl CsvDirectorySource {
    /// Create a source over the two directories.
    pub fn new(raw_dir: impl Into<PathBuf>, external_dir: impl Into<PathBuf>) -> Self {
        Self {
            raw_dir: raw_dir.into(),
            external_dir: external_dir.into(),
        }
    }

    /// Path the table for `desc` is read from.
    pub fn path_for(&self, desc: &SeriesDescriptor) -> PathBuf {
        match desc.role {
            SeriesRole::External => self.external_dir.join(&desc.file),
            _ => self.raw_dir.join(&desc.file),
        }
    }
}

impl SeriesSource for CsvDirectorySource {
    fn name(&self) -> &str {
        "csv-directory"
    }

    fn load(&self, desc: &SeriesDescriptor) -> Result<Option<DataFrame>> {
        let path = self.path_for(desc);
        if !path.exists() {
            debug!(series = %desc.key, path = %path.display(), "file not found");
            return Ok(None);
        }
        let table = read_csv(&path)?;
        Ok(Some(select_columns(table, desc)))
    }
}

/// Serves tables held in memory, keyed by series key.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    tables: HashMap<String, DataFrame>,
}

impl MemorySource {
    /// Create an empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a table for `key`.
    pub fn with(mut self, key: &str, table: DataFrame) -> Self {
        self.tables.insert(key.to_string(), table);
        self
    }

    /// Add a table for `key`.
    pub fn insert(&mut self, key: &str, table: DataFrame) {
        self.tables.insert(key.to_string(), table);
    }
}

impl SeriesSource for MemorySource {
    fn name(&self) -> &str {
        "memory"
    }

    fn load(&self, desc: &SeriesDescriptor) -> Result<Option<DataFrame>> {
        Ok(self.tables.get(&desc.key).cloned())
    }
}

/// Read a CSV file with a header row, decoding Latin-1 when it is not UTF-8.
///
/// # Errors
///
/// Fails on I/O errors or malformed CSV.
pub fn read_csv(path: &Path) -> Result<DataFrame> {
    let bytes = fs::read(path)?;
    let text = match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) => {
            debug!(path = %path.display(), "not UTF-8, decoding as Latin-1");
            e.into_bytes().iter().map(|&b| char::from(b)).collect()
        }
    };
    CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(None)
        .into_reader_with_file_handle(Cursor::new(text.into_bytes()))
        .finish()
        .map_err(|e| DataError::Parse(format!("{}: {e}", path.display())))
}

/// Keep the date column and the resolved value columns of a raw table.
///
/// External tables are returned whole. A table where no value column
/// matches is also returned whole, so the merge can report it.
fn select_columns(table: DataFrame, desc: &SeriesDescriptor) -> DataFrame {
    if desc.role == SeriesRole::External {
        return table;
    }
    let Some(date) = find_column(&table, std::slice::from_ref(&desc.date_column)) else {
        return table;
    };
    let mut keep = vec![date];
    for set in desc.alias_sets() {
        if let Some(name) = find_column(&table, &set.aliases) {
            if !keep.contains(&name) {
                keep.push(name);
            }
        }
    }
    if keep.len() == 1 {
        debug!(series = %desc.key, columns = ?column_names(&table), "no value column matched");
        return table;
    }
    table.select(keep).unwrap_or(table)
}
