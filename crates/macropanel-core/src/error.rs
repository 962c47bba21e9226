//! Error types for panel construction.

use thiserror::Error;

/// Result type for panel operations.
pub type Result<T> = std::result::Result<T, PanelError>;

/// Errors that can occur while resampling, merging or transforming series.
///
/// Only fatal conditions are represented here. Missing optional series and
/// numeric edge cases degrade the panel and are reported, not raised.
#[derive(Debug, Error)]
pub enum PanelError {
    /// Aggregation method name not recognized
    #[error("Unknown aggregation method '{0}' (expected one of: last, mean, sum)")]
    UnknownAggregation(String),

    /// Invalid date range
    #[error("Invalid date range: start {start} is not before end {end}")]
    InvalidDateRange {
        /// Start date of the range
        start: String,
        /// End date of the range
        end: String,
    },

    /// Inconsistent panel configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// The base series is absent from the registry
    #[error("Base series '{0}' is required but was not loaded")]
    MissingBaseSeries(String),

    /// A required column is not present in a table
    #[error("Column '{column}' not found in table for '{table}'")]
    MissingColumn {
        /// Table (series key) being processed
        table: String,
        /// Column that was looked up
        column: String,
    },

    /// Timestamp could not be parsed
    #[error("Cannot parse '{value}' in column '{column}' as a timestamp")]
    InvalidTimestamp {
        /// Date column name
        column: String,
        /// Offending raw value
        value: String,
    },

    /// Polars error
    #[error("Polars error: {0}")]
    Polars(#[from] polars::prelude::PolarsError),
}

impl PanelError {
    /// Whether this error stems from configuration rather than data.
    pub const fn is_config(&self) -> bool {
        matches!(
            self,
            Self::UnknownAggregation(_) | Self::InvalidDateRange { .. } | Self::Config(_)
        )
    }
}
