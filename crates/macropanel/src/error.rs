//! Error types for the pipeline.

use thiserror::Error;

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Errors that abort a pipeline run.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Panel construction error
    #[error(transparent)]
    Panel(#[from] macropanel_core::PanelError),

    /// Data source error
    #[error(transparent)]
    Data(#[from] macropanel_data::DataError),

    /// Export error
    #[error(transparent)]
    Export(#[from] macropanel_output::ExportError),

    /// Polars error
    #[error("Polars error: {0}")]
    Polars(#[from] polars::prelude::PolarsError),

    /// Settings file could not be parsed
    #[error("Invalid settings file: {0}")]
    Toml(#[from] toml::de::Error),

    /// Invalid settings
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
