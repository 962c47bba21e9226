#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/macropanel/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod error;
pub mod pipeline;
pub mod settings;

pub use error::{PipelineError, Result};
pub use pipeline::{Built, EVENTS_FILE, LoadReport, LoadedSeries, Pipeline, SUMMARY_FILE};
pub use settings::{DEFAULT_SETTINGS_FILE, DownloadConfig, PathsConfig, Settings};

pub use macropanel_core as panel;
pub use macropanel_data as data;
pub use macropanel_output as output;

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
