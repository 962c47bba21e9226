#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/macropanel/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod download;
pub mod error;
pub mod fred;
pub mod observation;
pub mod source;
pub mod yahoo;

pub use download::{DownloadReport, DownloadStatus, Downloader};
pub use error::{DataError, Result};
pub use fred::FredClient;
pub use observation::Observation;
pub use source::{CsvDirectorySource, MemorySource, SeriesSource};
pub use yahoo::YahooQuoteProvider;

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
