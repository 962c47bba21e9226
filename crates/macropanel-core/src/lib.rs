#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/macropanel/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod audit;
pub mod calendar;
pub mod config;
pub mod error;
pub mod frame;
pub mod merge;
pub mod registry;
pub mod resample;
pub mod series;
pub mod transform;

pub use audit::{ColumnMissing, MissingReport};
pub use config::{DateRange, PANEL_DATE_COLUMN, PanelConfig};
pub use error::{PanelError, Result};
pub use merge::{MergeReport, Merged, Merger, merge};
pub use registry::{SeriesEntry, SeriesRegistry};
pub use resample::{resample, resample_named};
pub use series::{Aggregation, ColumnAlias, SeriesDescriptor, SeriesRole, SourceKind};
pub use transform::{Derivation, Transformed, Transformer, transform};
