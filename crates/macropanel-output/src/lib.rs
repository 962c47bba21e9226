#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/macropanel/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod events;
pub mod export;
pub mod panel;
pub mod summary;

pub use events::{EventAnnotation, EventCategory, PolicyEvent, annotate, default_events};
pub use export::{ExportError, ExportFormat, Exporter};
pub use panel::{PanelFormat, read_panel, write_panel};
pub use summary::{RunSummary, preview};
