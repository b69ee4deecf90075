#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/hobart/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod error;
pub mod hierarchy;
pub mod panel;

pub use error::{DataError, Result};
pub use hierarchy::Hierarchy;
pub use panel::{Exclusion, Panel, PanelConfig, StockRecord};

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
