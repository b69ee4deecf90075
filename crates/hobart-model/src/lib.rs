#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/hobart/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod fitter;
pub mod math;
pub mod prior;
pub mod selector;
pub mod trainer;

pub use fitter::{FittedParameters, SequentialFitter};
pub use prior::{HierarchicalModel, Level};
pub use selector::{
    CandidateDiagnostic, ConfigError, HOLDOUT_DAYS, OrderSelector, SelectionOutcome,
    SelectorConfig,
};
pub use trainer::{Anchor, LevelTrainer, NodeFit, TrainerConfig};
