#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/hobart/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod score;
pub mod stats;

pub use score::{FORWARD_DAYS, PredictionRow, Rating, ScoreError, ScoringEngine, StockScore};
pub use stats::{EstimationCurve, LogNormalStats, estimation_curve};
