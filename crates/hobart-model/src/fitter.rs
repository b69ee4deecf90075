//! Top-down sequential fit of the four hierarchy levels.
//!
//! The joint posterior over all levels is intractable to maximize
//! exactly, so each level is fitted in turn against the cross-sectional
//! mean log-price series of its member stocks, anchored to the frozen
//! fit of its parent from the previous step. Once a level is fitted its
//! parameters are read-only; there is no backtracking.

use crate::prior::{HierarchicalModel, Level};
use crate::trainer::{Anchor, LevelTrainer, NodeFit, TrainerConfig};
use hobart_data::Panel;
use ndarray::{Array1, Array2};
use tracing::debug;

/// Complete parameter set from one sequential run at one degree.
#[derive(Debug, Clone)]
pub struct FittedParameters {
    /// Polynomial degree the parameters were fitted at
    pub degree: usize,

    /// Market root fit
    pub market: NodeFit,

    /// Sector fits, indexed by sector id
    pub sectors: Vec<NodeFit>,

    /// Industry fits, indexed by industry id
    pub industries: Vec<NodeFit>,

    /// Stock fits, indexed by panel row
    pub stocks: Vec<NodeFit>,
}

impl FittedParameters {
    /// Fit of one node, addressed by level and node index.
    ///
    /// The market index is ignored (there is a single root).
    pub fn node(&self, level: Level, index: usize) -> &NodeFit {
        match level {
            Level::Market => &self.market,
            Level::Sector => &self.sectors[index],
            Level::Industry => &self.industries[index],
            Level::Stock => &self.stocks[index],
        }
    }

    /// Stock-level fit by panel row.
    pub fn stock(&self, stock: usize) -> &NodeFit {
        &self.stocks[stock]
    }
}

/// Runs [`LevelTrainer`] once per level in market → sector → industry →
/// stock order, threading frozen parent estimates downward.
#[derive(Debug, Clone)]
pub struct SequentialFitter {
    model: HierarchicalModel,
    trainer: TrainerConfig,
}

impl SequentialFitter {
    /// Fitter for one degree and optimizer configuration.
    pub const fn new(model: HierarchicalModel, trainer: TrainerConfig) -> Self {
        Self { model, trainer }
    }

    /// The model being fitted.
    pub const fn model(&self) -> &HierarchicalModel {
        &self.model
    }

    /// Fit every node at every level of the panel's hierarchy.
    pub fn fit(&self, panel: &Panel) -> FittedParameters {
        let hierarchy = panel.hierarchy();
        let tau = panel.normalized_time();
        let design = self.model.design_matrix(tau.view());
        let trainer = LevelTrainer::new(&self.model, &self.trainer);

        debug!(
            degree = self.model.degree(),
            stocks = hierarchy.num_stocks(),
            industries = hierarchy.num_industries(),
            sectors = hierarchy.num_sectors(),
            window = panel.len(),
            "sequential fit"
        );

        // Market: mean of all stock series, zero-mean root anchor.
        let all_stocks: Vec<usize> = (0..hierarchy.num_stocks()).collect();
        let market_target = group_mean(panel, &all_stocks);
        let market = trainer
            .fit_level(
                Level::Market,
                market_target
                    .view()
                    .insert_axis(ndarray::Axis(0)),
                design.view(),
                &[Anchor::root(self.model.num_coefficients())],
            )
            .into_iter()
            .next()
            .expect("market level has exactly one node");

        // Sectors, anchored on the frozen market fit.
        let mut sector_targets = Array2::zeros((hierarchy.num_sectors(), panel.len()));
        for sector in 0..hierarchy.num_sectors() {
            sector_targets
                .row_mut(sector)
                .assign(&group_mean(panel, &hierarchy.stocks_in_sector(sector)));
        }
        let sector_anchors = vec![market.as_anchor(); hierarchy.num_sectors()];
        let sectors = trainer.fit_level(
            Level::Sector,
            sector_targets.view(),
            design.view(),
            &sector_anchors,
        );

        // Industries, each anchored on its own sector's fit.
        let mut industry_targets = Array2::zeros((hierarchy.num_industries(), panel.len()));
        for industry in 0..hierarchy.num_industries() {
            industry_targets
                .row_mut(industry)
                .assign(&group_mean(panel, hierarchy.stocks_in_industry(industry)));
        }
        let industry_anchors: Vec<Anchor> = (0..hierarchy.num_industries())
            .map(|industry| sectors[hierarchy.sector_of_industry(industry)].as_anchor())
            .collect();
        let industries = trainer.fit_level(
            Level::Industry,
            industry_targets.view(),
            design.view(),
            &industry_anchors,
        );

        // Stocks, each against its own series, anchored on its industry.
        let stock_anchors: Vec<Anchor> = (0..hierarchy.num_stocks())
            .map(|stock| industries[hierarchy.industry_of_stock(stock)].as_anchor())
            .collect();
        let stocks = trainer.fit_level(
            Level::Stock,
            panel.log_prices(),
            design.view(),
            &stock_anchors,
        );

        FittedParameters {
            degree: self.model.degree(),
            market,
            sectors,
            industries,
            stocks,
        }
    }
}

/// Simple arithmetic mean of a group of stock series.
///
/// Weighted aggregation is a deliberate non-choice here: the anchoring
/// prior treats member stocks as exchangeable within a group.
fn group_mean(panel: &Panel, stocks: &[usize]) -> Array1<f64> {
    let mut mean = Array1::<f64>::zeros(panel.len());
    for &stock in stocks {
        mean += &panel.stock_series(stock);
    }
    mean / stocks.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::{assert_abs_diff_eq, assert_relative_eq};
    use chrono::NaiveDate;
    use hobart_data::{PanelConfig, StockRecord};

    fn record(symbol: &str, sector: &str, industry: &str, log_prices: &[f64]) -> StockRecord {
        StockRecord {
            symbol: symbol.to_string(),
            sector: sector.to_string(),
            industry: industry.to_string(),
            close: log_prices.iter().map(|&y| y.exp()).collect(),
        }
    }

    fn dates(n: usize) -> Vec<NaiveDate> {
        let start = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        (0..n).map(|i| start + chrono::Days::new(i as u64)).collect()
    }

    fn linear_series(len: usize, intercept: f64, slope: f64) -> Vec<f64> {
        (1..=len)
            .map(|t| intercept + slope * t as f64 / len as f64)
            .collect()
    }

    fn panel_config(window: usize) -> PanelConfig {
        PanelConfig {
            window,
            min_history: window,
        }
    }

    #[test]
    fn test_group_mean_restricted_to_members() {
        let len = 30;
        let records = vec![
            record("A", "S1", "I1", &linear_series(len, 1.0, 0.0)),
            record("B", "S1", "I1", &linear_series(len, 3.0, 0.0)),
            record("C", "S1", "I2", &linear_series(len, 9.0, 0.0)),
        ];
        let panel = Panel::new(records, &dates(len), &panel_config(len)).unwrap();

        let i1 = group_mean(&panel, panel.hierarchy().stocks_in_industry(0));
        assert_relative_eq!(i1[0], 2.0, epsilon = 1e-12);
        let all = group_mean(&panel, &[0, 1, 2]);
        assert_relative_eq!(all[len - 1], 13.0 / 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_fit_produces_parameters_for_every_node() {
        let len = 40;
        let records = vec![
            record("A", "S1", "I1", &linear_series(len, 4.0, 0.1)),
            record("B", "S1", "I1", &linear_series(len, 4.2, 0.1)),
            record("C", "S1", "I2", &linear_series(len, 3.8, -0.1)),
            record("D", "S2", "I3", &linear_series(len, 4.1, 0.0)),
        ];
        let panel = Panel::new(records, &dates(len), &panel_config(len)).unwrap();
        let fitter = SequentialFitter::new(
            HierarchicalModel::new(2),
            TrainerConfig {
                max_iterations: 800,
                ..TrainerConfig::default()
            },
        );

        let fitted = fitter.fit(&panel);

        assert_eq!(fitted.degree, 2);
        assert_eq!(fitted.sectors.len(), 2);
        assert_eq!(fitted.industries.len(), 3);
        assert_eq!(fitted.stocks.len(), 4);
        assert_eq!(fitted.market.phi.len(), 3);
        assert_eq!(fitted.node(Level::Stock, 3).phi.len(), 3);
        for fit in &fitted.stocks {
            assert!(fit.objective.is_finite());
            assert!(fit.sigma() > 0.0);
        }
    }

    #[test]
    fn test_market_fit_tracks_cross_sectional_mean() {
        let len = 50;
        // Mean of the two series is flat at 5.0.
        let records = vec![
            record("UP", "S1", "I1", &linear_series(len, 4.7, 0.6)),
            record("DN", "S1", "I2", &linear_series(len, 5.3, -0.6)),
        ];
        let panel = Panel::new(records, &dates(len), &panel_config(len)).unwrap();
        let fitter =
            SequentialFitter::new(HierarchicalModel::new(1), TrainerConfig::default());

        let fitted = fitter.fit(&panel);

        assert_relative_eq!(fitted.market.phi[0], 5.0, epsilon = 0.1);
        assert_abs_diff_eq!(fitted.market.phi[1], 0.0, epsilon = 0.1);
    }

    #[test]
    fn test_refit_is_bit_identical() {
        let len = 40;
        let records = vec![
            record("A", "S1", "I1", &linear_series(len, 4.0, 0.2)),
            record("B", "S1", "I2", &linear_series(len, 3.9, -0.3)),
        ];
        let panel = Panel::new(records, &dates(len), &panel_config(len)).unwrap();
        let fitter = SequentialFitter::new(
            HierarchicalModel::new(2),
            TrainerConfig {
                max_iterations: 600,
                ..TrainerConfig::default()
            },
        );

        let first = fitter.fit(&panel);
        let second = fitter.fit(&panel);

        assert_eq!(first.market.phi, second.market.phi);
        assert_eq!(first.market.psi, second.market.psi);
        for (a, b) in first.stocks.iter().zip(&second.stocks) {
            assert_eq!(a.phi, b.phi);
            assert_eq!(a.psi, b.psi);
        }
    }

    #[test]
    fn test_smaller_industry_sits_closer_to_its_sector() {
        // Three industries in one sector. P and Q deviate from the
        // sector by the same linear trend, but Q's two stocks carry a
        // common oscillation that P's four stocks cancel pairwise, so
        // Q's mean series is noisier and gets shrunk harder toward the
        // sector fit.
        let len = 40;
        let base = 4.0;
        let slope = 1.0;
        let amplitude = 2.0;

        let osc: Vec<f64> = (0..len)
            .map(|t| {
                if t < len / 4 || t >= len - len / 4 {
                    amplitude
                } else {
                    -amplitude
                }
            })
            .collect();
        let trend: Vec<f64> = (1..=len)
            .map(|t| base + slope * t as f64 / len as f64)
            .collect();
        let flat: Vec<f64> = vec![base; len];

        let with_osc = |sign: f64| -> Vec<f64> {
            trend.iter().zip(&osc).map(|(&y, &o)| y + sign * o).collect()
        };

        let records = vec![
            // Industry P: oscillations cancel in the mean.
            record("P1", "S", "P", &with_osc(1.0)),
            record("P2", "S", "P", &with_osc(-1.0)),
            record("P3", "S", "P", &with_osc(1.0)),
            record("P4", "S", "P", &with_osc(-1.0)),
            // Industry Q: oscillations reinforce in the mean.
            record("Q1", "S", "Q", &with_osc(1.0)),
            record("Q2", "S", "Q", &with_osc(1.0)),
            // Industry R pins the sector mean below P's and Q's trend.
            record("R1", "S", "R", &flat),
            record("R2", "S", "R", &flat),
            record("R3", "S", "R", &flat),
            record("R4", "S", "R", &flat),
        ];
        let panel = Panel::new(records, &dates(len), &panel_config(len)).unwrap();
        let fitter =
            SequentialFitter::new(HierarchicalModel::new(1), TrainerConfig::default());

        let fitted = fitter.fit(&panel);
        let hierarchy = panel.hierarchy();
        let sector_slope = fitted.sectors[0].phi[1];
        let p = hierarchy
            .symbols()
            .iter()
            .position(|s| s == "P1")
            .map(|stock| hierarchy.industry_of_stock(stock))
            .unwrap();
        let q = hierarchy
            .symbols()
            .iter()
            .position(|s| s == "Q1")
            .map(|stock| hierarchy.industry_of_stock(stock))
            .unwrap();

        let p_distance = (fitted.industries[p].phi[1] - sector_slope).abs();
        let q_distance = (fitted.industries[q].phi[1] - sector_slope).abs();
        assert!(
            q_distance < p_distance,
            "industry with the noisier mean ({q_distance}) should sit closer to the sector \
             than the industry whose noise averages out ({p_distance})"
        );
    }
}
