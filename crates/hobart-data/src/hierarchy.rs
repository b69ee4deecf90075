//! Market → sector → industry → stock membership.
//!
//! Sectors and industries are keyed by dense ids assigned in order of
//! first appearance; stocks are keyed by their panel row index. The
//! membership maps are total and immutable once built: every stock
//! belongs to exactly one industry and every industry to exactly one
//! sector, for the lifetime of the run.

use serde::{Deserialize, Serialize};

/// Immutable classification of the stock universe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hierarchy {
    sector_names: Vec<String>,
    industry_names: Vec<String>,
    /// Industry id -> sector id
    industry_sector: Vec<usize>,
    /// Stock index -> industry id
    stock_industry: Vec<usize>,
    symbols: Vec<String>,
    /// Sector id -> member industry ids
    sector_industries: Vec<Vec<usize>>,
    /// Industry id -> member stock indices
    industry_stocks: Vec<Vec<usize>>,
}

impl Hierarchy {
    /// Build the hierarchy from `(symbol, sector, industry)` labels,
    /// in panel row order.
    ///
    /// Ids are assigned in order of first appearance, so the same
    /// labels always produce the same hierarchy.
    pub fn from_labels<S: AsRef<str>>(labels: &[(S, S, S)]) -> Self {
        let mut sector_names: Vec<String> = Vec::new();
        let mut industry_names: Vec<String> = Vec::new();
        let mut industry_sector: Vec<usize> = Vec::new();
        let mut stock_industry: Vec<usize> = Vec::new();
        let mut symbols: Vec<String> = Vec::new();

        for (symbol, sector, industry) in labels {
            let sector = sector.as_ref();
            let industry = industry.as_ref();

            let sector_id = match sector_names.iter().position(|s| s == sector) {
                Some(id) => id,
                None => {
                    sector_names.push(sector.to_string());
                    sector_names.len() - 1
                }
            };
            // Industries are namespaced by sector: the same industry label
            // under two sectors is two distinct nodes.
            let industry_id = match industry_names
                .iter()
                .enumerate()
                .position(|(id, name)| name == industry && industry_sector[id] == sector_id)
            {
                Some(id) => id,
                None => {
                    industry_names.push(industry.to_string());
                    industry_sector.push(sector_id);
                    industry_names.len() - 1
                }
            };

            symbols.push(symbol.as_ref().to_string());
            stock_industry.push(industry_id);
        }

        let mut sector_industries = vec![Vec::new(); sector_names.len()];
        for (industry_id, &sector_id) in industry_sector.iter().enumerate() {
            sector_industries[sector_id].push(industry_id);
        }
        let mut industry_stocks = vec![Vec::new(); industry_names.len()];
        for (stock, &industry_id) in stock_industry.iter().enumerate() {
            industry_stocks[industry_id].push(stock);
        }

        Self {
            sector_names,
            industry_names,
            industry_sector,
            stock_industry,
            symbols,
            sector_industries,
            industry_stocks,
        }
    }

    /// Number of sectors.
    pub fn num_sectors(&self) -> usize {
        self.sector_names.len()
    }

    /// Number of industries.
    pub fn num_industries(&self) -> usize {
        self.industry_names.len()
    }

    /// Number of stocks.
    pub fn num_stocks(&self) -> usize {
        self.symbols.len()
    }

    /// Sector id of an industry.
    pub fn sector_of_industry(&self, industry: usize) -> usize {
        self.industry_sector[industry]
    }

    /// Industry id of a stock.
    pub fn industry_of_stock(&self, stock: usize) -> usize {
        self.stock_industry[stock]
    }

    /// Sector id of a stock.
    pub fn sector_of_stock(&self, stock: usize) -> usize {
        self.industry_sector[self.stock_industry[stock]]
    }

    /// Member industry ids of a sector.
    pub fn industries_in_sector(&self, sector: usize) -> &[usize] {
        &self.sector_industries[sector]
    }

    /// Member stock indices of an industry.
    pub fn stocks_in_industry(&self, industry: usize) -> &[usize] {
        &self.industry_stocks[industry]
    }

    /// Member stock indices of a sector, across all of its industries.
    pub fn stocks_in_sector(&self, sector: usize) -> Vec<usize> {
        self.sector_industries[sector]
            .iter()
            .flat_map(|&industry| self.industry_stocks[industry].iter().copied())
            .collect()
    }

    /// Symbol of a stock.
    pub fn symbol(&self, stock: usize) -> &str {
        &self.symbols[stock]
    }

    /// All symbols, in panel row order.
    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    /// Name of a sector.
    pub fn sector_name(&self, sector: usize) -> &str {
        &self.sector_names[sector]
    }

    /// Name of an industry.
    pub fn industry_name(&self, industry: usize) -> &str {
        &self.industry_names[industry]
    }
}
