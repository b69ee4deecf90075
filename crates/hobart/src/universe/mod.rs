//! Universe management for the Hobart trend model.
//!
//! The engine fits whatever symbols it is handed; this module provides
//! the default flat watchlist and the trait that symbol sources
//! implement.

pub mod watchlist;

pub use watchlist::Watchlist;

/// Trait for stock universes.
pub trait Universe {
    /// Get all symbols in the universe.
    fn symbols(&self) -> Vec<String>;

    /// Check if a symbol is in the universe.
    fn contains(&self, symbol: &str) -> bool {
        self.symbols().contains(&symbol.to_string())
    }

    /// Get the number of constituents.
    fn size(&self) -> usize {
        self.symbols().len()
    }
}
