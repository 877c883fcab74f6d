//! Item catalog
//!
//! Fixed item-type → price table. Built once at startup and injected into
//! the purchase handler; never mutated afterwards.

use std::collections::BTreeMap;
use std::path::Path;

use super::Amount;

/// Prices of the default merch assortment
const DEFAULT_PRICES: &[(&str, i64)] = &[
    ("t-shirt", 80),
    ("cup", 20),
    ("book", 50),
    ("pen", 10),
    ("powerbank", 200),
    ("hoody", 300),
    ("umbrella", 200),
    ("socks", 10),
    ("wallet", 50),
    ("pink-hoody", 500),
];

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Failed to read catalog file: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed JSON or a price that is not a positive integer
    #[error("Invalid catalog: {0}")]
    Invalid(#[from] serde_json::Error),

    #[error("Catalog contains an empty item name")]
    EmptyItemName,
}

/// Static mapping from item type to price
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Catalog {
    prices: BTreeMap<String, Amount>,
}

impl Catalog {
    pub fn new(prices: BTreeMap<String, Amount>) -> Self {
        Self { prices }
    }

    /// Parse a JSON object of `{"item": price, ...}`
    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let prices: BTreeMap<String, Amount> = serde_json::from_str(json)?;
        if prices.keys().any(|name| name.trim().is_empty()) {
            return Err(CatalogError::EmptyItemName);
        }
        Ok(Self { prices })
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Price of `item_type`, if the catalog sells it
    pub fn price_of(&self, item_type: &str) -> Option<Amount> {
        self.prices.get(item_type).copied()
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }
}

impl Default for Catalog {
    fn default() -> Self {
        let prices = DEFAULT_PRICES
            .iter()
            .filter_map(|(name, price)| Amount::new(*price).ok().map(|p| (name.to_string(), p)))
            .collect();
        Self { prices }
    }
}
