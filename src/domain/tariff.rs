use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::common::fold;

/// A concept→price entry. Prices are overwritten in place; dues keep a snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Tariff {
    pub concept: String,
    pub price: Decimal,
}

impl Tariff {
    pub fn new(concept: impl Into<String>, price: Decimal) -> Self {
        Self {
            concept: concept.into(),
            price,
        }
    }
}

/// Lookup view over the tariff table keyed by folded concept name.
#[derive(Debug, Clone, Default)]
pub struct TariffTable {
    prices: HashMap<String, Decimal>,
}

impl TariffTable {
    pub fn from_tariffs(tariffs: impl IntoIterator<Item = Tariff>) -> Self {
        // Later rows win, matching an in-place overwrite.
        let prices = tariffs
            .into_iter()
            .map(|tariff| (fold(&tariff.concept), tariff.price))
            .collect();
        Self { prices }
    }

    pub fn get(&self, concept: &str) -> Option<Decimal> {
        self.prices.get(&fold(concept)).copied()
    }

    /// Price for a member's concept, falling back to `default` when the concept is
    /// missing, blank, or not in the table.
    pub fn price_or(&self, concept: Option<&str>, default: Decimal) -> Decimal {
        concept
            .and_then(|concept| self.get(concept))
            .unwrap_or(default)
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }
}
