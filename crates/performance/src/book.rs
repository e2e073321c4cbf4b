//! Shared scorecard registry.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use restock_core::{ProductId, SupplierId};
use restock_negotiation::SupplierStanding;

use crate::scorecard::{DeliveryOutcome, SupplierScorecard, TrackerConfig};

type Key = (SupplierId, ProductId);

/// Registry of scorecards keyed by (supplier, product).
///
/// Read by concurrent negotiation runs and mutated by delivery-outcome
/// events. Each card sits behind its own lock, so an update is an exclusive
/// section per key; readers observe either the pre- or post-update card,
/// never a torn one.
pub struct ScorecardBook {
    config: TrackerConfig,
    cards: RwLock<HashMap<Key, Arc<RwLock<SupplierScorecard>>>>,
}

impl ScorecardBook {
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            config,
            cards: RwLock::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Fold a delivery outcome into the supplier's card and return the
    /// updated snapshot.
    pub fn record_outcome(&self, outcome: &DeliveryOutcome) -> SupplierScorecard {
        let entry = self.entry(outcome.supplier_id, outcome.product_id);
        let mut card = entry.write().unwrap_or_else(|e| e.into_inner());
        card.record(outcome, &self.config);
        card.clone()
    }

    /// Current card for a supplier/product pair, if any outcome was recorded.
    pub fn get(&self, supplier_id: SupplierId, product_id: ProductId) -> Option<SupplierScorecard> {
        let cards = self.cards.read().unwrap_or_else(|e| e.into_inner());
        cards
            .get(&(supplier_id, product_id))
            .map(|c| c.read().unwrap_or_else(|e| e.into_inner()).clone())
    }

    /// Standings for a set of suppliers on one product, as negotiation input.
    ///
    /// Suppliers without any recorded outcome get the neutral default
    /// standing.
    pub fn standings_for(
        &self,
        product_id: ProductId,
        suppliers: &[SupplierId],
    ) -> HashMap<SupplierId, SupplierStanding> {
        suppliers
            .iter()
            .map(|&s| {
                let standing = self
                    .get(s, product_id)
                    .map(|card| card.standing())
                    .unwrap_or_default();
                (s, standing)
            })
            .collect()
    }

    fn entry(&self, supplier_id: SupplierId, product_id: ProductId) -> Arc<RwLock<SupplierScorecard>> {
        let key = (supplier_id, product_id);
        {
            let cards = self.cards.read().unwrap_or_else(|e| e.into_inner());
            if let Some(card) = cards.get(&key) {
                return card.clone();
            }
        }
        let mut cards = self.cards.write().unwrap_or_else(|e| e.into_inner());
        cards
            .entry(key)
            .or_insert_with(|| {
                Arc::new(RwLock::new(SupplierScorecard::new(supplier_id, product_id)))
            })
            .clone()
    }
}

impl Default for ScorecardBook {
    fn default() -> Self {
        Self::new(TrackerConfig::default())
    }
}
