//! Scorecard state and the EWMA update rule.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use restock_core::{ProductId, SupplierId};
use restock_negotiation::{RankingWeights, SupplierStanding};

/// One delivered (or failed) shipment, as reported by the surrounding system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryOutcome {
    pub supplier_id: SupplierId,
    pub product_id: ProductId,
    pub promised_date: DateTime<Utc>,
    pub actual_date: DateTime<Utc>,
    /// False when the shipment had defects or returns.
    pub quality_ok: bool,
    pub unit_price: f64,
}

/// Tracker tunables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// Weight of the newest observation in the rolling averages (0..=1).
    /// Higher values make recent performance dominate faster.
    pub ewma_weight: f64,
    /// Slack added to the promised date before a delivery counts as late.
    pub grace_period: Duration,
    /// Weights shared with negotiation ranking so composites and quote
    /// scores use the same scheme.
    pub weights: RankingWeights,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            ewma_weight: 0.3,
            grace_period: Duration::from_secs(24 * 60 * 60),
            weights: RankingWeights::default(),
        }
    }
}

/// Rolling performance summary for one supplier on one product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupplierScorecard {
    pub supplier_id: SupplierId,
    pub product_id: ProductId,
    /// EWMA of on-time indicators in [0,1].
    pub on_time_rate: f64,
    /// EWMA of defect indicators in [0,1].
    pub defect_rate: f64,
    /// EWMA unit price actually paid.
    pub avg_unit_price: f64,
    /// EWMA price-trend score in [0,1]; 1 means prices holding or falling.
    pub price_trend: f64,
    /// Composite in [0,1], recomputed deterministically on every update.
    pub composite: f64,
    pub deliveries: u64,
    pub on_time_deliveries: u64,
    pub updated_at: DateTime<Utc>,
}

impl SupplierScorecard {
    pub fn new(supplier_id: SupplierId, product_id: ProductId) -> Self {
        Self {
            supplier_id,
            product_id,
            on_time_rate: 0.0,
            defect_rate: 0.0,
            avg_unit_price: 0.0,
            price_trend: 0.0,
            composite: 0.0,
            deliveries: 0,
            on_time_deliveries: 0,
            updated_at: Utc::now(),
        }
    }

    /// Fold one delivery outcome into the rolling aggregates and recompute
    /// the composite.
    pub fn record(&mut self, outcome: &DeliveryOutcome, config: &TrackerConfig) {
        let grace =
            chrono::Duration::from_std(config.grace_period).unwrap_or_else(|_| chrono::Duration::zero());
        let on_time = outcome.actual_date <= outcome.promised_date + grace;
        let defect = !outcome.quality_ok;

        // Prices at or below the rolling average score 1; increases score by
        // how much of the old price level they keep.
        let price_score = if self.deliveries == 0 || self.avg_unit_price <= 0.0 {
            1.0
        } else if outcome.unit_price <= self.avg_unit_price {
            1.0
        } else {
            (self.avg_unit_price / outcome.unit_price).clamp(0.0, 1.0)
        };

        if self.deliveries == 0 {
            // First observation seeds the averages directly, keeping replays
            // deterministic regardless of the starting zeros.
            self.on_time_rate = if on_time { 1.0 } else { 0.0 };
            self.defect_rate = if defect { 1.0 } else { 0.0 };
            self.avg_unit_price = outcome.unit_price.max(0.0);
            self.price_trend = price_score;
        } else {
            let w = config.ewma_weight.clamp(0.0, 1.0);
            self.on_time_rate = ewma(self.on_time_rate, if on_time { 1.0 } else { 0.0 }, w);
            self.defect_rate = ewma(self.defect_rate, if defect { 1.0 } else { 0.0 }, w);
            self.avg_unit_price = ewma(self.avg_unit_price, outcome.unit_price.max(0.0), w);
            self.price_trend = ewma(self.price_trend, price_score, w);
        }

        self.deliveries += 1;
        if on_time {
            self.on_time_deliveries += 1;
        }
        self.updated_at = outcome.actual_date;

        self.composite = config
            .weights
            .blend(self.price_trend, 1.0 - self.defect_rate, self.on_time_rate)
            .clamp(0.0, 1.0);
    }

    /// The view negotiation ranks with.
    pub fn standing(&self) -> SupplierStanding {
        SupplierStanding {
            composite: self.composite,
            on_time_deliveries: self.on_time_deliveries,
        }
    }
}

fn ewma(old: f64, observation: f64, weight: f64) -> f64 {
    weight * observation + (1.0 - weight) * old
}
