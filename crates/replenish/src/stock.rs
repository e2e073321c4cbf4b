//! Product configuration and inventory snapshots.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use restock_core::ProductId;

/// Catalog product with its replenishment configuration.
///
/// Owned by inventory configuration outside the core; immutable here except
/// for threshold tuning done by that owner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    /// Cost per unit, used to derive holding cost.
    pub unit_cost: f64,
    /// Buffer quantity absorbing demand/lead-time variability.
    pub safety_stock: u32,
    /// Estimated supplier lead time in days.
    pub lead_time_days: u32,
    pub active: bool,
}

/// Point-in-time view of a product's stock position.
///
/// Read at workflow start and never mutated by the core; stock mutation is
/// the inventory store's responsibility, triggered by placed orders.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InventorySnapshot {
    pub product_id: ProductId,
    pub on_hand: i64,
    pub on_order: i64,
    pub taken_at: DateTime<Utc>,
}

impl InventorySnapshot {
    /// Inventory position: units available now plus units already ordered.
    pub fn position(&self) -> i64 {
        self.on_hand + self.on_order
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn position_sums_on_hand_and_on_order() {
        let snap = InventorySnapshot {
            product_id: ProductId::new(),
            on_hand: 12,
            on_order: 30,
            taken_at: Utc::now(),
        };
        assert_eq!(snap.position(), 42);
    }
}
