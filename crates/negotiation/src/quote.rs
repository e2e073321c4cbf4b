//! Supplier quotes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use restock_core::{ProductId, SupplierId};

/// One supplier's response to a request for quote.
///
/// Ephemeral: held only for the duration of a single negotiation round and
/// never persisted by the core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub supplier_id: SupplierId,
    pub product_id: ProductId,
    pub unit_price: f64,
    pub lead_time_days: u32,
    pub minimum_order_quantity: u32,
    /// End of the quote's validity window; quotes arriving or evaluated after
    /// this instant are excluded from ranking.
    pub valid_until: DateTime<Utc>,
}

impl Quote {
    /// Whether the quote is still inside its validity window.
    pub fn is_valid_at(&self, at: DateTime<Utc>) -> bool {
        at <= self.valid_until
    }
}
