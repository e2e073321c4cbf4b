//! Historical demand series.

use serde::{Deserialize, Serialize};

use restock_core::ProductId;

/// Read-only ordered sequence of past per-period demand values (oldest first).
///
/// Periods are abstract; the pipeline uses daily periods throughout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DemandHistory {
    product_id: ProductId,
    periods: Vec<f64>,
}

impl DemandHistory {
    pub fn new(product_id: ProductId, periods: Vec<f64>) -> Self {
        Self {
            product_id,
            periods,
        }
    }

    pub fn product_id(&self) -> ProductId {
        self.product_id
    }

    pub fn periods(&self) -> &[f64] {
        &self.periods
    }

    pub fn len(&self) -> usize {
        self.periods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.periods.is_empty()
    }

    /// Whether the series covers at least one full seasonal cycle.
    ///
    /// Seasonal-pattern detection needs a complete cycle; shorter series fall
    /// back to trend-only extrapolation.
    pub fn covers_cycle(&self, cycle_len: usize) -> bool {
        cycle_len > 0 && self.periods.len() >= cycle_len
    }

    /// Mean demand per period (0 for an empty series).
    pub fn mean(&self) -> f64 {
        if self.periods.is_empty() {
            return 0.0;
        }
        self.periods.iter().sum::<f64>() / self.periods.len() as f64
    }

    /// Standard deviation of period-over-period changes.
    ///
    /// Used as the volatility input for confidence bands.
    pub fn delta_std_dev(&self) -> f64 {
        if self.periods.len() < 2 {
            return 0.0;
        }
        let deltas: Vec<f64> = self.periods.windows(2).map(|w| w[1] - w[0]).collect();
        let mean = deltas.iter().sum::<f64>() / deltas.len() as f64;
        let var = deltas.iter().map(|d| (d - mean).powi(2)).sum::<f64>() / deltas.len() as f64;
        var.sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn history(values: &[f64]) -> DemandHistory {
        DemandHistory::new(ProductId::new(), values.to_vec())
    }

    #[test]
    fn mean_of_empty_series_is_zero() {
        assert_eq!(history(&[]).mean(), 0.0);
    }

    #[test]
    fn covers_cycle_requires_full_cycle() {
        let h = history(&[1.0, 2.0, 3.0]);
        assert!(h.covers_cycle(3));
        assert!(!h.covers_cycle(4));
        assert!(!h.covers_cycle(0));
    }

    #[test]
    fn delta_std_dev_is_zero_for_constant_series() {
        let h = history(&[4.0, 4.0, 4.0, 4.0]);
        assert_eq!(h.delta_std_dev(), 0.0);
    }

    #[test]
    fn delta_std_dev_positive_for_noisy_series() {
        let h = history(&[1.0, 5.0, 2.0, 8.0]);
        assert!(h.delta_std_dev() > 0.0);
    }
}
