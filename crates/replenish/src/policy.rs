//! Reorder-point and EOQ decision logic.

use serde::{Deserialize, Serialize};

use restock_core::{DomainError, DomainResult, ProductId};
use restock_forecast::DemandForecast;

use crate::stock::{InventorySnapshot, Product};

/// What caused a reorder decision to be evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerReason {
    /// Periodic reorder check found the position above the reorder point.
    ScheduledCheck,
    /// Position dropped to or below the reorder point.
    ThresholdBreach,
    /// Out-of-band emergency reorder request or imminent stockout.
    Emergency,
}

/// How urgently the order must be handled downstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    Normal,
    Emergency,
}

/// Outcome of the replenishment unit.
///
/// A zero quantity is a valid terminal outcome (no order needed) and is
/// distinct from a failure; failures surface as `DomainError`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReorderDecision {
    pub product_id: ProductId,
    pub reason: TriggerReason,
    pub quantity: u32,
    pub urgency: Urgency,
}

impl ReorderDecision {
    /// Whether the decision calls for an order at all.
    pub fn needs_order(&self) -> bool {
        self.quantity > 0
    }
}

/// Cost model for order sizing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplenishmentPolicy {
    /// Fixed cost of placing one order.
    pub ordering_cost: f64,
    /// Annual holding cost as a fraction of unit cost.
    pub holding_cost_rate: f64,
}

impl Default for ReplenishmentPolicy {
    fn default() -> Self {
        Self {
            ordering_cost: 50.0,
            holding_cost_rate: 0.2,
        }
    }
}

/// Inventory level at which a new order must be triggered.
///
/// `average_daily_demand * lead_time_days + safety_stock`; monotone
/// non-decreasing in both lead time and safety stock.
pub fn reorder_point(average_daily_demand: f64, lead_time_days: u32, safety_stock: u32) -> f64 {
    average_daily_demand.max(0.0) * lead_time_days as f64 + safety_stock as f64
}

/// Economic Order Quantity: order size minimizing combined ordering and
/// holding cost. Always at least 1.
pub fn eoq(annual_demand: f64, ordering_cost: f64, holding_cost_per_unit: f64) -> f64 {
    if annual_demand <= 0.0 || ordering_cost <= 0.0 || holding_cost_per_unit <= 0.0 {
        return 1.0;
    }
    (2.0 * annual_demand * ordering_cost / holding_cost_per_unit)
        .sqrt()
        .max(1.0)
}

/// Decide whether and how much to reorder for one product.
///
/// Trigger rule: reorder when `on_hand + on_order <= reorder_point`. The
/// emergency path fires when the product is already out of stock or the
/// position cannot cover forecast demand over the lead time; it sizes the
/// order to close the lead-time gap plus one safety-stock buffer, bypassing
/// EOQ batching.
pub fn decide(
    product: &Product,
    snapshot: &InventorySnapshot,
    forecast: &DemandForecast,
    policy: &ReplenishmentPolicy,
) -> DomainResult<ReorderDecision> {
    ensure_same_product(product, snapshot, forecast)?;

    let position = snapshot.position();
    let lead_time_demand = forecast.demand_over(product.lead_time_days);

    if snapshot.on_hand <= 0 || (position as f64) < lead_time_demand {
        return Ok(emergency_decision(product, snapshot, lead_time_demand));
    }

    let rp = reorder_point(
        forecast.average_daily_demand(),
        product.lead_time_days,
        product.safety_stock,
    );

    if (position as f64) > rp {
        // Healthy position; nothing to do.
        return Ok(ReorderDecision {
            product_id: product.id,
            reason: TriggerReason::ScheduledCheck,
            quantity: 0,
            urgency: Urgency::Normal,
        });
    }

    let holding_cost_per_unit = product.unit_cost * policy.holding_cost_rate;
    let quantity = eoq(forecast.annual_demand(), policy.ordering_cost, holding_cost_per_unit)
        .ceil() as u32;

    Ok(ReorderDecision {
        product_id: product.id,
        reason: TriggerReason::ThresholdBreach,
        quantity: quantity.max(1),
        urgency: Urgency::Normal,
    })
}

/// Build an emergency decision with an explicit quantity override.
///
/// Used by the emergency trigger surface; a zero override falls back to the
/// gap-covering emergency sizing.
pub fn decide_emergency(
    product: &Product,
    snapshot: &InventorySnapshot,
    forecast: &DemandForecast,
    quantity_override: Option<u32>,
) -> DomainResult<ReorderDecision> {
    ensure_same_product(product, snapshot, forecast)?;

    let decision = match quantity_override {
        Some(q) if q > 0 => ReorderDecision {
            product_id: product.id,
            reason: TriggerReason::Emergency,
            quantity: q,
            urgency: Urgency::Emergency,
        },
        _ => emergency_decision(product, snapshot, forecast.demand_over(product.lead_time_days)),
    };
    Ok(decision)
}

/// Re-clamp an existing decision once a quote's minimum order quantity is
/// known. A second micro-decision, not a restart of forecasting.
pub fn clamp_to_quote(decision: ReorderDecision, minimum_order_quantity: u32) -> ReorderDecision {
    if !decision.needs_order() {
        return decision;
    }
    ReorderDecision {
        quantity: decision.quantity.max(minimum_order_quantity),
        ..decision
    }
}

fn emergency_decision(
    product: &Product,
    snapshot: &InventorySnapshot,
    lead_time_demand: f64,
) -> ReorderDecision {
    let gap = (lead_time_demand - snapshot.position() as f64).max(0.0).ceil() as u32;
    ReorderDecision {
        product_id: product.id,
        reason: TriggerReason::Emergency,
        // Cover the lead-time gap plus one safety-stock buffer.
        quantity: (gap + product.safety_stock).max(1),
        urgency: Urgency::Emergency,
    }
}

fn ensure_same_product(
    product: &Product,
    snapshot: &InventorySnapshot,
    forecast: &DemandForecast,
) -> DomainResult<()> {
    if snapshot.product_id != product.id {
        return Err(DomainError::invariant("snapshot belongs to a different product"));
    }
    if forecast.product_id != product.id {
        return Err(DomainError::invariant("forecast belongs to a different product"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use restock_forecast::{DemandHistory, ForecastConfig, forecast as run_forecast};

    fn test_product(id: ProductId) -> Product {
        Product {
            id,
            name: "canned beans".to_string(),
            unit_cost: 2.5,
            safety_stock: 6,
            lead_time_days: 7,
            active: true,
        }
    }

    fn snapshot(id: ProductId, on_hand: i64, on_order: i64) -> InventorySnapshot {
        InventorySnapshot {
            product_id: id,
            on_hand,
            on_order,
            taken_at: Utc::now(),
        }
    }

    fn flat_forecast(id: ProductId, daily: f64) -> DemandForecast {
        let history = DemandHistory::new(id, vec![daily; 28]);
        run_forecast(id, 30, &history, &ForecastConfig::default()).unwrap()
    }

    #[test]
    fn healthy_position_yields_zero_quantity_decision() {
        let id = ProductId::new();
        let product = test_product(id);
        // Reorder point is 2*7 + 6 = 20; position 40 is comfortably above.
        let decision = decide(
            &product,
            &snapshot(id, 40, 0),
            &flat_forecast(id, 2.0),
            &ReplenishmentPolicy::default(),
        )
        .unwrap();

        assert!(!decision.needs_order());
        assert_eq!(decision.reason, TriggerReason::ScheduledCheck);
        assert_eq!(decision.urgency, Urgency::Normal);
    }

    #[test]
    fn low_position_triggers_reorder() {
        let id = ProductId::new();
        let product = test_product(id);
        // Reorder point 20 against a position of 5.
        let decision = decide(
            &product,
            &snapshot(id, 5, 0),
            &flat_forecast(id, 2.0),
            &ReplenishmentPolicy::default(),
        )
        .unwrap();

        assert!(decision.quantity > 0);
    }

    #[test]
    fn position_between_lead_time_demand_and_reorder_point_is_normal() {
        let id = ProductId::new();
        let product = test_product(id);
        // Lead-time demand is 14; position 16 covers it but sits below the
        // reorder point of 20, so this is a normal threshold breach.
        let decision = decide(
            &product,
            &snapshot(id, 16, 0),
            &flat_forecast(id, 2.0),
            &ReplenishmentPolicy::default(),
        )
        .unwrap();

        assert_eq!(decision.reason, TriggerReason::ThresholdBreach);
        assert_eq!(decision.urgency, Urgency::Normal);
        assert!(decision.quantity >= 1);
    }

    #[test]
    fn stockout_or_imminent_stockout_is_emergency() {
        let id = ProductId::new();
        let product = test_product(id);
        let forecast = flat_forecast(id, 2.0);

        let out = decide(
            &product,
            &snapshot(id, 0, 0),
            &forecast,
            &ReplenishmentPolicy::default(),
        )
        .unwrap();
        assert_eq!(out.urgency, Urgency::Emergency);

        // Position 5 cannot cover 14 units of lead-time demand.
        let imminent = decide(
            &product,
            &snapshot(id, 5, 0),
            &forecast,
            &ReplenishmentPolicy::default(),
        )
        .unwrap();
        assert_eq!(imminent.urgency, Urgency::Emergency);
        // Gap of 9 plus safety stock of 6.
        assert_eq!(imminent.quantity, 15);
    }

    #[test]
    fn emergency_override_uses_requested_quantity() {
        let id = ProductId::new();
        let product = test_product(id);
        let decision = decide_emergency(
            &product,
            &snapshot(id, 3, 0),
            &flat_forecast(id, 2.0),
            Some(120),
        )
        .unwrap();

        assert_eq!(decision.quantity, 120);
        assert_eq!(decision.urgency, Urgency::Emergency);
        assert_eq!(decision.reason, TriggerReason::Emergency);
    }

    #[test]
    fn clamp_raises_quantity_to_supplier_minimum() {
        let id = ProductId::new();
        let decision = ReorderDecision {
            product_id: id,
            reason: TriggerReason::ThresholdBreach,
            quantity: 40,
            urgency: Urgency::Normal,
        };
        assert_eq!(clamp_to_quote(decision, 100).quantity, 100);
        assert_eq!(clamp_to_quote(decision, 25).quantity, 40);
    }

    #[test]
    fn clamp_leaves_zero_quantity_decisions_alone() {
        let id = ProductId::new();
        let decision = ReorderDecision {
            product_id: id,
            reason: TriggerReason::ScheduledCheck,
            quantity: 0,
            urgency: Urgency::Normal,
        };
        assert_eq!(clamp_to_quote(decision, 100).quantity, 0);
    }

    #[test]
    fn mismatched_snapshot_is_an_invariant_violation() {
        let id = ProductId::new();
        let product = test_product(id);
        let err = decide(
            &product,
            &snapshot(ProductId::new(), 10, 0),
            &flat_forecast(id, 2.0),
            &ReplenishmentPolicy::default(),
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig { cases: 128, ..ProptestConfig::default() })]

            #[test]
            fn reorder_point_monotone_in_lead_time_and_safety_stock(
                demand in 0.0_f64..50.0,
                lead in 0_u32..60,
                extra_lead in 0_u32..30,
                safety in 0_u32..200,
                extra_safety in 0_u32..100,
            ) {
                let base = reorder_point(demand, lead, safety);
                prop_assert!(reorder_point(demand, lead + extra_lead, safety) >= base);
                prop_assert!(reorder_point(demand, lead, safety + extra_safety) >= base);
            }

            #[test]
            fn eoq_is_at_least_one(
                annual in -10.0_f64..10_000.0,
                ordering in -5.0_f64..500.0,
                holding in -1.0_f64..50.0,
            ) {
                prop_assert!(eoq(annual, ordering, holding) >= 1.0);
            }

            #[test]
            fn clamped_quantity_meets_minimum(qty in 1_u32..1_000, moq in 0_u32..1_000) {
                let decision = ReorderDecision {
                    product_id: ProductId::new(),
                    reason: TriggerReason::ThresholdBreach,
                    quantity: qty,
                    urgency: Urgency::Normal,
                };
                let clamped = clamp_to_quote(decision, moq);
                prop_assert!(clamped.quantity >= moq);
                prop_assert!(clamped.quantity >= qty);
            }
        }
    }
}
