//! Replenishment decision unit (pure).
//!
//! Given current stock and a demand forecast, decides whether and how much to
//! reorder using a reorder-point trigger and Economic Order Quantity sizing,
//! with an emergency path that bypasses batching optimization. Deterministic
//! decision logic only: no IO, no retries.

pub mod policy;
pub mod stock;

pub use policy::{
    ReorderDecision, ReplenishmentPolicy, TriggerReason, Urgency, clamp_to_quote, decide,
    decide_emergency, eoq, reorder_point,
};
pub use stock::{InventorySnapshot, Product};
