//! Supplier delivery-performance tracking.
//!
//! Maintains a rolling scorecard per (supplier, product) from delivery
//! outcomes: exponentially-weighted on-time rate, defect rate, and price
//! trend, collapsed into a composite score with the same weighting scheme
//! negotiation uses for ranking. Only the rolling aggregates are retained;
//! raw outcome history is never stored.

pub mod book;
pub mod scorecard;

pub use book::ScorecardBook;
pub use scorecard::{DeliveryOutcome, SupplierScorecard, TrackerConfig};
