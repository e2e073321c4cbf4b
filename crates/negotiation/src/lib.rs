//! Supplier negotiation unit (pure ranking and selection).
//!
//! Scores collected quotes as a weighted blend of price, supplier scorecard
//! standing, and lead time, issues at most one counter-offer per supplier per
//! run, and selects a winner. Solicitation, the collection window, and
//! counter-offer transport are the orchestrator's concern; this crate only
//! decides over quotes it is handed.

pub mod quote;
pub mod ranking;

pub use quote::Quote;
pub use ranking::{
    CounterOffer, NegotiationConfig, NegotiationOutcome, RankedQuote, RankingWeights,
    SupplierStanding, apply_counter_response, counter_offer, rank_quotes, select,
};
