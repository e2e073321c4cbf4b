//! Demand forecasting unit (pure).
//!
//! This crate turns a historical demand series into a per-period demand
//! estimate with a confidence band. It is a **pure decision function**: no IO,
//! no retries, no clocks beyond the timestamps callers pass in. The bounded
//! call to the market-insight service lives in the orchestrator; this crate
//! only knows how to fold an already-obtained [`MarketSignal`] into a
//! statistical forecast via [`enrich`].

pub mod history;
pub mod model;

pub use history::DemandHistory;
pub use model::{
    ConfidenceBand, DataQuality, DemandForecast, ForecastConfig, ForecastSource, MarketSignal,
    enrich, forecast,
};
