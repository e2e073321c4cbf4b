//! Supervisor tunables.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use restock_forecast::ForecastConfig;
use restock_negotiation::NegotiationConfig;
use restock_performance::TrackerConfig;
use restock_replenish::ReplenishmentPolicy;

use crate::retry::RetryPolicy;

/// Everything the supervisor needs to drive runs.
///
/// The per-unit configs ride along so one value wires the whole pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Concurrent runs in a scheduled batch.
    pub worker_pool_size: usize,
    /// Timeout for a single collaborator call within a stage.
    pub stage_timeout: Duration,
    /// Budget for the optional market-insight call; on expiry the run
    /// degrades to the plain statistical forecast.
    pub market_timeout: Duration,
    /// Window within which supplier quotes are collected. Non-responders
    /// are excluded when it closes, not retried.
    pub quote_window: Duration,
    /// Pause between response polls inside the collection window.
    pub poll_interval: Duration,
    /// Days of demand forecast per run.
    pub forecast_horizon_days: u32,
    pub retry: RetryPolicy,
    pub forecast: ForecastConfig,
    pub replenishment: ReplenishmentPolicy,
    pub negotiation: NegotiationConfig,
    pub tracker: TrackerConfig,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            worker_pool_size: 4,
            stage_timeout: Duration::from_secs(10),
            market_timeout: Duration::from_secs(5),
            quote_window: Duration::from_secs(30),
            poll_interval: Duration::from_millis(100),
            forecast_horizon_days: 30,
            retry: RetryPolicy::default(),
            forecast: ForecastConfig::default(),
            replenishment: ReplenishmentPolicy::default(),
            negotiation: NegotiationConfig::default(),
            tracker: TrackerConfig::default(),
        }
    }
}

impl OrchestratorConfig {
    pub fn with_worker_pool_size(mut self, size: usize) -> Self {
        self.worker_pool_size = size.max(1);
        self
    }

    pub fn with_stage_timeout(mut self, timeout: Duration) -> Self {
        self.stage_timeout = timeout;
        self
    }

    pub fn with_market_timeout(mut self, timeout: Duration) -> Self {
        self.market_timeout = timeout;
        self
    }

    pub fn with_quote_window(mut self, window: Duration) -> Self {
        self.quote_window = window;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_size_is_never_zero() {
        let config = OrchestratorConfig::default().with_worker_pool_size(0);
        assert_eq!(config.worker_pool_size, 1);
    }
}
