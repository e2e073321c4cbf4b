//! Forecast computation and the forecast value type.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use restock_core::{DomainError, DomainResult, ProductId};

use crate::history::DemandHistory;

/// Where a forecast's numbers came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForecastSource {
    /// Statistical estimate only (market-insight unavailable or not requested).
    Statistical,
    /// Statistical estimate adjusted by an external market signal.
    MarketAdjusted,
}

/// How much history backed the estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataQuality {
    /// At least two full seasonal cycles of history.
    Good,
    /// Short or empty history; estimate is extrapolation-heavy.
    Limited,
}

/// Per-period confidence band around the point estimates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceBand {
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
}

impl ConfidenceBand {
    /// Band width at a period index.
    pub fn width(&self, idx: usize) -> f64 {
        self.upper[idx] - self.lower[idx]
    }
}

/// Demand estimate for one product over a horizon.
///
/// Created once per workflow run and discarded at run end; the core never
/// persists forecasts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DemandForecast {
    pub product_id: ProductId,
    pub horizon_days: u32,
    /// One non-negative point estimate per period.
    pub estimates: Vec<f64>,
    pub band: ConfidenceBand,
    pub source: ForecastSource,
    pub quality: DataQuality,
    pub generated_at: DateTime<Utc>,
}

impl DemandForecast {
    /// Mean estimated demand per period.
    pub fn average_daily_demand(&self) -> f64 {
        if self.estimates.is_empty() {
            return 0.0;
        }
        self.estimates.iter().sum::<f64>() / self.estimates.len() as f64
    }

    /// Total estimated demand over the first `days` periods.
    ///
    /// Extends with the final period's estimate if `days` exceeds the horizon.
    pub fn demand_over(&self, days: u32) -> f64 {
        if self.estimates.is_empty() {
            return 0.0;
        }
        let days = days as usize;
        let covered: f64 = self.estimates.iter().take(days).sum();
        if days <= self.estimates.len() {
            covered
        } else {
            let last = *self.estimates.last().unwrap_or(&0.0);
            covered + last * (days - self.estimates.len()) as f64
        }
    }

    /// Estimated demand over a full year, annualized from the horizon.
    pub fn annual_demand(&self) -> f64 {
        self.average_daily_demand() * 365.0
    }
}

/// External market signal folded into a statistical forecast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketSignal {
    /// Multiplier applied to point estimates (1.0 = no adjustment).
    pub demand_multiplier: f64,
    /// Free-text rationale from the insight service.
    pub narrative: String,
    pub generated_at: DateTime<Utc>,
}

/// Tunables for the statistical forecaster.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastConfig {
    /// Periods per seasonal cycle (weekly pattern over daily periods).
    pub seasonal_cycle: usize,
    /// Assumed per-period demand when no history exists at all.
    pub default_period_demand: f64,
    /// Fractional band growth per period out (monotone uncertainty growth).
    pub band_growth_per_period: f64,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            seasonal_cycle: 7,
            default_period_demand: 5.0,
            band_growth_per_period: 0.05,
        }
    }
}

/// Compute a statistical demand forecast for a product.
///
/// - With at least one full seasonal cycle of history: seasonal-index
///   decomposition plus linear trend extrapolation.
/// - With less history: trend-only extrapolation from recent-vs-older means.
/// - With no history: flat default-demand profile, flagged [`DataQuality::Limited`].
///
/// Point estimates are clamped non-negative and the band width never shrinks
/// with the horizon index.
pub fn forecast(
    product_id: ProductId,
    horizon_days: u32,
    history: &DemandHistory,
    config: &ForecastConfig,
) -> DomainResult<DemandForecast> {
    if horizon_days == 0 {
        return Err(DomainError::validation("forecast horizon must be at least 1 day"));
    }
    if config.seasonal_cycle == 0 {
        return Err(DomainError::validation("seasonal cycle must be at least 1 period"));
    }

    let horizon = horizon_days as usize;

    let (estimates, quality) = if history.is_empty() {
        (vec![config.default_period_demand; horizon], DataQuality::Limited)
    } else if history.covers_cycle(config.seasonal_cycle) {
        let quality = if history.len() >= 2 * config.seasonal_cycle {
            DataQuality::Good
        } else {
            DataQuality::Limited
        };
        (seasonal_estimates(history, horizon, config.seasonal_cycle), quality)
    } else {
        (trend_estimates(history, horizon), DataQuality::Limited)
    };

    let band = build_band(&estimates, history, config.band_growth_per_period);

    Ok(DemandForecast {
        product_id,
        horizon_days,
        estimates,
        band,
        source: ForecastSource::Statistical,
        quality,
        generated_at: Utc::now(),
    })
}

/// Fold a market signal into a statistical forecast.
///
/// Scales point estimates by the (clamped) multiplier, flips the source flag,
/// and widens (never narrows) the confidence band. Degrading to the plain
/// statistical forecast when no signal arrived is the caller's concern.
pub fn enrich(base: DemandForecast, signal: &MarketSignal) -> DemandForecast {
    // Keep a wild multiplier from an external model inside sane bounds.
    let m = signal.demand_multiplier.clamp(0.25, 4.0);

    let old_widths: Vec<f64> = (0..base.estimates.len()).map(|i| base.band.width(i)).collect();

    let estimates: Vec<f64> = base.estimates.iter().map(|e| (e * m).max(0.0)).collect();
    let mut lower: Vec<f64> = base.band.lower.iter().map(|l| (l * m).max(0.0)).collect();
    let mut upper: Vec<f64> = base.band.upper.iter().map(|u| (u * m).max(0.0)).collect();

    for i in 0..estimates.len() {
        // The adjusted band must not be narrower than the statistical one.
        if upper[i] - lower[i] < old_widths[i] {
            upper[i] = lower[i] + old_widths[i];
        }
    }
    enforce_monotone_width(&mut lower, &mut upper);

    DemandForecast {
        estimates,
        band: ConfidenceBand { lower, upper },
        source: ForecastSource::MarketAdjusted,
        ..base
    }
}

fn seasonal_estimates(history: &DemandHistory, horizon: usize, cycle: usize) -> Vec<f64> {
    let periods = history.periods();
    let full_cycles = periods.len() / cycle;
    let used = &periods[periods.len() - full_cycles * cycle..];
    let overall_mean = used.iter().sum::<f64>() / used.len() as f64;

    // Additive seasonal offsets per position within the cycle.
    let mut offsets = vec![0.0; cycle];
    for (i, v) in used.iter().enumerate() {
        offsets[i % cycle] += v - overall_mean;
    }
    for o in offsets.iter_mut() {
        *o /= full_cycles as f64;
    }

    // Linear trend from first-cycle mean to last-cycle mean.
    let trend_per_period = if full_cycles >= 2 {
        let first: f64 = used[..cycle].iter().sum::<f64>() / cycle as f64;
        let last: f64 = used[used.len() - cycle..].iter().sum::<f64>() / cycle as f64;
        (last - first) / ((full_cycles - 1) * cycle) as f64
    } else {
        0.0
    };

    let n = periods.len();
    (0..horizon)
        .map(|i| {
            let pos = (n + i) % cycle;
            let level = overall_mean + trend_per_period * (i as f64 + (cycle as f64 / 2.0));
            (level + offsets[pos]).max(0.0)
        })
        .collect()
}

fn trend_estimates(history: &DemandHistory, horizon: usize) -> Vec<f64> {
    let periods = history.periods();
    let mean = history.mean();

    let trend = if periods.len() >= 4 {
        let half = periods.len() / 2;
        let older: f64 = periods[..half].iter().sum::<f64>() / half as f64;
        let recent: f64 =
            periods[half..].iter().sum::<f64>() / (periods.len() - half) as f64;
        (recent - older) / half as f64
    } else {
        0.0
    };

    (0..horizon).map(|i| (mean + trend * (i + 1) as f64).max(0.0)).collect()
}

fn build_band(estimates: &[f64], history: &DemandHistory, growth: f64) -> ConfidenceBand {
    let mean_estimate = if estimates.is_empty() {
        0.0
    } else {
        estimates.iter().sum::<f64>() / estimates.len() as f64
    };
    // Two delta std-devs, floored at a quarter of the mean level so flat
    // histories still carry real uncertainty.
    let base_width = (2.0 * history.delta_std_dev()).max(0.25 * mean_estimate);

    let mut lower = Vec::with_capacity(estimates.len());
    let mut upper = Vec::with_capacity(estimates.len());
    for (i, e) in estimates.iter().enumerate() {
        let width = base_width * (1.0 + growth * i as f64);
        lower.push((e - width / 2.0).max(0.0));
        upper.push(e + width / 2.0);
    }
    enforce_monotone_width(&mut lower, &mut upper);
    ConfidenceBand { lower, upper }
}

fn enforce_monotone_width(lower: &mut [f64], upper: &mut [f64]) {
    let mut prev = 0.0_f64;
    for i in 0..lower.len() {
        let width = upper[i] - lower[i];
        if width < prev {
            upper[i] = lower[i] + prev;
        } else {
            prev = width;
        }
    }
}
