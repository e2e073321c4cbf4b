//! Quote ranking, counter-offers, and winner selection.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use restock_core::{DomainError, DomainResult, SupplierId};
use restock_replenish::ReorderDecision;

use crate::quote::Quote;

/// Relative importance of price, supplier quality, and lead time.
///
/// The same scheme weights quote ranking here and the scorecard composite in
/// the performance tracker, so the two stay consistent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RankingWeights {
    pub price: f64,
    pub quality: f64,
    pub lead_time: f64,
}

impl Default for RankingWeights {
    fn default() -> Self {
        Self {
            price: 0.5,
            quality: 0.3,
            lead_time: 0.2,
        }
    }
}

impl RankingWeights {
    /// Build validated weights; they must be non-negative and sum to 1.
    pub fn new(price: f64, quality: f64, lead_time: f64) -> DomainResult<Self> {
        let weights = Self {
            price,
            quality,
            lead_time,
        };
        weights.validate()?;
        Ok(weights)
    }

    pub fn validate(&self) -> DomainResult<()> {
        if self.price < 0.0 || self.quality < 0.0 || self.lead_time < 0.0 {
            return Err(DomainError::validation("ranking weights must be non-negative"));
        }
        let sum = self.price + self.quality + self.lead_time;
        if (sum - 1.0).abs() > 1e-6 {
            return Err(DomainError::validation(format!(
                "ranking weights must sum to 1 (got {sum})"
            )));
        }
        Ok(())
    }

    /// Weighted blend of three [0,1] component scores.
    pub fn blend(&self, price_score: f64, quality_score: f64, lead_time_score: f64) -> f64 {
        self.price * price_score + self.quality * quality_score + self.lead_time * lead_time_score
    }
}

/// A supplier's standing as seen by negotiation: the scorecard composite plus
/// the historical on-time delivery count used for tie-breaking.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SupplierStanding {
    /// Composite score in [0,1].
    pub composite: f64,
    pub on_time_deliveries: u64,
}

impl Default for SupplierStanding {
    fn default() -> Self {
        // Unknown suppliers start at a neutral standing.
        Self {
            composite: 0.5,
            on_time_deliveries: 0,
        }
    }
}

/// Negotiation tunables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NegotiationConfig {
    pub weights: RankingWeights,
    /// Counter-offer rounds per supplier per run. Default 1 keeps the state
    /// machine finite; the original system's open-ended back-and-forth is out.
    pub max_counter_rounds: u32,
    /// Largest discount fraction a counter-offer will ask of a supplier with
    /// the worst possible standing.
    pub max_counter_discount: f64,
}

impl Default for NegotiationConfig {
    fn default() -> Self {
        Self {
            weights: RankingWeights::default(),
            max_counter_rounds: 1,
            max_counter_discount: 0.10,
        }
    }
}

/// A quote with its blended score and the standing that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedQuote {
    pub quote: Quote,
    pub score: f64,
    pub standing: SupplierStanding,
}

/// Terminal outcome of a negotiation round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum NegotiationOutcome {
    /// A winner was selected; the order should be placed with this quote.
    Selected {
        supplier_id: SupplierId,
        final_quote: Quote,
    },
    /// No usable quote arrived; a valid empty outcome, not a failure.
    NoViableSupplier,
}

/// A counter-offer for the top-ranked quote.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CounterOffer {
    pub supplier_id: SupplierId,
    pub target_unit_price: f64,
}

/// Score and order quotes for a reorder decision.
///
/// Quotes for other products or outside their validity window at `as_of` are
/// excluded before ranking, so a late quote can never win. Ordering: blended
/// score descending, then lower price, then more historical on-time
/// deliveries.
pub fn rank_quotes(
    decision: &ReorderDecision,
    quotes: &[Quote],
    standings: &HashMap<SupplierId, SupplierStanding>,
    weights: &RankingWeights,
    as_of: DateTime<Utc>,
) -> DomainResult<Vec<RankedQuote>> {
    weights.validate()?;

    let usable: Vec<&Quote> = quotes
        .iter()
        .filter(|q| q.product_id == decision.product_id && q.is_valid_at(as_of))
        .collect();
    if usable.is_empty() {
        return Ok(Vec::new());
    }

    // Normalize against the cheapest positive price so a zero-priced quote
    // (free sample, data glitch) scores 1.0 without flattening the rest.
    let min_positive_price = usable
        .iter()
        .map(|q| q.unit_price)
        .filter(|p| *p > 0.0)
        .fold(f64::INFINITY, f64::min);
    let min_lead = usable.iter().map(|q| q.lead_time_days).min().unwrap_or(0);

    let mut ranked: Vec<RankedQuote> = usable
        .into_iter()
        .map(|q| {
            let standing = standings.get(&q.supplier_id).copied().unwrap_or_default();
            let price_score = if q.unit_price > 0.0 && min_positive_price.is_finite() {
                min_positive_price / q.unit_price
            } else {
                1.0
            };
            let lead_score = if q.lead_time_days > 0 {
                (min_lead.max(1) as f64) / q.lead_time_days as f64
            } else {
                1.0
            };
            RankedQuote {
                score: weights.blend(price_score, standing.composite, lead_score),
                quote: q.clone(),
                standing,
            }
        })
        .collect();

    ranked.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| {
                a.quote
                    .unit_price
                    .partial_cmp(&b.quote.unit_price)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .then_with(|| b.standing.on_time_deliveries.cmp(&a.standing.on_time_deliveries))
    });
    Ok(ranked)
}

/// Derive the single counter-offer for a top-ranked quote.
///
/// The target is the scorecard-implied fair price: suppliers with a strong
/// standing are asked for a smaller concession than suppliers with a weak one.
pub fn counter_offer(
    ranked: &RankedQuote,
    config: &NegotiationConfig,
) -> Option<CounterOffer> {
    if config.max_counter_rounds == 0 {
        return None;
    }
    let discount =
        config.max_counter_discount * (1.0 - 0.5 * ranked.standing.composite.clamp(0.0, 1.0));
    Some(CounterOffer {
        supplier_id: ranked.quote.supplier_id,
        target_unit_price: ranked.quote.unit_price * (1.0 - discount),
    })
}

/// Fold a supplier's counter-response into its quote.
///
/// Suppliers only ever improve their own offer; a response above the original
/// price is ignored.
pub fn apply_counter_response(original: Quote, responded_unit_price: f64) -> Quote {
    if responded_unit_price > 0.0 && responded_unit_price < original.unit_price {
        Quote {
            unit_price: responded_unit_price,
            ..original
        }
    } else {
        original
    }
}

/// Select the winner from collected quotes.
///
/// Zero usable quotes yields [`NegotiationOutcome::NoViableSupplier`] rather
/// than silently picking nothing.
pub fn select(
    decision: &ReorderDecision,
    quotes: &[Quote],
    standings: &HashMap<SupplierId, SupplierStanding>,
    config: &NegotiationConfig,
    as_of: DateTime<Utc>,
) -> DomainResult<NegotiationOutcome> {
    let ranked = rank_quotes(decision, quotes, standings, &config.weights, as_of)?;
    Ok(match ranked.into_iter().next() {
        Some(best) => NegotiationOutcome::Selected {
            supplier_id: best.quote.supplier_id,
            final_quote: best.quote,
        },
        None => NegotiationOutcome::NoViableSupplier,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use restock_core::ProductId;
    use restock_replenish::{TriggerReason, Urgency};

    fn decision(product_id: ProductId) -> ReorderDecision {
        ReorderDecision {
            product_id,
            reason: TriggerReason::ThresholdBreach,
            quantity: 100,
            urgency: Urgency::Normal,
        }
    }

    fn quote(
        supplier_id: SupplierId,
        product_id: ProductId,
        unit_price: f64,
        lead_time_days: u32,
    ) -> Quote {
        Quote {
            supplier_id,
            product_id,
            unit_price,
            lead_time_days,
            minimum_order_quantity: 10,
            valid_until: Utc::now() + Duration::hours(24),
        }
    }

    fn standing(composite: f64, on_time: u64) -> SupplierStanding {
        SupplierStanding {
            composite,
            on_time_deliveries: on_time,
        }
    }

    #[test]
    fn weights_must_sum_to_one() {
        assert!(RankingWeights::new(0.5, 0.3, 0.2).is_ok());
        assert!(RankingWeights::new(0.5, 0.5, 0.5).is_err());
        assert!(RankingWeights::new(-0.2, 0.9, 0.3).is_err());
    }

    #[test]
    fn cheaper_quote_wins_when_standings_are_equal() {
        let product = ProductId::new();
        let (a, b) = (SupplierId::new(), SupplierId::new());
        let quotes = vec![quote(a, product, 4.0, 5), quote(b, product, 3.0, 5)];
        let standings = HashMap::from([(a, standing(0.7, 10)), (b, standing(0.7, 10))]);

        let outcome = select(
            &decision(product),
            &quotes,
            &standings,
            &NegotiationConfig::default(),
            Utc::now(),
        )
        .unwrap();
        match outcome {
            NegotiationOutcome::Selected { supplier_id, .. } => assert_eq!(supplier_id, b),
            other => panic!("expected selection, got {other:?}"),
        }
    }

    #[test]
    fn zero_priced_quote_does_not_flatten_price_scores() {
        let product = ProductId::new();
        let (free, cheap, dear) = (SupplierId::new(), SupplierId::new(), SupplierId::new());
        let quotes = vec![
            quote(free, product, 0.0, 5),
            quote(cheap, product, 4.0, 5),
            quote(dear, product, 6.0, 5),
        ];
        let standings = HashMap::from([
            (free, standing(0.7, 10)),
            (cheap, standing(0.7, 10)),
            (dear, standing(0.7, 10)),
        ]);

        let ranked = rank_quotes(
            &decision(product),
            &quotes,
            &standings,
            &RankingWeights::default(),
            Utc::now(),
        )
        .unwrap();
        // The free quote takes the top price score, and the paid quotes
        // still discriminate against the cheapest positive price.
        assert_eq!(ranked[0].quote.supplier_id, free);
        assert_eq!(ranked[1].quote.supplier_id, cheap);
        assert_eq!(ranked[2].quote.supplier_id, dear);
        assert!(ranked[1].score > ranked[2].score);
    }

    #[test]
    fn strong_scorecard_can_beat_a_slightly_cheaper_rival() {
        let product = ProductId::new();
        let (cheap, reliable) = (SupplierId::new(), SupplierId::new());
        let quotes = vec![
            quote(cheap, product, 3.80, 5),
            quote(reliable, product, 4.00, 5),
        ];
        let standings =
            HashMap::from([(cheap, standing(0.2, 1)), (reliable, standing(0.95, 40))]);

        let ranked = rank_quotes(
            &decision(product),
            &quotes,
            &standings,
            &RankingWeights::default(),
            Utc::now(),
        )
        .unwrap();
        assert_eq!(ranked[0].quote.supplier_id, reliable);
    }

    #[test]
    fn expired_quotes_are_never_ranked() {
        let product = ProductId::new();
        let (fresh, late) = (SupplierId::new(), SupplierId::new());
        let mut stale = quote(late, product, 1.0, 1);
        stale.valid_until = Utc::now() - Duration::hours(1);
        let quotes = vec![quote(fresh, product, 5.0, 9), stale];

        let ranked = rank_quotes(
            &decision(product),
            &quotes,
            &HashMap::new(),
            &RankingWeights::default(),
            Utc::now(),
        )
        .unwrap();
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].quote.supplier_id, fresh);
    }

    #[test]
    fn quotes_for_other_products_are_excluded() {
        let product = ProductId::new();
        let supplier = SupplierId::new();
        let quotes = vec![quote(supplier, ProductId::new(), 2.0, 3)];

        let outcome = select(
            &decision(product),
            &quotes,
            &HashMap::new(),
            &NegotiationConfig::default(),
            Utc::now(),
        )
        .unwrap();
        assert_eq!(outcome, NegotiationOutcome::NoViableSupplier);
    }

    #[test]
    fn no_quotes_yields_no_viable_supplier() {
        let product = ProductId::new();
        let outcome = select(
            &decision(product),
            &[],
            &HashMap::new(),
            &NegotiationConfig::default(),
            Utc::now(),
        )
        .unwrap();
        assert_eq!(outcome, NegotiationOutcome::NoViableSupplier);
    }

    #[test]
    fn equal_price_tie_breaks_on_on_time_history() {
        let product = ProductId::new();
        let (a, b) = (SupplierId::new(), SupplierId::new());
        let quotes = vec![quote(a, product, 4.0, 5), quote(b, product, 4.0, 5)];
        // Same composite and price; b has delivered on time more often.
        let standings = HashMap::from([(a, standing(0.6, 3)), (b, standing(0.6, 17))]);

        let ranked = rank_quotes(
            &decision(product),
            &quotes,
            &standings,
            &RankingWeights::default(),
            Utc::now(),
        )
        .unwrap();
        assert_eq!(ranked[0].quote.supplier_id, b);
    }

    #[test]
    fn counter_offer_asks_less_of_reliable_suppliers() {
        let product = ProductId::new();
        let supplier = SupplierId::new();
        let config = NegotiationConfig::default();
        let base = RankedQuote {
            quote: quote(supplier, product, 10.0, 5),
            score: 0.8,
            standing: standing(1.0, 50),
        };
        let weak = RankedQuote {
            standing: standing(0.0, 0),
            ..base.clone()
        };

        let strong_target = counter_offer(&base, &config).unwrap().target_unit_price;
        let weak_target = counter_offer(&weak, &config).unwrap().target_unit_price;
        assert!(strong_target > weak_target);
        // Worst standing is asked the full configured discount.
        assert!((weak_target - 9.0).abs() < 1e-9);
    }

    #[test]
    fn counter_round_can_be_disabled_by_config() {
        let product = ProductId::new();
        let ranked = RankedQuote {
            quote: quote(SupplierId::new(), product, 10.0, 5),
            score: 0.8,
            standing: SupplierStanding::default(),
        };
        let config = NegotiationConfig {
            max_counter_rounds: 0,
            ..NegotiationConfig::default()
        };
        assert!(counter_offer(&ranked, &config).is_none());
    }

    #[test]
    fn counter_response_only_ever_improves_the_quote() {
        let q = quote(SupplierId::new(), ProductId::new(), 10.0, 5);
        assert_eq!(apply_counter_response(q.clone(), 9.5).unit_price, 9.5);
        assert_eq!(apply_counter_response(q.clone(), 11.0).unit_price, 10.0);
        assert_eq!(apply_counter_response(q, -1.0).unit_price, 10.0);
    }
}
