//! The supervisor: drives runs through forecast, decide, negotiate, place.
//!
//! All concurrency, timeout, retry, and preemption policy lives here. The
//! decision units are called as plain functions; every external touchpoint
//! goes through the collaborator traits, bounded by the configured timeouts.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::Utc;
use thiserror::Error;
use tokio::sync::{Mutex, Notify, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use restock_core::{OrderId, ProductId, RunId};
use restock_forecast as forecast;
use restock_negotiation::{
    NegotiationOutcome, Quote, RankedQuote, apply_counter_response, counter_offer, rank_quotes,
    select,
};
use restock_performance::{DeliveryOutcome, ScorecardBook, SupplierScorecard};
use restock_replenish::{Urgency, clamp_to_quote, decide, decide_emergency};

use crate::collaborators::{
    CollaboratorError, CollaboratorResult, Collaborators, PurchaseOrder, RfqRequest,
};
use crate::config::OrchestratorConfig;
use crate::retry::RetryPolicy;
use crate::run::{RunReport, Stage, StageOutcome, TriggerKind, WorkflowRun};

/// Why a trigger was refused before a run started.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrchestratorError {
    /// At most one active run per product; the caller may retry after the
    /// active run reaches a terminal state.
    #[error("run {active_run_id} is already active for product {product_id}")]
    RunAlreadyActive {
        product_id: ProductId,
        active_run_id: RunId,
    },
    #[error("worker pool is closed")]
    WorkerPoolClosed,
    /// The task driving a batch run crashed before producing a report.
    #[error("run task panicked: {0}")]
    RunPanicked(String),
}

pub type RunResult = Result<RunReport, OrchestratorError>;

/// One entry in the active-run registry.
struct ActiveRun {
    run_id: RunId,
    urgency: Urgency,
    cancelled: Arc<AtomicBool>,
    done: Arc<Notify>,
}

/// Cancellation handle held by the task driving a run.
struct RunSlot {
    cancelled: Arc<AtomicBool>,
}

impl RunSlot {
    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Orchestrates replenishment runs over the collaborator ports.
///
/// Cheap to clone; clones share the active-run registry, the scorecard book,
/// and the worker pool.
#[derive(Clone)]
pub struct Supervisor {
    deps: Arc<Collaborators>,
    config: Arc<OrchestratorConfig>,
    book: Arc<ScorecardBook>,
    active: Arc<Mutex<HashMap<ProductId, ActiveRun>>>,
    pool: Arc<Semaphore>,
}

impl Supervisor {
    pub fn new(deps: Collaborators, config: OrchestratorConfig) -> Self {
        let book = Arc::new(ScorecardBook::new(config.tracker.clone()));
        let pool = Arc::new(Semaphore::new(config.worker_pool_size));
        Self {
            deps: Arc::new(deps),
            config: Arc::new(config),
            book,
            active: Arc::new(Mutex::new(HashMap::new())),
            pool,
        }
    }

    /// Shared supplier scorecards, fed by [`Supervisor::record_delivery`].
    pub fn scorecards(&self) -> &ScorecardBook {
        &self.book
    }

    /// Run the pipeline for each product, bounded by the worker pool.
    ///
    /// Results come back in input order. A refused trigger (duplicate run)
    /// surfaces as an error for that product; the rest of the batch is
    /// unaffected.
    pub async fn run_scheduled_batch(&self, product_ids: &[ProductId]) -> Vec<RunResult> {
        let mut handles = Vec::with_capacity(product_ids.len());
        for product_id in product_ids.iter().copied() {
            let supervisor = self.clone();
            handles.push(tokio::spawn(async move {
                match supervisor.pool.clone().acquire_owned().await {
                    Ok(_permit) => {
                        supervisor
                            .run_one(product_id, TriggerKind::Scheduled, None)
                            .await
                    }
                    Err(_) => Err(OrchestratorError::WorkerPoolClosed),
                }
            }));
        }

        let mut results = Vec::with_capacity(handles.len());
        for handle in handles {
            results.push(match handle.await {
                Ok(result) => result,
                Err(e) => {
                    error!(error = %e, "batch run task crashed");
                    Err(OrchestratorError::RunPanicked(e.to_string()))
                }
            });
        }
        results
    }

    /// Out-of-band emergency trigger.
    ///
    /// Bypasses the worker pool, cancels an in-flight normal run for the same
    /// product, and sizes the order from `quantity_override` when given.
    pub async fn run_emergency(
        &self,
        product_id: ProductId,
        quantity_override: Option<u32>,
    ) -> RunResult {
        self.run_one(product_id, TriggerKind::Emergency, quantity_override)
            .await
    }

    /// Fold a delivery outcome into the supplier's scorecard.
    ///
    /// Asynchronous with respect to the pipeline: callers invoke this from
    /// delivery events whenever they arrive.
    pub fn record_delivery(&self, outcome: &DeliveryOutcome) -> SupplierScorecard {
        let card = self.book.record_outcome(outcome);
        info!(
            supplier = %outcome.supplier_id,
            product = %outcome.product_id,
            composite = card.composite,
            "supplier scorecard updated"
        );
        card
    }

    async fn run_one(
        &self,
        product_id: ProductId,
        trigger: TriggerKind,
        quantity_override: Option<u32>,
    ) -> RunResult {
        let run = WorkflowRun::new(product_id, trigger);
        let urgency = match trigger {
            TriggerKind::Scheduled => Urgency::Normal,
            TriggerKind::Emergency => Urgency::Emergency,
        };
        let slot = self.register(product_id, run.run_id, urgency).await?;
        info!(run_id = %run.run_id, product = %product_id, ?trigger, "replenishment run started");

        let report = self.execute(run, &slot, quantity_override).await;
        self.release(product_id).await;
        info!(
            run_id = %report.run_id,
            product = %product_id,
            outcome = ?report.outcome,
            "replenishment run finished"
        );
        Ok(report)
    }

    /// Claim the product's run slot.
    ///
    /// An emergency trigger finding a normal run cancels it and waits for it
    /// to reach a terminal state before claiming the slot. Everything else
    /// finding an active run is refused.
    async fn register(
        &self,
        product_id: ProductId,
        run_id: RunId,
        urgency: Urgency,
    ) -> Result<RunSlot, OrchestratorError> {
        loop {
            let preempted_done = {
                let mut active = self.active.lock().await;
                match active.get(&product_id) {
                    None => {
                        let cancelled = Arc::new(AtomicBool::new(false));
                        active.insert(
                            product_id,
                            ActiveRun {
                                run_id,
                                urgency,
                                cancelled: cancelled.clone(),
                                done: Arc::new(Notify::new()),
                            },
                        );
                        return Ok(RunSlot { cancelled });
                    }
                    Some(existing) => {
                        let may_preempt = urgency == Urgency::Emergency
                            && existing.urgency == Urgency::Normal
                            && !existing.cancelled.swap(true, Ordering::SeqCst);
                        if !may_preempt {
                            return Err(OrchestratorError::RunAlreadyActive {
                                product_id,
                                active_run_id: existing.run_id,
                            });
                        }
                        warn!(
                            run_id = %run_id,
                            preempted_run = %existing.run_id,
                            product = %product_id,
                            "emergency trigger preempting normal run"
                        );
                        existing.done.clone()
                    }
                }
            };
            // notify_one stores a permit, so a release between the lock drop
            // and this await is not lost. The swap above guarantees a single
            // waiter per preempted run.
            preempted_done.notified().await;
        }
    }

    async fn release(&self, product_id: ProductId) {
        let removed = self.active.lock().await.remove(&product_id);
        if let Some(run) = removed {
            run.done.notify_one();
        }
    }

    async fn execute(
        &self,
        mut run: WorkflowRun,
        slot: &RunSlot,
        quantity_override: Option<u32>,
    ) -> RunReport {
        let product_id = run.product_id;
        let cfg = &self.config;
        let deps = &self.deps;

        // Forecast stage. The market-insight call is strictly bounded; on
        // timeout or failure the run continues on the statistical forecast.
        let product = match retried(&cfg.retry, cfg.stage_timeout, || {
            deps.inventory.get_product(product_id)
        })
        .await
        {
            Ok(product) => product,
            Err(e) => return run.fail(Stage::Forecast, e.to_string()),
        };
        if !product.active {
            debug!(product = %product_id, "product inactive, nothing to do");
            run.record(Stage::Forecast, StageOutcome::Empty);
            return run.no_action();
        }

        let history = match retried(&cfg.retry, cfg.stage_timeout, || {
            deps.history.demand_history(product_id)
        })
        .await
        {
            Ok(history) => history,
            Err(e) => return run.fail(Stage::Forecast, e.to_string()),
        };

        let base = match forecast::forecast(
            product_id,
            cfg.forecast_horizon_days,
            &history,
            &cfg.forecast,
        ) {
            Ok(forecast) => forecast,
            Err(e) => return run.fail(Stage::Forecast, e.to_string()),
        };

        let demand = match tokio::time::timeout(
            cfg.market_timeout,
            deps.market.market_signal(product_id),
        )
        .await
        {
            Ok(Ok(signal)) => {
                debug!(product = %product_id, multiplier = signal.demand_multiplier, "market signal applied");
                run.record(Stage::Forecast, StageOutcome::Success);
                forecast::enrich(base, &signal)
            }
            Ok(Err(e)) => {
                warn!(product = %product_id, error = %e, "market insight unavailable");
                run.record(
                    Stage::Forecast,
                    StageOutcome::Degraded {
                        reason: format!("market insight unavailable: {e}"),
                    },
                );
                base
            }
            Err(_) => {
                warn!(product = %product_id, "market insight timed out");
                run.record(
                    Stage::Forecast,
                    StageOutcome::Degraded {
                        reason: "market insight timed out".into(),
                    },
                );
                base
            }
        };

        if slot.is_cancelled() {
            return preempted(run, Stage::Decide);
        }

        // Decide stage.
        let snapshot = match retried(&cfg.retry, cfg.stage_timeout, || {
            deps.inventory.get_snapshot(product_id)
        })
        .await
        {
            Ok(snapshot) => snapshot,
            Err(e) => return run.fail(Stage::Decide, e.to_string()),
        };

        let decision = match run.trigger {
            TriggerKind::Scheduled => decide(&product, &snapshot, &demand, &cfg.replenishment),
            TriggerKind::Emergency => {
                decide_emergency(&product, &snapshot, &demand, quantity_override)
            }
        };
        let decision = match decision {
            Ok(decision) => decision,
            Err(e) => return run.fail(Stage::Decide, e.to_string()),
        };

        if !decision.needs_order() {
            debug!(product = %product_id, "stock position healthy, no reorder");
            run.record(Stage::Decide, StageOutcome::Empty);
            return run.no_action();
        }
        info!(
            product = %product_id,
            quantity = decision.quantity,
            reason = ?decision.reason,
            urgency = ?decision.urgency,
            "reorder decided"
        );
        run.record(Stage::Decide, StageOutcome::Success);

        if slot.is_cancelled() {
            return preempted(run, Stage::Negotiate);
        }

        // Negotiate stage: solicit every eligible supplier concurrently,
        // collect whatever arrives inside the window, rank, one counter round.
        let suppliers = match retried(&cfg.retry, cfg.stage_timeout, || {
            deps.directory.eligible_suppliers(product_id)
        })
        .await
        {
            Ok(suppliers) => suppliers,
            Err(e) => return run.fail(Stage::Negotiate, e.to_string()),
        };
        if suppliers.is_empty() {
            warn!(product = %product_id, "no eligible suppliers");
            run.record(Stage::Negotiate, StageOutcome::Empty);
            return run.no_action();
        }

        let standings = self.book.standings_for(product_id, &suppliers);
        let request = RfqRequest {
            run_id: run.run_id,
            product_id,
            quantity: decision.quantity,
            urgency: decision.urgency,
        };

        let mut sends = JoinSet::new();
        for supplier_id in suppliers {
            let transport = deps.transport.clone();
            let timeout = cfg.stage_timeout;
            sends.spawn(async move {
                let ack =
                    tokio::time::timeout(timeout, transport.send_rfq(supplier_id, request)).await;
                (supplier_id, ack)
            });
        }

        let mut solicited = 0usize;
        while let Some(joined) = sends.join_next().await {
            match joined {
                Ok((supplier_id, Ok(Ok(())))) => {
                    debug!(supplier = %supplier_id, "rfq delivery acknowledged");
                    solicited += 1;
                }
                Ok((supplier_id, Ok(Err(e)))) => {
                    warn!(supplier = %supplier_id, error = %e, "rfq delivery failed");
                }
                Ok((supplier_id, Err(_))) => {
                    warn!(supplier = %supplier_id, "rfq delivery timed out");
                }
                Err(e) => {
                    warn!(error = %e, "rfq task aborted");
                }
            }
        }

        // Collection window: poll for responses until every acknowledged
        // supplier has quoted or the window closes. A failed poll keeps the
        // last successful read.
        let mut quotes: Vec<Quote> = Vec::new();
        if solicited > 0 {
            let deadline = tokio::time::Instant::now() + cfg.quote_window;
            loop {
                match deps.transport.poll_responses(run.run_id).await {
                    Ok(received) => quotes = received,
                    Err(e) => warn!(error = %e, "quote poll failed"),
                }
                let now = tokio::time::Instant::now();
                if quotes.len() >= solicited || now >= deadline {
                    break;
                }
                tokio::time::sleep_until(deadline.min(now + cfg.poll_interval)).await;
            }
        }
        debug!(product = %product_id, collected = quotes.len(), solicited, "collection window closed");

        // One counter round against the ranking winner, then the final
        // selection over the (possibly improved) quote set.
        let ranked = match rank_quotes(
            &decision,
            &quotes,
            &standings,
            &cfg.negotiation.weights,
            Utc::now(),
        ) {
            Ok(ranked) => ranked,
            Err(e) => return run.fail(Stage::Negotiate, e.to_string()),
        };
        if let Some(best) = ranked.into_iter().next() {
            let supplier_id = best.quote.supplier_id;
            let improved = self.counter_rounds(best).await;
            if let Some(quote) = quotes.iter_mut().find(|q| q.supplier_id == supplier_id) {
                *quote = improved;
            }
        }

        let outcome = match select(&decision, &quotes, &standings, &cfg.negotiation, Utc::now()) {
            Ok(outcome) => outcome,
            Err(e) => return run.fail(Stage::Negotiate, e.to_string()),
        };
        let final_quote = match outcome {
            NegotiationOutcome::Selected { final_quote, .. } => final_quote,
            NegotiationOutcome::NoViableSupplier => {
                info!(product = %product_id, "no viable supplier this round");
                run.note_error("no usable quotes collected");
                run.record(Stage::Negotiate, StageOutcome::Empty);
                return run.no_action();
            }
        };
        info!(
            product = %product_id,
            supplier = %final_quote.supplier_id,
            price = final_quote.unit_price,
            "supplier selected"
        );
        run.record(Stage::Negotiate, StageOutcome::Success);

        if slot.is_cancelled() {
            return preempted(run, Stage::Place);
        }

        // Place stage. The commit is attempted once: retrying a possibly
        // half-applied order risks double-ordering, and a rejection is final.
        let decision = clamp_to_quote(decision, final_quote.minimum_order_quantity);
        let order = PurchaseOrder {
            id: OrderId::new(),
            run_id: run.run_id,
            product_id,
            supplier_id: final_quote.supplier_id,
            quantity: decision.quantity,
            unit_price: final_quote.unit_price,
            expected_lead_time_days: final_quote.lead_time_days,
            placed_at: Utc::now(),
        };
        match tokio::time::timeout(cfg.stage_timeout, deps.inventory.apply_order(&order)).await {
            Ok(Ok(())) => {
                info!(
                    order_id = %order.id,
                    supplier = %order.supplier_id,
                    quantity = order.quantity,
                    "order placed"
                );
                run.record(Stage::Place, StageOutcome::Success);
                run.placed(order.supplier_id, order.quantity)
            }
            Ok(Err(e)) => {
                error!(order_id = %order.id, error = %e, "order commit refused");
                run.fail(Stage::Place, e.to_string())
            }
            Err(_) => run.fail(Stage::Place, "order commit timed out"),
        }
    }

    /// Bounded counter-offer rounds against the winning quote.
    async fn counter_rounds(&self, best: RankedQuote) -> Quote {
        let cfg = &self.config;
        let mut current = best;
        for round in 0..cfg.negotiation.max_counter_rounds {
            let Some(offer) = counter_offer(&current, &cfg.negotiation) else {
                break;
            };
            if offer.target_unit_price >= current.quote.unit_price {
                break;
            }
            let reply = tokio::time::timeout(
                cfg.quote_window,
                self.deps.transport.send_counter_offer(offer),
            )
            .await;
            match reply {
                Ok(Ok(Some(price))) if price < current.quote.unit_price => {
                    debug!(
                        supplier = %current.quote.supplier_id,
                        round,
                        price,
                        "counter-offer accepted"
                    );
                    current.quote = apply_counter_response(current.quote.clone(), price);
                }
                Ok(Ok(_)) => break,
                Ok(Err(e)) => {
                    warn!(supplier = %current.quote.supplier_id, error = %e, "counter-offer failed");
                    break;
                }
                Err(_) => {
                    warn!(supplier = %current.quote.supplier_id, "counter-offer timed out");
                    break;
                }
            }
        }
        current.quote
    }
}

fn preempted(run: WorkflowRun, next_stage: Stage) -> RunReport {
    warn!(run_id = %run.run_id, product = %run.product_id, "run preempted by emergency trigger");
    run.fail(next_stage, "preempted by emergency trigger")
}

/// Run a collaborator call under the stage timeout, retrying transient
/// failures per the policy.
async fn retried<T, Fut, F>(
    policy: &RetryPolicy,
    timeout: Duration,
    mut op: F,
) -> CollaboratorResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = CollaboratorResult<T>>,
{
    let mut failed = 0u32;
    loop {
        let err = match tokio::time::timeout(timeout, op()).await {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(e)) => e,
            Err(_) => CollaboratorError::transient("collaborator call timed out"),
        };
        failed += 1;
        if !err.is_transient() || !policy.should_retry(failed) {
            return Err(err);
        }
        let delay = policy.delay_for_attempt(failed);
        warn!(attempt = failed, ?delay, error = %err, "transient collaborator failure, retrying");
        tokio::time::sleep(delay).await;
    }
}
