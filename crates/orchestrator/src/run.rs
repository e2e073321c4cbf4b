//! Workflow run state and the exit contract.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use restock_core::{ProductId, RunId, SupplierId};

/// What started a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
    /// Periodic scheduled check over the catalog.
    Scheduled,
    /// Out-of-band emergency trigger; preempts a normal run for the product.
    Emergency,
}

/// Pipeline stages in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Forecast,
    Decide,
    Negotiate,
    Place,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Forecast => "forecast",
            Stage::Decide => "decide",
            Stage::Negotiate => "negotiate",
            Stage::Place => "place",
        };
        f.write_str(name)
    }
}

/// Typed result of one stage.
///
/// Only the supervisor reacts to these; a degraded or empty outcome is a
/// normal path through the pipeline, not an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StageOutcome {
    Success,
    /// Produced a usable result on a fallback path.
    Degraded { reason: String },
    /// Nothing to do (no reorder needed, no viable supplier).
    Empty,
    Failed { error: String },
}

/// Terminal outcome of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    /// An order was negotiated and committed.
    Placed,
    /// The run completed with nothing to order.
    NoAction,
    Failed,
}

/// One stage's recorded outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageRecord {
    pub stage: Stage,
    pub outcome: StageOutcome,
}

/// What a finished run reports to its caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: RunId,
    pub product_id: ProductId,
    pub trigger: TriggerKind,
    pub outcome: RunOutcome,
    /// Stage at which the run failed, if it did.
    pub stage_failed: Option<Stage>,
    pub selected_supplier_id: Option<SupplierId>,
    pub quantity: Option<u32>,
    pub stages: Vec<StageRecord>,
    pub errors: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunReport {
    /// Outcome of the given stage, if it was reached.
    pub fn stage_outcome(&self, stage: Stage) -> Option<&StageOutcome> {
        self.stages
            .iter()
            .find(|r| r.stage == stage)
            .map(|r| &r.outcome)
    }
}

/// Mutable state of one in-flight run.
///
/// Owned exclusively by the supervisor task driving the run; nothing here is
/// shared or persisted.
#[derive(Debug)]
pub struct WorkflowRun {
    pub run_id: RunId,
    pub product_id: ProductId,
    pub trigger: TriggerKind,
    stages: Vec<StageRecord>,
    errors: Vec<String>,
    started_at: DateTime<Utc>,
}

impl WorkflowRun {
    pub fn new(product_id: ProductId, trigger: TriggerKind) -> Self {
        Self {
            run_id: RunId::new(),
            product_id,
            trigger,
            stages: Vec::new(),
            errors: Vec::new(),
            started_at: Utc::now(),
        }
    }

    pub fn record(&mut self, stage: Stage, outcome: StageOutcome) {
        if let StageOutcome::Failed { error } = &outcome {
            self.errors.push(format!("{stage}: {error}"));
        }
        self.stages.push(StageRecord { stage, outcome });
    }

    pub fn note_error(&mut self, error: impl Into<String>) {
        self.errors.push(error.into());
    }

    /// Close the run with a failure at the given stage.
    pub fn fail(mut self, stage: Stage, error: impl Into<String>) -> RunReport {
        let error = error.into();
        self.record(stage, StageOutcome::Failed { error });
        self.finish(RunOutcome::Failed, Some(stage), None, None)
    }

    pub fn no_action(self) -> RunReport {
        self.finish(RunOutcome::NoAction, None, None, None)
    }

    pub fn placed(self, supplier_id: SupplierId, quantity: u32) -> RunReport {
        self.finish(RunOutcome::Placed, None, Some(supplier_id), Some(quantity))
    }

    fn finish(
        self,
        outcome: RunOutcome,
        stage_failed: Option<Stage>,
        selected_supplier_id: Option<SupplierId>,
        quantity: Option<u32>,
    ) -> RunReport {
        RunReport {
            run_id: self.run_id,
            product_id: self.product_id,
            trigger: self.trigger,
            outcome,
            stage_failed,
            selected_supplier_id,
            quantity,
            stages: self.stages,
            errors: self.errors,
            started_at: self.started_at,
            finished_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failing_records_stage_and_error() {
        let run = WorkflowRun::new(ProductId::new(), TriggerKind::Scheduled);
        let report = run.fail(Stage::Negotiate, "transport down");

        assert_eq!(report.outcome, RunOutcome::Failed);
        assert_eq!(report.stage_failed, Some(Stage::Negotiate));
        assert_eq!(report.errors, vec!["negotiate: transport down".to_string()]);
        assert!(matches!(
            report.stage_outcome(Stage::Negotiate),
            Some(StageOutcome::Failed { .. })
        ));
    }

    #[test]
    fn placed_report_carries_supplier_and_quantity() {
        let mut run = WorkflowRun::new(ProductId::new(), TriggerKind::Emergency);
        run.record(Stage::Forecast, StageOutcome::Success);
        let supplier = SupplierId::new();
        let report = run.placed(supplier, 42);

        assert_eq!(report.outcome, RunOutcome::Placed);
        assert_eq!(report.selected_supplier_id, Some(supplier));
        assert_eq!(report.quantity, Some(42));
        assert_eq!(report.stage_failed, None);
    }
}
