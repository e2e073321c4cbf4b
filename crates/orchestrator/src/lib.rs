//! Replenishment run orchestration.
//!
//! Drives the pipeline per product: forecast demand, decide whether and how
//! much to reorder, negotiate with suppliers, place the order. Owns every
//! impure concern the decision units refuse to carry: collaborator IO,
//! timeouts, retries with backoff, the bounded worker pool, idempotency per
//! product, and emergency preemption.

pub mod collaborators;
pub mod config;
pub mod retry;
pub mod run;
pub mod supervisor;

pub use collaborators::{
    CollaboratorError, CollaboratorResult, Collaborators, HistoryStore, InventoryStore,
    MarketInsight, PurchaseOrder, RfqRequest, SupplierDirectory, SupplierTransport,
};
pub use config::OrchestratorConfig;
pub use retry::{BackoffStrategy, RetryPolicy};
pub use run::{RunOutcome, RunReport, Stage, StageOutcome, StageRecord, TriggerKind, WorkflowRun};
pub use supervisor::{OrchestratorError, RunResult, Supervisor};
