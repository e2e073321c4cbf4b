//! External collaborator ports.
//!
//! Everything the pipeline touches outside its own process goes through one
//! of these traits: stock levels, demand history, supplier discovery, quote
//! transport, market insight. Production wiring binds them to real services;
//! tests bind in-memory fakes. The supervisor owns all timeout and retry
//! policy around these calls.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use restock_core::{OrderId, ProductId, RunId, SupplierId};
use restock_forecast::{DemandHistory, MarketSignal};
use restock_negotiation::{CounterOffer, Quote};
use restock_replenish::{InventorySnapshot, Product, Urgency};

/// Failure of a collaborator call.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CollaboratorError {
    /// Likely to succeed on retry (network blip, lock contention).
    #[error("transient failure: {0}")]
    Transient(String),
    /// The collaborator understood the request and refused it.
    #[error("rejected: {0}")]
    Rejected(String),
    #[error("not found: {0}")]
    NotFound(String),
}

impl CollaboratorError {
    pub fn transient(msg: impl Into<String>) -> Self {
        Self::Transient(msg.into())
    }

    pub fn rejected(msg: impl Into<String>) -> Self {
        Self::Rejected(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

pub type CollaboratorResult<T> = Result<T, CollaboratorError>;

/// A request for quotes sent to one supplier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RfqRequest {
    /// Correlation id suppliers quote against; responses are collected per
    /// run via [`SupplierTransport::poll_responses`].
    pub run_id: RunId,
    pub product_id: ProductId,
    pub quantity: u32,
    pub urgency: Urgency,
}

/// The order handed to the inventory store at the end of a successful run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseOrder {
    pub id: OrderId,
    pub run_id: RunId,
    pub product_id: ProductId,
    pub supplier_id: SupplierId,
    pub quantity: u32,
    pub unit_price: f64,
    pub expected_lead_time_days: u32,
    pub placed_at: DateTime<Utc>,
}

/// Product catalog and stock levels, plus order commitment.
#[async_trait]
pub trait InventoryStore: Send + Sync {
    async fn get_product(&self, product_id: ProductId) -> CollaboratorResult<Product>;

    async fn get_snapshot(&self, product_id: ProductId) -> CollaboratorResult<InventorySnapshot>;

    /// Commit a placed order against the stock position.
    ///
    /// A [`CollaboratorError::Rejected`] here is fatal for the run; the
    /// supervisor never re-selects a supplier after a rejected commit.
    async fn apply_order(&self, order: &PurchaseOrder) -> CollaboratorResult<()>;
}

/// Historical demand series per product.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn demand_history(&self, product_id: ProductId) -> CollaboratorResult<DemandHistory>;
}

/// Which suppliers may be solicited for a product.
#[async_trait]
pub trait SupplierDirectory: Send + Sync {
    async fn eligible_suppliers(&self, product_id: ProductId)
    -> CollaboratorResult<Vec<SupplierId>>;
}

/// Quote solicitation channel.
///
/// Solicitation is two-phase: `send_rfq` dispatches the request to one
/// supplier and `Ok(())` is a delivery acknowledgement only. Responses
/// arrive asynchronously and are read back with `poll_responses`, which the
/// supervisor calls repeatedly within the collection window. A supplier
/// that acks but never quotes has declined, which is not an error.
#[async_trait]
pub trait SupplierTransport: Send + Sync {
    async fn send_rfq(
        &self,
        supplier_id: SupplierId,
        request: RfqRequest,
    ) -> CollaboratorResult<()>;

    /// All quotes received so far for the given solicitation. Cumulative
    /// across calls; the supervisor keeps the last successful read.
    async fn poll_responses(&self, correlation_id: RunId) -> CollaboratorResult<Vec<Quote>>;

    /// Returns the supplier's revised unit price, if it concedes anything.
    async fn send_counter_offer(&self, offer: CounterOffer) -> CollaboratorResult<Option<f64>>;
}

/// The full set of ports the supervisor is wired with.
#[derive(Clone)]
pub struct Collaborators {
    pub inventory: Arc<dyn InventoryStore>,
    pub history: Arc<dyn HistoryStore>,
    pub directory: Arc<dyn SupplierDirectory>,
    pub transport: Arc<dyn SupplierTransport>,
    pub market: Arc<dyn MarketInsight>,
}

/// External market-condition signal for forecast enrichment.
///
/// Strictly optional: the supervisor bounds this call with its own timeout
/// and degrades to the plain statistical forecast on any failure.
#[async_trait]
pub trait MarketInsight: Send + Sync {
    async fn market_signal(&self, product_id: ProductId) -> CollaboratorResult<MarketSignal>;
}
