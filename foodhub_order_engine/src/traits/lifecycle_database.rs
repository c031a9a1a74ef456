use chrono::Duration;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    db_types::{
        CancelledBy,
        NewOrder,
        Order,
        OrderId,
        OrderStatusType,
        PaymentEvent,
        PaymentEventOutcome,
        RefundStatusType,
    },
    pricing::{PricingError, PricingPolicy},
    traits::{CatalogManagement, OrderApiError, OrderManagement},
};

/// The caller's verdict on a queued refund, reported back from the payment gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefundOutcome {
    Processed,
    Failed,
}

/// The write side of an order backend: the composite operations that drive the order state machine.
///
/// Every method on this trait is atomic with respect to the order it touches. Implementations must serialize
/// concurrent operations on the same order (the SQLite backend wraps each read-modify-write in a single
/// transaction), and `create_order` must reserve stock for all lines or none.
#[allow(async_fn_in_trait)]
pub trait LifecycleDatabase: Clone + OrderManagement + CatalogManagement {
    /// The URL of the database.
    fn url(&self) -> &str;

    /// Create a new order, atomically:
    /// * looks up every line in the catalog and snapshots its name and price,
    /// * prices the order under `policy`,
    /// * decrements stock for every line (all-or-nothing),
    /// * generates a unique order number, retrying on the off-chance of a collision,
    /// * persists the order as `pending` (cash orders come out `confirmed`, since no prepayment happens).
    ///
    /// If any step fails the whole operation rolls back and no stock movement is observable.
    async fn create_order(&self, order: NewOrder, policy: &PricingPolicy) -> Result<Order, OrderFlowError>;

    /// Apply an authenticated payment event to an order.
    ///
    /// Replays are detected via the event id (recorded under a unique constraint) and return the current state
    /// with `duplicate` set, not an error. A capture on a pending order completes the payment and advances the
    /// order to `confirmed`; a capture that re-reports the same payment id on an already-completed order is a
    /// no-op; a failure marks the payment `failed` but leaves the order `pending` so the customer can retry.
    async fn apply_payment_event(
        &self,
        order_id: &OrderId,
        event: PaymentEvent,
    ) -> Result<PaymentEventOutcome, OrderFlowError>;

    /// Advance an order one step along the fulfillment chain, stamping the timestamp for the state being entered.
    /// Any skip, backward move, or move out of a terminal state fails with [`OrderFlowError::InvalidTransition`].
    async fn update_order_status(
        &self,
        order_id: &OrderId,
        new_status: OrderStatusType,
        notes: Option<String>,
    ) -> Result<Order, OrderFlowError>;

    /// Cancel a non-terminal order: records reason and actor, releases the stock reserved at creation, and, if
    /// the payment had completed, queues a refund for the full order total.
    ///
    /// Stock release is a compensating action performed after the cancellation has committed. A catalog item
    /// that has since vanished is logged and skipped, never a reason to fail the cancellation.
    async fn cancel_order(
        &self,
        order_id: &OrderId,
        reason: &str,
        cancelled_by: CancelledBy,
    ) -> Result<Order, OrderFlowError>;

    /// Settle a queued refund. `Processed` also marks the payment `refunded`; `Failed` leaves the payment as it
    /// was. Fails with [`OrderFlowError::InvalidRefundState`] unless the refund is currently `pending`.
    async fn settle_refund(
        &self,
        order_id: &OrderId,
        outcome: RefundOutcome,
        reason: Option<String>,
    ) -> Result<Order, OrderFlowError>;

    /// Cancel (as the system) all orders that have sat in `pending` without a completed payment for longer than
    /// `unpaid_limit`, releasing their stock. Returns the orders that were cancelled.
    async fn expire_stale_orders(&self, unpaid_limit: Duration) -> Result<Vec<Order>, OrderFlowError>;

    /// Closes the database connection.
    async fn close(&mut self) -> Result<(), OrderFlowError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Error)]
pub enum OrderFlowError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("{0}")]
    OrderApiError(#[from] OrderApiError),
    #[error("Food item {0} does not exist")]
    FoodNotFound(String),
    #[error("Food item {0} is not available for ordering")]
    FoodUnavailable(String),
    #[error("Insufficient stock for {food_id}: requested {requested}, available {available}")]
    InsufficientStock { food_id: String, requested: i64, available: i64 },
    #[error("The requested order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("Cannot transition an order from {from} to {to}")]
    InvalidTransition { from: OrderStatusType, to: OrderStatusType },
    #[error("The order is already in terminal state {0} and cannot be modified")]
    AlreadyTerminal(OrderStatusType),
    #[error("Cannot settle a refund in state {0}; only pending refunds can be settled")]
    InvalidRefundState(RefundStatusType),
    #[error("{0}")]
    InvalidPricing(#[from] PricingError),
    #[error("Required delivery field is missing: {0}")]
    MissingDeliveryField(&'static str),
    #[error("Conflicting payment information: {0}")]
    PaymentConflict(String),
}

impl From<sqlx::Error> for OrderFlowError {
    fn from(e: sqlx::Error) -> Self {
        OrderFlowError::DatabaseError(e.to_string())
    }
}
