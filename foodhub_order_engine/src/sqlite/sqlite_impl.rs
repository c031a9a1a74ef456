//! `SqliteDatabase` is a concrete implementation of a FoodHub order-engine backend.
//!
//! Unsurprisingly, it uses SQLite as the backend and implements all the traits defined in the [`crate::traits`]
//! module. Per-order serialization falls out of the transaction discipline: every read-modify-write on an order
//! happens inside a single transaction, so two concurrent operations on the same order cannot interleave.
use std::fmt::Debug;

use chrono::{DateTime, Duration, Utc};
use log::*;
use sqlx::SqlitePool;

use super::db::{db_url, foods, new_pool, orders, payment_events};
use crate::{
    db_types::{
        CancelledBy,
        FoodItem,
        NewOrder,
        Order,
        OrderId,
        OrderLine,
        OrderNumber,
        OrderStatusType,
        PaymentEvent,
        PaymentEventKind,
        PaymentEventOutcome,
        PaymentMethod,
        PaymentStatusType,
        RefundStatusType,
    },
    helpers::new_order_number,
    order_flow::{OrderQueryFilter, OrderStatistics},
    pricing::{PricingError, PricingPolicy},
    traits::{
        CatalogManagement,
        LifecycleDatabase,
        OrderApiError,
        OrderFlowError,
        OrderManagement,
        RefundOutcome,
    },
};

const ORDER_NUMBER_RETRIES: usize = 3;

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SqliteDatabase {
    /// Connect to the database given by the `FH_DATABASE_URL` environment variable.
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db_url();
        Self::new_with_url(&url, max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let pool = new_pool(url, max_connections).await?;
        Ok(Self { url: url.to_string(), pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Internal cancellation flow shared by [`LifecycleDatabase::cancel_order`] and the stale-order sweep.
    ///
    /// The cancellation itself commits first; only then is the reserved stock released, as a compensating
    /// action. A release that fails (e.g. the catalog item has been deleted) is logged and skipped, so a logged
    /// reconciliation discrepancy is the worst case, never an order stuck half-cancelled.
    /// When `only_if_pending` is set (the stale-order sweep), an order that has progressed past `pending` since
    /// the caller last looked is left alone rather than cancelled.
    async fn cancel_order_inner(
        &self,
        order_id: &OrderId,
        reason: &str,
        cancelled_by: CancelledBy,
        only_if_pending: bool,
    ) -> Result<Order, OrderFlowError> {
        let mut tx = self.pool.begin().await?;
        let order =
            orders::fetch_order_by_id(order_id, &mut tx).await?.ok_or(OrderFlowError::OrderNotFound(*order_id))?;
        if order.is_terminal() {
            return Err(OrderFlowError::AlreadyTerminal(order.status));
        }
        if only_if_pending && order.status != OrderStatusType::Pending {
            return Err(OrderFlowError::InvalidTransition { from: order.status, to: OrderStatusType::Cancelled });
        }
        let queue_refund = order.payment.payment_status == PaymentStatusType::Completed;
        let cancelled = orders::mark_cancelled(order_id, reason, cancelled_by, queue_refund, &mut tx).await?;
        tx.commit().await?;
        if queue_refund {
            debug!(
                "🗃️ Refund of {} queued for cancelled order {}",
                cancelled.refund.refund_amount, cancelled.order_number
            );
        }
        self.release_stock(&cancelled.order_number, &cancelled.lines).await;
        Ok(cancelled)
    }

    async fn release_stock(&self, order_number: &OrderNumber, lines: &[OrderLine]) {
        for line in lines {
            let mut conn = match self.pool.acquire().await {
                Ok(conn) => conn,
                Err(e) => {
                    error!(
                        "🗃️ Could not get a connection to release stock for order {order_number}: {e}. The \
                         remaining line reservations are now orphaned and need manual reconciliation."
                    );
                    return;
                },
            };
            if let Err(e) = foods::adjust_stock(&line.food_id, line.quantity, &mut conn).await {
                warn!(
                    "🗃️ Could not release {} units of {} for cancelled order {order_number}: {e}. Continuing; \
                     the discrepancy is logged for reconciliation.",
                    line.quantity, line.food_id
                );
            }
        }
    }
}

impl OrderManagement for SqliteDatabase {
    async fn fetch_order_by_id(&self, id: &OrderId) -> Result<Option<Order>, OrderApiError> {
        let mut conn = self.pool.acquire().await?;
        Ok(orders::fetch_order_by_id(id, &mut conn).await?)
    }

    async fn fetch_order_by_order_number(&self, number: &OrderNumber) -> Result<Option<Order>, OrderApiError> {
        let mut conn = self.pool.acquire().await?;
        Ok(orders::fetch_order_by_order_number(number, &mut conn).await?)
    }

    async fn fetch_orders_for_user(&self, user_id: &str) -> Result<Vec<Order>, OrderApiError> {
        let mut conn = self.pool.acquire().await?;
        Ok(orders::fetch_orders_for_user(user_id, &mut conn).await?)
    }

    async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<Order>, OrderApiError> {
        let mut conn = self.pool.acquire().await?;
        Ok(orders::search_orders(query, &mut conn).await?)
    }

    async fn fetch_orders_by_payment_status(
        &self,
        status: PaymentStatusType,
    ) -> Result<Vec<Order>, OrderApiError> {
        let mut conn = self.pool.acquire().await?;
        Ok(orders::fetch_orders_by_payment_status(status, &mut conn).await?)
    }

    async fn fetch_delayed_orders(&self, now: DateTime<Utc>) -> Result<Vec<Order>, OrderApiError> {
        let mut conn = self.pool.acquire().await?;
        Ok(orders::fetch_delayed_orders(now, &mut conn).await?)
    }

    async fn order_statistics(&self) -> Result<OrderStatistics, OrderApiError> {
        let mut conn = self.pool.acquire().await?;
        Ok(orders::order_statistics(&mut conn).await?)
    }
}

impl CatalogManagement for SqliteDatabase {
    async fn fetch_food(&self, food_id: &str) -> Result<Option<FoodItem>, OrderFlowError> {
        let mut conn = self.pool.acquire().await?;
        Ok(foods::fetch_food(food_id, &mut conn).await?)
    }

    async fn adjust_stock(&self, food_id: &str, delta: i64) -> Result<FoodItem, OrderFlowError> {
        let mut conn = self.pool.acquire().await?;
        foods::adjust_stock(food_id, delta, &mut conn).await
    }
}

impl LifecycleDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn create_order(&self, order: NewOrder, policy: &PricingPolicy) -> Result<Order, OrderFlowError> {
        if let Some(field) = order.delivery.first_missing_field() {
            return Err(OrderFlowError::MissingDeliveryField(field));
        }
        if order.lines.is_empty() {
            return Err(OrderFlowError::InvalidPricing(PricingError::EmptyOrder));
        }
        let mut tx = self.pool.begin().await?;
        // Snapshot names and prices from the catalog. Early returns roll the transaction back, so no partial
        // stock movement is ever observable.
        let mut lines = Vec::with_capacity(order.lines.len());
        for line in &order.lines {
            if line.quantity <= 0 {
                return Err(OrderFlowError::InvalidPricing(PricingError::InvalidQuantity {
                    food_id: line.food_id.clone(),
                    quantity: line.quantity,
                }));
            }
            let food = foods::fetch_food(&line.food_id, &mut tx)
                .await?
                .ok_or_else(|| OrderFlowError::FoodNotFound(line.food_id.clone()))?;
            if !food.is_available {
                return Err(OrderFlowError::FoodUnavailable(food.id));
            }
            if food.stock_quantity < line.quantity {
                return Err(OrderFlowError::InsufficientStock {
                    food_id: food.id,
                    requested: line.quantity,
                    available: food.stock_quantity,
                });
            }
            lines.push(OrderLine::new(food.id, food.name, food.price, line.quantity));
        }
        let pricing = policy.compute_breakdown(&lines)?;
        for line in &lines {
            foods::adjust_stock(&line.food_id, -line.quantity, &mut tx).await?;
        }
        // Cash orders skip the payment wait entirely; there is nothing to capture before the kitchen starts.
        let status = if order.payment_method == PaymentMethod::Cash {
            OrderStatusType::Confirmed
        } else {
            OrderStatusType::Pending
        };
        let mut attempts = 0;
        let persisted = loop {
            let number = new_order_number();
            match orders::insert_order(&order, &number, &lines, &pricing, status, &mut tx).await {
                Ok(order) => break order,
                Err(e) if orders::is_unique_violation(&e) && attempts < ORDER_NUMBER_RETRIES => {
                    warn!("🗃️ Order number collision on {number}. Regenerating.");
                    attempts += 1;
                },
                Err(e) => return Err(e.into()),
            }
        };
        tx.commit().await?;
        debug!("🗃️ Order {} saved with id {}", persisted.order_number, persisted.id);
        Ok(persisted)
    }

    async fn apply_payment_event(
        &self,
        order_id: &OrderId,
        event: PaymentEvent,
    ) -> Result<PaymentEventOutcome, OrderFlowError> {
        let mut tx = self.pool.begin().await?;
        let order =
            orders::fetch_order_by_id(order_id, &mut tx).await?.ok_or(OrderFlowError::OrderNotFound(*order_id))?;
        let claimed = payment_events::claim_event(&event, order.id, &mut tx).await?;
        if !claimed {
            debug!("🗃️ Payment event [{}] has already been processed. No changes made.", event.event_id);
            return Ok(PaymentEventOutcome { order, duplicate: true, newly_confirmed: false });
        }
        let was_pending = order.status == OrderStatusType::Pending;
        let outcome = match event.kind {
            PaymentEventKind::Captured { payment_id, transaction_id } => {
                if order.payment.payment_status == PaymentStatusType::Completed {
                    // A capture re-reporting the payment we already recorded is a friendly replay; a capture
                    // carrying a different payment id on a completed order is not.
                    if order.payment.payment_id.as_deref() == Some(payment_id.as_str()) {
                        PaymentEventOutcome { order, duplicate: true, newly_confirmed: false }
                    } else {
                        return Err(OrderFlowError::PaymentConflict(format!(
                            "order {} is already paid with payment id {:?}, but a capture arrived for {payment_id}",
                            order.order_number, order.payment.payment_id
                        )));
                    }
                } else if order.payment.payment_status == PaymentStatusType::Refunded {
                    return Err(OrderFlowError::PaymentConflict(format!(
                        "a capture for {payment_id} arrived on order {}, which has already been refunded",
                        order.order_number
                    )));
                } else if order.is_terminal() {
                    return Err(OrderFlowError::AlreadyTerminal(order.status));
                } else {
                    let updated = orders::mark_payment_completed(
                        order_id,
                        &payment_id,
                        transaction_id.as_deref(),
                        &mut tx,
                    )
                    .await?;
                    let newly_confirmed = was_pending && updated.status == OrderStatusType::Confirmed;
                    PaymentEventOutcome { order: updated, duplicate: false, newly_confirmed }
                }
            },
            PaymentEventKind::Failed { payment_id, reason } => {
                if order.payment.payment_status == PaymentStatusType::Completed {
                    // A failure arriving after a successful capture is stale gateway noise.
                    debug!(
                        "🗃️ Ignoring a late payment-failed event for already-paid order {}",
                        order.order_number
                    );
                    PaymentEventOutcome { order, duplicate: true, newly_confirmed: false }
                } else {
                    let updated = orders::mark_payment_failed(order_id, &mut tx).await?;
                    info!(
                        "🗃️ Payment attempt {payment_id:?} for order {} failed: {}. The customer may retry.",
                        updated.order_number,
                        reason.as_deref().unwrap_or("no reason given")
                    );
                    PaymentEventOutcome { order: updated, duplicate: false, newly_confirmed: false }
                }
            },
            PaymentEventKind::CashCollected => {
                if order.payment.method != PaymentMethod::Cash {
                    return Err(OrderFlowError::PaymentConflict(format!(
                        "cash-collected reported for order {}, which is a {} order",
                        order.order_number, order.payment.method
                    )));
                }
                if order.payment.payment_status == PaymentStatusType::Completed {
                    PaymentEventOutcome { order, duplicate: true, newly_confirmed: false }
                } else {
                    let updated =
                        orders::mark_payment_completed(order_id, &event.event_id, None, &mut tx).await?;
                    let newly_confirmed = was_pending && updated.status == OrderStatusType::Confirmed;
                    PaymentEventOutcome { order: updated, duplicate: false, newly_confirmed }
                }
            },
        };
        tx.commit().await?;
        Ok(outcome)
    }

    async fn update_order_status(
        &self,
        order_id: &OrderId,
        new_status: OrderStatusType,
        notes: Option<String>,
    ) -> Result<Order, OrderFlowError> {
        let mut tx = self.pool.begin().await?;
        let order =
            orders::fetch_order_by_id(order_id, &mut tx).await?.ok_or(OrderFlowError::OrderNotFound(*order_id))?;
        if order.is_terminal() {
            return Err(OrderFlowError::AlreadyTerminal(order.status));
        }
        if order.status.next() != Some(new_status) {
            return Err(OrderFlowError::InvalidTransition { from: order.status, to: new_status });
        }
        let updated = orders::update_status_with_stamp(order_id, new_status, notes, &mut tx).await?;
        tx.commit().await?;
        Ok(updated)
    }

    async fn cancel_order(
        &self,
        order_id: &OrderId,
        reason: &str,
        cancelled_by: CancelledBy,
    ) -> Result<Order, OrderFlowError> {
        self.cancel_order_inner(order_id, reason, cancelled_by, false).await
    }

    async fn settle_refund(
        &self,
        order_id: &OrderId,
        outcome: RefundOutcome,
        reason: Option<String>,
    ) -> Result<Order, OrderFlowError> {
        let mut tx = self.pool.begin().await?;
        let order =
            orders::fetch_order_by_id(order_id, &mut tx).await?.ok_or(OrderFlowError::OrderNotFound(*order_id))?;
        if order.refund.refund_status != RefundStatusType::Pending {
            return Err(OrderFlowError::InvalidRefundState(order.refund.refund_status));
        }
        let updated = orders::settle_refund_row(order_id, outcome, reason, &mut tx).await?;
        tx.commit().await?;
        Ok(updated)
    }

    async fn expire_stale_orders(&self, unpaid_limit: Duration) -> Result<Vec<Order>, OrderFlowError> {
        let stale = {
            let mut conn = self.pool.acquire().await?;
            orders::fetch_stale_pending_ids(unpaid_limit, &mut conn).await?
        };
        let mut expired = Vec::with_capacity(stale.len());
        for id in stale {
            match self.cancel_order_inner(&id, "Unpaid order expired", CancelledBy::System, true).await {
                Ok(order) => expired.push(order),
                // Someone paid for or cancelled the order between the sweep query and the cancellation.
                Err(OrderFlowError::AlreadyTerminal(_)) | Err(OrderFlowError::InvalidTransition { .. }) => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(expired)
    }

    async fn close(&mut self) -> Result<(), OrderFlowError> {
        self.pool.close().await;
        Ok(())
    }
}
