use std::fmt::Debug;

use chrono::Duration;
use log::*;

use crate::{
    db_types::{CancelledBy, NewOrder, Order, OrderId, OrderStatusType, PaymentEvent, PaymentEventOutcome},
    events::{EventProducers, OrderAnnulledEvent, OrderConfirmedEvent, RefundSettledEvent},
    pricing::PricingPolicy,
    traits::{LifecycleDatabase, OrderFlowError, RefundOutcome},
};

/// `OrderFlowApi` is the primary entry point for driving an order through its lifecycle: creation, payment
/// events, fulfillment steps, cancellation and refunds.
///
/// It validates what can be validated without touching storage, delegates the atomic state changes to the
/// backend, and fires lifecycle event hooks after the database has committed.
pub struct OrderFlowApi<B> {
    db: B,
    producers: EventProducers,
}

impl<B> Debug for OrderFlowApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderFlowApi")
    }
}

impl<B> OrderFlowApi<B> {
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self { db, producers }
    }
}

impl<B> OrderFlowApi<B>
where B: LifecycleDatabase
{
    /// Submit a new order.
    ///
    /// Validation failures (missing delivery fields, non-positive quantities) are rejected here, before any side
    /// effect. The backend then snapshots prices, reserves stock for every line and persists the order in a
    /// single atomic operation. Cash orders come back already `confirmed` and trigger the order-confirmed hook
    /// immediately; prepaid orders wait for their payment event.
    pub async fn process_new_order(
        &self,
        order: NewOrder,
        policy: &PricingPolicy,
    ) -> Result<Order, OrderFlowError> {
        if let Some(field) = order.delivery.first_missing_field() {
            return Err(OrderFlowError::MissingDeliveryField(field));
        }
        let order = self.db.create_order(order, policy).await?;
        debug!(
            "🍽️📦️ Order {} created for user {} with status '{}'. Total: {}",
            order.order_number, order.user_id, order.status, order.pricing.total
        );
        if order.status == OrderStatusType::Confirmed {
            self.call_order_confirmed_hook(&order).await;
        }
        Ok(order)
    }

    /// Apply an authenticated payment event to an order. Signature verification is the caller's job; by the time
    /// an event reaches this method it is trusted.
    ///
    /// Duplicate events (same event id, or a re-capture of the same payment id) are no-ops that return the
    /// current state. An event that confirms the order fires the order-confirmed hook.
    pub async fn apply_payment_event(
        &self,
        order_id: &OrderId,
        event: PaymentEvent,
    ) -> Result<PaymentEventOutcome, OrderFlowError> {
        let event_id = event.event_id.clone();
        let outcome = self.db.apply_payment_event(order_id, event).await?;
        if outcome.duplicate {
            debug!("🍽️💳️ Payment event [{event_id}] for order {order_id} was a replay. No changes made.");
        } else {
            debug!(
                "🍽️💳️ Payment event [{event_id}] applied to order {order_id}. Payment is now '{}'",
                outcome.order.payment.payment_status
            );
        }
        if outcome.newly_confirmed {
            self.call_order_confirmed_hook(&outcome.order).await;
        }
        Ok(outcome)
    }

    /// Advance an order one step along the fulfillment chain:
    ///
    /// | From \ To        | confirmed | preparing | ready | out_for_delivery | delivered |
    /// |------------------|-----------|-----------|-------|------------------|-----------|
    /// | pending          | Ok        | Err       | Err   | Err              | Err       |
    /// | confirmed        | Err       | Ok        | Err   | Err              | Err       |
    /// | preparing        | Err       | Err       | Ok    | Err              | Err       |
    /// | ready            | Err       | Err       | Err   | Ok               | Err       |
    /// | out_for_delivery | Err       | Err       | Err   | Err              | Ok        |
    ///
    /// Everything else, including any move out of `delivered` or `cancelled`, fails with `InvalidTransition`
    /// (terminal states report `AlreadyTerminal`). Cancellation is not a status update; use
    /// [`Self::cancel_order`].
    ///
    /// Entering a state stamps its timestamp (preparing start, out-for-delivery start, actual delivery time).
    pub async fn update_status(
        &self,
        order_id: &OrderId,
        new_status: OrderStatusType,
        notes: Option<String>,
    ) -> Result<Order, OrderFlowError> {
        let order = self.db.update_order_status(order_id, new_status, notes).await?;
        info!("🍽️🚚️ Order {} moved to '{}'", order.order_number, order.status);
        Ok(order)
    }

    /// Cancel a non-terminal order.
    ///
    /// The cancellation itself is atomic. The stock reserved at creation is released afterwards as a
    /// compensating action, and if the payment had already completed a refund for the full order total is
    /// queued (not processed synchronously). Fires the order-annulled hook.
    pub async fn cancel_order(
        &self,
        order_id: &OrderId,
        reason: &str,
        cancelled_by: CancelledBy,
    ) -> Result<Order, OrderFlowError> {
        let order = self.db.cancel_order(order_id, reason, cancelled_by).await?;
        info!("🍽️❌️ Order {} cancelled by {cancelled_by}. Reason: {reason}", order.order_number);
        self.call_order_annulled_hook(&order).await;
        Ok(order)
    }

    /// Settle a queued refund with the gateway's verdict. Fires the refund-settled hook.
    pub async fn settle_refund(
        &self,
        order_id: &OrderId,
        outcome: RefundOutcome,
        reason: Option<String>,
    ) -> Result<Order, OrderFlowError> {
        let order = self.db.settle_refund(order_id, outcome, reason).await?;
        info!(
            "🍽️💰️ Refund of {} for order {} settled as '{}'",
            order.refund.refund_amount, order.order_number, order.refund.refund_status
        );
        self.call_refund_settled_hook(&order).await;
        Ok(order)
    }

    /// Cancel every order that has sat unpaid for longer than `unpaid_limit`, releasing its stock. Meant to be
    /// called from a periodic sweep, not from request handlers. Fires the order-annulled hook for each order.
    pub async fn expire_stale_orders(&self, unpaid_limit: Duration) -> Result<Vec<Order>, OrderFlowError> {
        let expired = self.db.expire_stale_orders(unpaid_limit).await?;
        if !expired.is_empty() {
            info!("🍽️⏲️ {} stale unpaid orders were cancelled by the sweep", expired.len());
        }
        for order in &expired {
            self.call_order_annulled_hook(order).await;
        }
        Ok(expired)
    }

    async fn call_order_confirmed_hook(&self, order: &Order) {
        for emitter in &self.producers.order_confirmed_producer {
            trace!("🍽️📦️ Notifying order-confirmed subscribers about {}", order.order_number);
            emitter.publish_event(OrderConfirmedEvent::new(order.clone())).await;
        }
    }

    async fn call_order_annulled_hook(&self, order: &Order) {
        for emitter in &self.producers.order_annulled_producer {
            trace!("🍽️❌️ Notifying order-annulled subscribers about {}", order.order_number);
            emitter.publish_event(OrderAnnulledEvent::new(order.clone())).await;
        }
    }

    async fn call_refund_settled_hook(&self, order: &Order) {
        for emitter in &self.producers.refund_settled_producer {
            trace!("🍽️💰️ Notifying refund-settled subscribers about {}", order.order_number);
            emitter.publish_event(RefundSettledEvent::new(order.clone())).await;
        }
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    pub fn db_mut(&mut self) -> &mut B {
        &mut self.db
    }
}
