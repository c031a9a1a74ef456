use serde::{Deserialize, Serialize};

use crate::db_types::{Order, OrderStatusType, RefundStatusType};

/// Fired when an order reaches `confirmed`, whether via a captured payment or because a cash order was accepted
/// straight away.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderConfirmedEvent {
    pub order: Order,
}

impl OrderConfirmedEvent {
    pub fn new(order: Order) -> Self {
        Self { order }
    }
}

/// Fired when an order is cancelled, whether by the user, the restaurant, or the stale-order sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderAnnulledEvent {
    pub order: Order,
    pub status: OrderStatusType,
}

impl OrderAnnulledEvent {
    pub fn new(order: Order) -> Self {
        let status = order.status;
        Self { order, status }
    }
}

/// Fired when a queued refund is settled, successfully or not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefundSettledEvent {
    pub order: Order,
    pub refund_status: RefundStatusType,
}

impl RefundSettledEvent {
    pub fn new(order: Order) -> Self {
        let refund_status = order.refund.refund_status;
        Self { order, refund_status }
    }
}
