use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::{
    db_types::{Order, OrderId, OrderNumber, PaymentStatusType},
    order_flow::{OrderQueryFilter, OrderStatistics},
};

/// The read side of an order backend: fetching, searching and summarising orders. None of these methods mutate
/// anything.
#[allow(async_fn_in_trait)]
pub trait OrderManagement {
    /// Fetch the order with the given internal id, including its lines.
    async fn fetch_order_by_id(&self, id: &OrderId) -> Result<Option<Order>, OrderApiError>;

    /// Fetch the order with the given human-readable order number, including its lines.
    async fn fetch_order_by_order_number(&self, number: &OrderNumber) -> Result<Option<Order>, OrderApiError>;

    /// All orders belonging to the given user, newest first.
    async fn fetch_orders_for_user(&self, user_id: &str) -> Result<Vec<Order>, OrderApiError>;

    /// Fetch orders matching the given filter, ordered by creation time ascending.
    async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<Order>, OrderApiError>;

    /// All orders whose payment sub-state matches `status`.
    async fn fetch_orders_by_payment_status(&self, status: PaymentStatusType) -> Result<Vec<Order>, OrderApiError>;

    /// Orders whose estimated delivery time has passed without reaching a terminal state.
    async fn fetch_delayed_orders(&self, now: DateTime<Utc>) -> Result<Vec<Order>, OrderApiError>;

    /// Aggregate counts and revenue across all orders.
    async fn order_statistics(&self) -> Result<OrderStatistics, OrderApiError>;
}

#[derive(Debug, Clone, Error)]
pub enum OrderApiError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("The requested order {0} does not exist")]
    OrderNotFound(OrderId),
}

impl From<sqlx::Error> for OrderApiError {
    fn from(e: sqlx::Error) -> Self {
        OrderApiError::DatabaseError(e.to_string())
    }
}
