use chrono::{DateTime, Utc};
use fh_common::Rupees;
use foodhub_order_engine::{
    db_types::{
        DeliveryDetails,
        Order,
        OrderId,
        OrderLine,
        OrderNumber,
        OrderStatusType,
        PaymentMethod,
        PaymentState,
        PaymentStatusType,
        RefundState,
    },
    traits::{OrderApiError, OrderManagement},
    OrderQueryFilter,
    OrderStatistics,
};
use mockall::mock;

mock! {
    pub OrderManager {}
    impl OrderManagement for OrderManager {
        async fn fetch_order_by_id(&self, id: &OrderId) -> Result<Option<Order>, OrderApiError>;
        async fn fetch_order_by_order_number(&self, number: &OrderNumber) -> Result<Option<Order>, OrderApiError>;
        async fn fetch_orders_for_user(&self, user_id: &str) -> Result<Vec<Order>, OrderApiError>;
        async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<Order>, OrderApiError>;
        async fn fetch_orders_by_payment_status(&self, status: PaymentStatusType) -> Result<Vec<Order>, OrderApiError>;
        async fn fetch_delayed_orders(&self, now: DateTime<Utc>) -> Result<Vec<Order>, OrderApiError>;
        async fn order_statistics(&self) -> Result<OrderStatistics, OrderApiError>;
    }
}

/// A fully-populated confirmed order for mock responses.
pub fn sample_order(id: i64) -> Order {
    let created_at = Utc::now();
    let mut payment = PaymentState::new(PaymentMethod::Upi);
    payment.payment_status = PaymentStatusType::Completed;
    payment.payment_id = Some("pay_test123".to_string());
    payment.upi_id = Some("alice@upi".to_string());
    Order {
        id: OrderId(id),
        order_number: OrderNumber(format!("ORD-1718019180123-4F7K2M9Q{id}")),
        user_id: "alice".to_string(),
        lines: vec![OrderLine::new("pizza-margherita", "Pizza Margherita", Rupees::from(299), 2)],
        delivery: DeliveryDetails {
            full_name: "Alice Kumar".to_string(),
            phone: "+91-9000000001".to_string(),
            street: "1 MG Road".to_string(),
            city: "Bengaluru".to_string(),
            state: "Karnataka".to_string(),
            zip_code: "560001".to_string(),
            country: "India".to_string(),
            delivery_instructions: None,
        },
        payment,
        refund: RefundState::default(),
        pricing: foodhub_order_engine::db_types::PriceBreakdown {
            subtotal: Rupees::from(598),
            delivery_fee: Rupees::from(99),
            tax: Rupees::from(30),
            discount: Rupees::from(0),
            total: Rupees::from(727),
        },
        status: OrderStatusType::Confirmed,
        is_urgent: false,
        notes: None,
        created_at,
        updated_at: created_at,
        estimated_delivery_at: Some(created_at + chrono::Duration::minutes(45)),
        actual_delivery_at: None,
        preparing_at: None,
        out_for_delivery_at: None,
        cancelled_at: None,
        cancellation_reason: None,
        cancelled_by: None,
    }
}
