//! Small pure helpers used across the engine.

use chrono::{DateTime, Utc};
use rand::Rng;

use crate::db_types::{Order, OrderNumber, OrderStatusType};

const ORDER_NUMBER_SUFFIX_LEN: usize = 9;
const BASE36: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Generate a new human-readable order number of the form `ORD-<millis>-<random suffix>`.
///
/// The millisecond timestamp makes numbers roughly sortable by creation time; the 9-character base-36 suffix makes
/// collisions within the same millisecond vanishingly unlikely. Callers still retry on a uniqueness violation
/// rather than trusting the odds.
pub fn new_order_number() -> OrderNumber {
    let millis = Utc::now().timestamp_millis();
    let mut rng = rand::thread_rng();
    let suffix: String =
        (0..ORDER_NUMBER_SUFFIX_LEN).map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char).collect();
    OrderNumber(format!("ORD-{millis}-{suffix}"))
}

/// A display-only projection of where an order is in its journey, for contexts that want a coarse time-based view
/// ("your food should be there by now") rather than the authoritative status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayStatus {
    /// The order is waiting for payment and the kitchen has not started.
    AwaitingPayment,
    /// The order was cancelled.
    Cancelled,
    /// The order has been delivered.
    Delivered,
    /// The kitchen should still be working on the order.
    InProgress,
    /// The estimated delivery time has passed but the order is not delivered yet.
    RunningLate,
}

/// Derive a coarse display status by comparing the current time to the estimated delivery time.
///
/// This is a presentation-layer projection only. [`Order::status`] is the single authoritative state;
/// pending-payment and cancelled orders are special-cased here so that the time comparison can never contradict
/// them, and the result must never be written back.
pub fn derived_display_status(order: &Order, now: DateTime<Utc>) -> DisplayStatus {
    match order.status {
        OrderStatusType::Pending => DisplayStatus::AwaitingPayment,
        OrderStatusType::Cancelled => DisplayStatus::Cancelled,
        OrderStatusType::Delivered => DisplayStatus::Delivered,
        _ if order.is_delayed(now) => DisplayStatus::RunningLate,
        _ => DisplayStatus::InProgress,
    }
}

#[cfg(test)]
mod test {
    use chrono::Duration;

    use super::*;

    #[test]
    fn order_number_format() {
        let n = new_order_number();
        let parts = n.0.split('-').collect::<Vec<&str>>();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "ORD");
        assert!(parts[1].parse::<i64>().is_ok());
        assert_eq!(parts[2].len(), 9);
        assert!(parts[2].chars().all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()));
    }

    #[test]
    fn order_numbers_are_unique() {
        let a = new_order_number();
        let b = new_order_number();
        assert_ne!(a.0, b.0);
    }

    fn dummy_order(status: OrderStatusType) -> Order {
        use fh_common::Rupees;

        use crate::db_types::*;
        let now = Utc::now();
        Order {
            id: OrderId(1),
            order_number: new_order_number(),
            user_id: "user-1".into(),
            lines: vec![OrderLine::new("dal-makhani", "Dal Makhani", Rupees::from(249), 1)],
            delivery: DeliveryDetails {
                full_name: "Asha Rao".into(),
                phone: "9876543210".into(),
                street: "12 MG Road".into(),
                city: "Bengaluru".into(),
                state: "Karnataka".into(),
                zip_code: "560001".into(),
                country: "India".into(),
                delivery_instructions: None,
            },
            payment: PaymentState::new(PaymentMethod::Upi),
            refund: RefundState::default(),
            pricing: PriceBreakdown {
                subtotal: Rupees::from(249),
                delivery_fee: Rupees::from(99),
                tax: Rupees::from(12),
                discount: Rupees::from(0),
                total: Rupees::from(360),
            },
            status,
            is_urgent: false,
            notes: None,
            created_at: now,
            updated_at: now,
            estimated_delivery_at: Some(now + Duration::minutes(ESTIMATED_DELIVERY_MINUTES)),
            actual_delivery_at: None,
            preparing_at: None,
            out_for_delivery_at: None,
            cancelled_at: None,
            cancellation_reason: None,
            cancelled_by: None,
        }
    }

    #[test]
    fn display_projection_special_cases_win() {
        let now = Utc::now() + Duration::hours(6);
        let order = dummy_order(OrderStatusType::Pending);
        assert_eq!(derived_display_status(&order, now), DisplayStatus::AwaitingPayment);
        let order = dummy_order(OrderStatusType::Cancelled);
        assert_eq!(derived_display_status(&order, now), DisplayStatus::Cancelled);
        let order = dummy_order(OrderStatusType::Delivered);
        assert_eq!(derived_display_status(&order, now), DisplayStatus::Delivered);
    }

    #[test]
    fn display_projection_time_comparison() {
        let order = dummy_order(OrderStatusType::Preparing);
        let eta = order.estimated_delivery_at.unwrap();
        assert_eq!(derived_display_status(&order, eta - Duration::minutes(10)), DisplayStatus::InProgress);
        assert_eq!(derived_display_status(&order, eta + Duration::minutes(10)), DisplayStatus::RunningLate);
    }
}
