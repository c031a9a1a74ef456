//! Core data types for the order/payment lifecycle.
//!
//! Everything in here is either stored directly in the database or is a new-record type that is about to be.
//! Status enums convert to and from their snake_case string form, which is also the form they take in the
//! database and on the wire.

use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use fh_common::Rupees;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use thiserror::Error;

/// Minutes between order confirmation and the estimated delivery time stamped on the order.
pub const ESTIMATED_DELIVERY_MINUTES: i64 = 45;

#[derive(Debug, Clone, Error)]
#[error("Invalid value: {0}")]
pub struct ConversionError(pub String);

//--------------------------------------       OrderId        ---------------------------------------------------------
/// The internal database identifier of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct OrderId(pub i64);

impl From<i64> for OrderId {
    fn from(v: i64) -> Self {
        Self(v)
    }
}

impl Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl OrderId {
    pub fn value(&self) -> i64 {
        self.0
    }
}

//--------------------------------------     OrderNumber      ---------------------------------------------------------
/// The human-readable, globally unique order reference, e.g. `ORD-1718019180123-4F7K2M9QZ`.
#[derive(Debug, Clone, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct OrderNumber(pub String);

impl From<String> for OrderNumber {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl FromStr for OrderNumber {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

impl Display for OrderNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl OrderNumber {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

//--------------------------------------   OrderStatusType    ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OrderStatusType {
    /// The order exists but payment has not been confirmed yet.
    Pending,
    /// Payment has been confirmed (or the order is cash-on-delivery) and the kitchen has the ticket.
    Confirmed,
    /// The kitchen is preparing the food.
    Preparing,
    /// The order is ready for pickup by the courier.
    Ready,
    /// The courier is on the way.
    OutForDelivery,
    /// The order has been delivered. Terminal.
    Delivered,
    /// The order has been cancelled by the user, the restaurant, or the system. Terminal.
    Cancelled,
}

impl OrderStatusType {
    /// The only legal successor on the forward fulfillment chain, if any.
    /// `Cancelled` is reachable from any non-terminal state but is never a *successor* in this sense.
    pub fn next(&self) -> Option<OrderStatusType> {
        use OrderStatusType::*;
        match self {
            Pending => Some(Confirmed),
            Confirmed => Some(Preparing),
            Preparing => Some(Ready),
            Ready => Some(OutForDelivery),
            OutForDelivery => Some(Delivered),
            Delivered | Cancelled => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatusType::Delivered | OrderStatusType::Cancelled)
    }

    /// Customer-facing label for this status.
    pub fn display_label(&self) -> &'static str {
        use OrderStatusType::*;
        match self {
            Pending => "Payment Pending",
            Confirmed => "Order Confirmed",
            Preparing => "Preparing Your Food",
            Ready => "Ready for Pickup",
            OutForDelivery => "Out for Delivery",
            Delivered => "Delivered",
            Cancelled => "Cancelled",
        }
    }
}

impl Display for OrderStatusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use OrderStatusType::*;
        let s = match self {
            Pending => "pending",
            Confirmed => "confirmed",
            Preparing => "preparing",
            Ready => "ready",
            OutForDelivery => "out_for_delivery",
            Delivered => "delivered",
            Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}

impl FromStr for OrderStatusType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        use OrderStatusType::*;
        match s {
            "pending" => Ok(Pending),
            "confirmed" => Ok(Confirmed),
            "preparing" => Ok(Preparing),
            "ready" => Ok(Ready),
            "out_for_delivery" => Ok(OutForDelivery),
            "delivered" => Ok(Delivered),
            "cancelled" => Ok(Cancelled),
            s => Err(ConversionError(format!("Invalid order status: {s}"))),
        }
    }
}

//--------------------------------------    PaymentMethod     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Card,
    Upi,
    Cash,
}

impl PaymentMethod {
    /// Cash orders need no gateway round-trip before the kitchen can start.
    pub fn is_prepaid(&self) -> bool {
        !matches!(self, PaymentMethod::Cash)
    }
}

impl Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PaymentMethod::Card => "card",
            PaymentMethod::Upi => "upi",
            PaymentMethod::Cash => "cash",
        };
        write!(f, "{s}")
    }
}

impl FromStr for PaymentMethod {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "card" => Ok(PaymentMethod::Card),
            "upi" => Ok(PaymentMethod::Upi),
            "cash" => Ok(PaymentMethod::Cash),
            s => Err(ConversionError(format!("Invalid payment method: {s}"))),
        }
    }
}

//--------------------------------------  PaymentStatusType   ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatusType {
    Pending,
    Processing,
    Completed,
    Failed,
    Refunded,
}

impl Display for PaymentStatusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PaymentStatusType::Pending => "pending",
            PaymentStatusType::Processing => "processing",
            PaymentStatusType::Completed => "completed",
            PaymentStatusType::Failed => "failed",
            PaymentStatusType::Refunded => "refunded",
        };
        write!(f, "{s}")
    }
}

impl FromStr for PaymentStatusType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PaymentStatusType::Pending),
            "processing" => Ok(PaymentStatusType::Processing),
            "completed" => Ok(PaymentStatusType::Completed),
            "failed" => Ok(PaymentStatusType::Failed),
            "refunded" => Ok(PaymentStatusType::Refunded),
            s => Err(ConversionError(format!("Invalid payment status: {s}"))),
        }
    }
}

//--------------------------------------   RefundStatusType   ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RefundStatusType {
    None,
    Pending,
    Processed,
    Failed,
}

impl Display for RefundStatusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RefundStatusType::None => "none",
            RefundStatusType::Pending => "pending",
            RefundStatusType::Processed => "processed",
            RefundStatusType::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

impl FromStr for RefundStatusType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(RefundStatusType::None),
            "pending" => Ok(RefundStatusType::Pending),
            "processed" => Ok(RefundStatusType::Processed),
            "failed" => Ok(RefundStatusType::Failed),
            s => Err(ConversionError(format!("Invalid refund status: {s}"))),
        }
    }
}

//--------------------------------------     CancelledBy      ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CancelledBy {
    User,
    Restaurant,
    System,
}

impl Display for CancelledBy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CancelledBy::User => "user",
            CancelledBy::Restaurant => "restaurant",
            CancelledBy::System => "system",
        };
        write!(f, "{s}")
    }
}

impl FromStr for CancelledBy {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(CancelledBy::User),
            "restaurant" => Ok(CancelledBy::Restaurant),
            "system" => Ok(CancelledBy::System),
            s => Err(ConversionError(format!("Invalid cancelled_by value: {s}"))),
        }
    }
}

//--------------------------------------      FoodItem        ---------------------------------------------------------
/// The catalog store's view of a food item, as consumed by the lifecycle core. Catalog CRUD itself lives elsewhere;
/// the core only reads items and adjusts stock.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct FoodItem {
    pub id: String,
    pub name: String,
    pub price: Rupees,
    pub stock_quantity: i64,
    pub is_available: bool,
}

//--------------------------------------      OrderLine       ---------------------------------------------------------
/// One line of an order. `unit_price` and `name` are snapshots taken from the catalog at order-creation time and
/// are never re-read afterwards; later catalog edits must not alter historical orders.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct OrderLine {
    pub food_id: String,
    pub name: String,
    pub unit_price: Rupees,
    pub quantity: i64,
    pub line_total: Rupees,
}

impl OrderLine {
    pub fn new(food_id: impl Into<String>, name: impl Into<String>, unit_price: Rupees, quantity: i64) -> Self {
        let line_total = unit_price * quantity;
        Self { food_id: food_id.into(), name: name.into(), unit_price, quantity, line_total }
    }
}

/// A requested line on a new order. Name and price are looked up from the catalog during creation, so the caller
/// only supplies the reference and quantity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrderLine {
    pub food_id: String,
    pub quantity: i64,
}

//--------------------------------------   DeliveryDetails    ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct DeliveryDetails {
    pub full_name: String,
    pub phone: String,
    pub street: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    pub country: String,
    pub delivery_instructions: Option<String>,
}

impl DeliveryDetails {
    /// The first required field that is empty, if any. Used to reject orders before any side effect happens.
    pub fn first_missing_field(&self) -> Option<&'static str> {
        let required: [(&'static str, &str); 7] = [
            ("full_name", &self.full_name),
            ("phone", &self.phone),
            ("street", &self.street),
            ("city", &self.city),
            ("state", &self.state),
            ("zip_code", &self.zip_code),
            ("country", &self.country),
        ];
        required.into_iter().find(|(_, v)| v.trim().is_empty()).map(|(name, _)| name)
    }
}

//--------------------------------------    PaymentState      ---------------------------------------------------------
/// The payment sub-state of an order. Status moves forward only (pending → processing → completed), with `failed`
/// reachable from the non-final states and `refunded` only via an explicit, processed refund.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct PaymentState {
    pub method: PaymentMethod,
    pub payment_status: PaymentStatusType,
    pub transaction_id: Option<String>,
    pub payment_id: Option<String>,
    pub upi_id: Option<String>,
    pub card_last4: Option<String>,
    pub card_brand: Option<String>,
}

impl PaymentState {
    pub fn new(method: PaymentMethod) -> Self {
        Self {
            method,
            payment_status: PaymentStatusType::Pending,
            transaction_id: None,
            payment_id: None,
            upi_id: None,
            card_last4: None,
            card_brand: None,
        }
    }
}

//--------------------------------------     RefundState      ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct RefundState {
    pub refund_status: RefundStatusType,
    pub refund_amount: Rupees,
    pub refund_reason: Option<String>,
}

impl Default for RefundState {
    fn default() -> Self {
        Self { refund_status: RefundStatusType::None, refund_amount: Rupees::from(0), refund_reason: None }
    }
}

//--------------------------------------   PriceBreakdown     ---------------------------------------------------------
/// The immutable price breakdown computed at order-creation time. `total` is always derivable from the other
/// components; [`PriceBreakdown::is_consistent`] checks exactly that.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct PriceBreakdown {
    pub subtotal: Rupees,
    pub delivery_fee: Rupees,
    pub tax: Rupees,
    pub discount: Rupees,
    pub total: Rupees,
}

impl PriceBreakdown {
    pub fn is_consistent(&self) -> bool {
        self.subtotal + self.delivery_fee + self.tax - self.discount == self.total
    }
}

//--------------------------------------        Order         ---------------------------------------------------------
/// The order aggregate. Owns its lines, delivery details, payment state, refund state and price breakdown; holds
/// weak references (`user_id`, line `food_id`s) to records it does not own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub order_number: OrderNumber,
    pub user_id: String,
    /// Loaded from the order_lines table alongside the order row; always in insertion order.
    pub lines: Vec<OrderLine>,
    pub delivery: DeliveryDetails,
    pub payment: PaymentState,
    pub refund: RefundState,
    pub pricing: PriceBreakdown,
    pub status: OrderStatusType,
    pub is_urgent: bool,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub estimated_delivery_at: Option<DateTime<Utc>>,
    pub actual_delivery_at: Option<DateTime<Utc>>,
    pub preparing_at: Option<DateTime<Utc>>,
    pub out_for_delivery_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancellation_reason: Option<String>,
    pub cancelled_by: Option<CancelledBy>,
}

// The order row is flat in the database; the nested sub-states are reassembled by hand. Lines come from a
// separate table and start out empty here.
#[cfg(feature = "sqlite")]
impl sqlx::FromRow<'_, sqlx::sqlite::SqliteRow> for Order {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        use sqlx::Row;
        Ok(Self {
            id: row.try_get("id")?,
            order_number: row.try_get("order_number")?,
            user_id: row.try_get("user_id")?,
            lines: Vec::new(),
            delivery: DeliveryDetails {
                full_name: row.try_get("full_name")?,
                phone: row.try_get("phone")?,
                street: row.try_get("street")?,
                city: row.try_get("city")?,
                state: row.try_get("state")?,
                zip_code: row.try_get("zip_code")?,
                country: row.try_get("country")?,
                delivery_instructions: row.try_get("delivery_instructions")?,
            },
            payment: PaymentState {
                method: row.try_get("method")?,
                payment_status: row.try_get("payment_status")?,
                transaction_id: row.try_get("transaction_id")?,
                payment_id: row.try_get("payment_id")?,
                upi_id: row.try_get("upi_id")?,
                card_last4: row.try_get("card_last4")?,
                card_brand: row.try_get("card_brand")?,
            },
            refund: RefundState {
                refund_status: row.try_get("refund_status")?,
                refund_amount: row.try_get("refund_amount")?,
                refund_reason: row.try_get("refund_reason")?,
            },
            pricing: PriceBreakdown {
                subtotal: row.try_get("subtotal")?,
                delivery_fee: row.try_get("delivery_fee")?,
                tax: row.try_get("tax")?,
                discount: row.try_get("discount")?,
                total: row.try_get("total")?,
            },
            status: row.try_get("status")?,
            is_urgent: row.try_get("is_urgent")?,
            notes: row.try_get("notes")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            estimated_delivery_at: row.try_get("estimated_delivery_at")?,
            actual_delivery_at: row.try_get("actual_delivery_at")?,
            preparing_at: row.try_get("preparing_at")?,
            out_for_delivery_at: row.try_get("out_for_delivery_at")?,
            cancelled_at: row.try_get("cancelled_at")?,
            cancellation_reason: row.try_get("cancellation_reason")?,
            cancelled_by: row.try_get("cancelled_by")?,
        })
    }
}

impl Order {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// An order is delayed when its estimated delivery time has passed and it is not in a terminal state.
    pub fn is_delayed(&self, now: DateTime<Utc>) -> bool {
        match self.estimated_delivery_at {
            Some(eta) => now > eta && !self.is_terminal(),
            None => false,
        }
    }
}

//--------------------------------------      NewOrder        ---------------------------------------------------------
/// A request to create an order. Prices are *not* part of this type on purpose; they are snapshotted from the
/// catalog inside the creation transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrder {
    pub user_id: String,
    pub lines: Vec<NewOrderLine>,
    pub delivery: DeliveryDetails,
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub is_urgent: bool,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub upi_id: Option<String>,
    #[serde(default)]
    pub card_last4: Option<String>,
    #[serde(default)]
    pub card_brand: Option<String>,
}

//--------------------------------------    PaymentEvent      ---------------------------------------------------------
/// An authenticated payment event, after signature verification. The lifecycle core trusts its caller on
/// authenticity and only enforces state-machine and idempotency rules.
///
/// `event_id` is the idempotency key: gateway event id for webhook deliveries, or a deterministic
/// `verify-<payment_id>` for explicit verification calls. Replays of the same `event_id` are no-ops.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentEvent {
    pub event_id: String,
    pub kind: PaymentEventKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PaymentEventKind {
    /// The gateway captured the payment (webhook `payment.captured` / `order.paid`, or an explicit verify call).
    Captured { payment_id: String, transaction_id: Option<String> },
    /// The gateway reported the payment attempt failed. The customer may retry; stock stays reserved.
    Failed { payment_id: Option<String>, reason: Option<String> },
    /// Cash was collected on delivery.
    CashCollected,
}

impl PaymentEvent {
    pub fn captured(event_id: impl Into<String>, payment_id: impl Into<String>, transaction_id: Option<String>) -> Self {
        Self {
            event_id: event_id.into(),
            kind: PaymentEventKind::Captured { payment_id: payment_id.into(), transaction_id },
        }
    }

    pub fn failed(event_id: impl Into<String>, payment_id: Option<String>, reason: Option<String>) -> Self {
        Self { event_id: event_id.into(), kind: PaymentEventKind::Failed { payment_id, reason } }
    }
}

/// The result of applying a payment event, with enough context for callers to fire hooks and craft responses
/// without re-reading the order.
#[derive(Debug, Clone)]
pub struct PaymentEventOutcome {
    pub order: Order,
    /// True when the event id had been processed before and nothing changed.
    pub duplicate: bool,
    /// True when this event moved the order from `pending` to `confirmed`.
    pub newly_confirmed: bool,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn status_chain_is_linear() {
        use OrderStatusType::*;
        assert_eq!(Pending.next(), Some(Confirmed));
        assert_eq!(Confirmed.next(), Some(Preparing));
        assert_eq!(Preparing.next(), Some(Ready));
        assert_eq!(Ready.next(), Some(OutForDelivery));
        assert_eq!(OutForDelivery.next(), Some(Delivered));
        assert_eq!(Delivered.next(), None);
        assert_eq!(Cancelled.next(), None);
    }

    #[test]
    fn status_round_trips_through_strings() {
        use OrderStatusType::*;
        for status in [Pending, Confirmed, Preparing, Ready, OutForDelivery, Delivered, Cancelled] {
            assert_eq!(status.to_string().parse::<OrderStatusType>().unwrap(), status);
        }
        assert!("on_hold".parse::<OrderStatusType>().is_err());
    }

    #[test]
    fn missing_delivery_fields_are_caught_in_order() {
        let mut delivery = DeliveryDetails {
            full_name: "Asha Rao".into(),
            phone: "9876543210".into(),
            street: "12 MG Road".into(),
            city: "Bengaluru".into(),
            state: "Karnataka".into(),
            zip_code: "560001".into(),
            country: "India".into(),
            delivery_instructions: None,
        };
        assert_eq!(delivery.first_missing_field(), None);
        delivery.phone = "  ".into();
        assert_eq!(delivery.first_missing_field(), Some("phone"));
        delivery.phone = "9876543210".into();
        delivery.country = String::new();
        assert_eq!(delivery.first_missing_field(), Some("country"));
    }

    #[test]
    fn breakdown_consistency() {
        let ok = PriceBreakdown {
            subtotal: Rupees::from(598),
            delivery_fee: Rupees::from(99),
            tax: Rupees::from(30),
            discount: Rupees::from(0),
            total: Rupees::from(727),
        };
        assert!(ok.is_consistent());
        let tampered = PriceBreakdown { total: Rupees::from(9), ..ok };
        assert!(!tampered.is_consistent());
    }
}
