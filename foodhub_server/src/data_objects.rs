use std::fmt::Display;

use chrono::{DateTime, Utc};
use foodhub_order_engine::{
    db_types::{CancelledBy, DeliveryDetails, NewOrder, NewOrderLine, Order, OrderId, OrderStatusType, PaymentMethod},
    helpers::{derived_display_status, DisplayStatus},
    traits::PaymentIntent,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonResponse {
    pub success: bool,
    pub message: String,
}

impl JsonResponse {
    pub fn success<S: Display>(message: S) -> Self {
        Self { success: true, message: message.to_string() }
    }

    pub fn failure<S: Display>(message: S) -> Self {
        Self { success: false, message: message.to_string() }
    }
}

/// The create-order request body. Prices never appear here; they are snapshotted from the catalog when the
/// order is created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrderRequest {
    pub user_id: String,
    pub items: Vec<NewOrderLine>,
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

impl From<NewOrderRequest> for NewOrder {
    fn from(req: NewOrderRequest) -> Self {
        NewOrder {
            user_id: req.user_id,
            lines: req.items,
            delivery: req.delivery,
            payment_method: req.payment_method,
            is_urgent: req.is_urgent,
            notes: req.notes,
            upi_id: req.upi_id,
            card_last4: req.card_last4,
            card_brand: req.card_brand,
        }
    }
}

/// An order as returned to clients: the authoritative record plus the coarse display projection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderResult {
    #[serde(flatten)]
    pub order: Order,
    pub status_label: String,
    pub display_status: String,
}

impl OrderResult {
    pub fn new(order: Order, now: DateTime<Utc>) -> Self {
        let display_status = display_status_label(derived_display_status(&order, now)).to_string();
        let status_label = order.status.display_label().to_string();
        Self { order, status_label, display_status }
    }
}

fn display_status_label(status: DisplayStatus) -> &'static str {
    match status {
        DisplayStatus::AwaitingPayment => "Awaiting payment",
        DisplayStatus::Cancelled => "Cancelled",
        DisplayStatus::Delivered => "Delivered",
        DisplayStatus::InProgress => "In progress",
        DisplayStatus::RunningLate => "Running late",
    }
}

/// The create-order response. `payment` is present for prepaid orders and carries what the checkout page
/// needs to open the gateway widget.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderCreatedResponse {
    #[serde(flatten)]
    pub order: OrderResult,
    pub payment: Option<PaymentIntentResult>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentIntentResult {
    pub provider_order_id: String,
    pub amount: i64,
    pub currency: String,
    pub key_id: String,
}

impl PaymentIntentResult {
    pub fn new(intent: PaymentIntent, amount: i64, currency: &str, key_id: &str) -> Self {
        Self {
            provider_order_id: intent.provider_order_id,
            amount,
            currency: currency.to_string(),
            key_id: key_id.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModifyOrderParams {
    pub order_id: OrderId,
    pub reason: String,
    #[serde(default)]
    pub cancelled_by: Option<CancelledBy>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateStatusParams {
    pub order_id: OrderId,
    pub status: OrderStatusType,
    #[serde(default)]
    pub notes: Option<String>,
}

/// The checkout-callback verification body, field names as Razorpay's checkout widget posts them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyPaymentParams {
    pub order_id: OrderId,
    pub razorpay_order_id: String,
    pub razorpay_payment_id: String,
    pub razorpay_signature: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentMethodInfo {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub prepaid: bool,
}

/// The static capability listing for the payment-methods endpoint.
pub fn payment_methods() -> Vec<PaymentMethodInfo> {
    vec![
        PaymentMethodInfo {
            id: "card",
            name: "Credit / Debit card",
            description: "Pay online with any major card via Razorpay",
            prepaid: true,
        },
        PaymentMethodInfo {
            id: "upi",
            name: "UPI",
            description: "Pay online with any UPI app via Razorpay",
            prepaid: true,
        },
        PaymentMethodInfo {
            id: "cash",
            name: "Cash on delivery",
            description: "Pay the rider in cash when your order arrives",
            prepaid: false,
        },
    ]
}

//-------------------------------------------  Webhook payloads  ------------------------------------------

/// The envelope Razorpay posts to the payment webhook. Only the entities we act on are modelled; everything
/// else is carried (and ignored) by `serde_json::Value` in the handler.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    pub event: String,
    pub payload: WebhookPayload,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookPayload {
    #[serde(default)]
    pub payment: Option<WebhookWrapper<PaymentEntity>>,
    #[serde(default)]
    pub order: Option<WebhookWrapper<OrderEntity>>,
    #[serde(default)]
    pub refund: Option<WebhookWrapper<RefundEntity>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookWrapper<T> {
    pub entity: T,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentEntity {
    pub id: String,
    #[serde(default)]
    pub order_id: Option<String>,
    #[serde(default)]
    pub error_description: Option<String>,
    #[serde(default)]
    pub notes: EntityNotes,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrderEntity {
    pub id: String,
    #[serde(default)]
    pub receipt: Option<String>,
    #[serde(default)]
    pub notes: EntityNotes,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RefundEntity {
    pub id: String,
    pub payment_id: String,
    #[serde(default)]
    pub notes: EntityNotes,
}

/// The `notes` object we attach when registering a payment intent. Razorpay sends `[]` instead of `{}` when
/// notes are empty, hence the custom deserializer.
#[derive(Debug, Clone, Default)]
pub struct EntityNotes {
    pub order_number: Option<String>,
}

impl<'de> Deserialize<'de> for EntityNotes {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where D: serde::Deserializer<'de> {
        let value = serde_json::Value::deserialize(deserializer)?;
        let order_number =
            value.get("order_number").and_then(|v| v.as_str()).map(|s| s.to_string());
        Ok(Self { order_number })
    }
}
