use fh_common::Rupees;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The external payment-provider contract consumed by the lifecycle core. The Razorpay client in
/// `razorpay_tools` satisfies this shape in production; tests use a deterministic fake. The adapter's own
/// retry/backoff policy toward the provider is its business; callers only require that calls given the same
/// idempotency key are idempotent from their perspective.
#[allow(async_fn_in_trait)]
pub trait PaymentGateway {
    /// Register a payment intent with the provider for the given amount, returning the provider's identifiers.
    /// `receipt` is our order number and doubles as the idempotency key.
    async fn create_intent(
        &self,
        amount: Rupees,
        currency: &str,
        receipt: &str,
    ) -> Result<PaymentIntent, PaymentGatewayError>;

    /// Check a checkout-callback signature: HMAC-SHA256 over `"{order_ref}|{payment_id}"` under the shared key.
    /// Returns `false` on any malformed input; never panics and never errors.
    fn verify_signature(&self, order_ref: &str, payment_id: &str, signature: &str) -> bool;

    /// Ask the provider to refund a captured payment.
    async fn refund(
        &self,
        payment_id: &str,
        amount: Rupees,
        speed: RefundSpeed,
    ) -> Result<RefundResult, PaymentGatewayError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentIntent {
    pub intent_id: String,
    pub provider_order_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundResult {
    pub refund_id: String,
    pub status: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RefundSpeed {
    Normal,
    Optimum,
}

#[derive(Debug, Clone, Error)]
pub enum PaymentGatewayError {
    #[error("Could not reach the payment provider: {0}")]
    NetworkError(String),
    #[error("The payment provider rejected the request: {0}")]
    Rejected(String),
}
