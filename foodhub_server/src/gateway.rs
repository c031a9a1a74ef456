//! The production [`PaymentGateway`] implementation, backed by the Razorpay REST client.
//!
//! The engine only sees the trait; everything Razorpay-specific (paise conversion, REST error shapes,
//! signature formats) stays on this side of the seam.

use fh_common::Rupees;
use foodhub_order_engine::traits::{PaymentGateway, PaymentGatewayError, PaymentIntent, RefundResult, RefundSpeed};
use log::debug;
use razorpay_tools::{RazorpayApi, RazorpayApiError, RefundSpeed as RazorpayRefundSpeed};

#[derive(Clone)]
pub struct RazorpayGateway {
    api: RazorpayApi,
}

impl RazorpayGateway {
    pub fn new(api: RazorpayApi) -> Self {
        Self { api }
    }
}

impl PaymentGateway for RazorpayGateway {
    async fn create_intent(
        &self,
        amount: Rupees,
        currency: &str,
        receipt: &str,
    ) -> Result<PaymentIntent, PaymentGatewayError> {
        debug!("💳️ Registering a {currency} payment intent of {amount} for {receipt}");
        let order = self.api.create_payment_intent(amount, receipt).await.map_err(into_gateway_error)?;
        Ok(PaymentIntent { intent_id: order.id.clone(), provider_order_id: order.id })
    }

    fn verify_signature(&self, order_ref: &str, payment_id: &str, signature: &str) -> bool {
        self.api.verify_payment_signature(order_ref, payment_id, signature)
    }

    async fn refund(
        &self,
        payment_id: &str,
        amount: Rupees,
        speed: RefundSpeed,
    ) -> Result<RefundResult, PaymentGatewayError> {
        let speed = match speed {
            RefundSpeed::Normal => RazorpayRefundSpeed::Normal,
            RefundSpeed::Optimum => RazorpayRefundSpeed::Optimum,
        };
        let refund = self.api.refund_payment(payment_id, amount, speed).await.map_err(into_gateway_error)?;
        Ok(RefundResult { refund_id: refund.id, status: refund.status })
    }
}

/// 4xx responses mean Razorpay understood us and said no; everything else is treated as transient.
fn into_gateway_error(e: RazorpayApiError) -> PaymentGatewayError {
    match e {
        RazorpayApiError::QueryError { status, message } if (400..500).contains(&status) => {
            PaymentGatewayError::Rejected(format!("Error {status}. {message}"))
        },
        RazorpayApiError::InvalidCurrencyAmount(amount) => {
            PaymentGatewayError::Rejected(format!("Invalid currency amount: {amount}"))
        },
        other => PaymentGatewayError::NetworkError(other.to_string()),
    }
}
