use std::sync::Arc;

use fh_common::{Rupees, INR_CURRENCY_CODE};
use log::*;
use reqwest::{
    header::{HeaderMap, HeaderValue},
    Client,
    Method,
};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use crate::{
    config::RazorpayConfig,
    data_objects::{RazorpayOrder, RazorpayPayment, RazorpayRefund, RefundSpeed},
    helpers::verify_payment_signature,
    RazorpayApiError,
};

#[derive(Clone)]
pub struct RazorpayApi {
    config: RazorpayConfig,
    client: Arc<Client>,
}

impl RazorpayApi {
    pub fn new(config: RazorpayConfig) -> Result<Self, RazorpayApiError> {
        let mut headers = HeaderMap::with_capacity(1);
        headers.insert("Content-Type", HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| RazorpayApiError::Initialization(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client) })
    }

    pub async fn rest_query<T: DeserializeOwned, B: Serialize>(
        &self,
        method: Method,
        path: &str,
        body: Option<B>,
    ) -> Result<T, RazorpayApiError> {
        let url = self.url(path);
        trace!("Sending REST query: {url}");
        let mut req = self
            .client
            .request(method, url)
            .basic_auth(&self.config.key_id, Some(self.config.key_secret.reveal()));
        if let Some(body) = body {
            req = req.json(&body);
        }
        let response = req.send().await.map_err(|e| RazorpayApiError::RestResponseError(e.to_string()))?;
        if response.status().is_success() {
            trace!("REST query successful. {}", response.status());
            response.json::<T>().await.map_err(|e| RazorpayApiError::JsonError(e.to_string()))
        } else {
            let status = response.status().as_u16();
            let message = response.text().await.map_err(|e| RazorpayApiError::RestResponseError(e.to_string()))?;
            Err(RazorpayApiError::QueryError { status, message })
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.api_base)
    }

    /// Register a payment intent (a "Razorpay order") for the given amount. `receipt` is our order number, and
    /// Razorpay treats it as an idempotency handle: re-registering the same receipt is safe.
    pub async fn create_payment_intent(
        &self,
        amount: Rupees,
        receipt: &str,
    ) -> Result<RazorpayOrder, RazorpayApiError> {
        if amount.is_negative() {
            return Err(RazorpayApiError::InvalidCurrencyAmount(amount.to_string()));
        }
        // The order number rides along in the notes so that webhook payloads can be traced back to the order
        // even when the payment entity carries no receipt.
        let body = serde_json::json!({
            "amount": amount.to_paise(),
            "currency": INR_CURRENCY_CODE,
            "receipt": receipt,
            "notes": { "order_number": receipt },
        });
        debug!("Creating payment intent of {amount} for receipt {receipt}");
        let result = self.rest_query::<RazorpayOrder, Value>(Method::POST, "/orders", Some(body)).await?;
        info!("Created payment intent {} for receipt {receipt}", result.id);
        Ok(result)
    }

    pub async fn get_payment(&self, payment_id: &str) -> Result<RazorpayPayment, RazorpayApiError> {
        let path = format!("/payments/{payment_id}");
        debug!("Fetching payment {payment_id}");
        self.rest_query::<RazorpayPayment, ()>(Method::GET, &path, None).await
    }

    /// Refund a captured payment, fully or partially.
    pub async fn refund_payment(
        &self,
        payment_id: &str,
        amount: Rupees,
        speed: RefundSpeed,
    ) -> Result<RazorpayRefund, RazorpayApiError> {
        if amount.is_negative() {
            return Err(RazorpayApiError::InvalidCurrencyAmount(amount.to_string()));
        }
        let path = format!("/payments/{payment_id}/refund");
        let body = serde_json::json!({
            "amount": amount.to_paise(),
            "speed": speed,
        });
        debug!("Refunding {amount} on payment {payment_id}");
        let result = self.rest_query::<RazorpayRefund, Value>(Method::POST, &path, Some(body)).await?;
        info!("Refund {} for payment {payment_id} is '{}'", result.id, result.status);
        Ok(result)
    }

    /// Check a checkout-callback signature against this client's key secret.
    pub fn verify_payment_signature(&self, order_ref: &str, payment_id: &str, signature: &str) -> bool {
        verify_payment_signature(self.config.key_secret.reveal(), order_ref, payment_id, signature)
    }

    pub fn config(&self) -> &RazorpayConfig {
        &self.config
    }
}
