//! A thin client for the slice of the Razorpay REST API that FoodHub uses (payment intents and refunds), plus
//! the HMAC signature checks for checkout callbacks and webhooks.
mod api;
mod config;
mod data_objects;
mod error;
mod helpers;

pub use api::RazorpayApi;
pub use config::RazorpayConfig;
pub use data_objects::{RazorpayOrder, RazorpayPayment, RazorpayRefund, RefundSpeed};
pub use error::RazorpayApiError;
pub use helpers::{hmac_sha256_hex, verify_payment_signature, verify_webhook_signature};
