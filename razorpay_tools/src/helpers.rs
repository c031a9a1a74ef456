//! HMAC-SHA256 signature utilities for Razorpay checkout callbacks and webhooks.
//!
//! Both checks go through [`hmac::Mac::verify_slice`], which compares in constant time, so a near-miss
//! signature takes exactly as long to reject as a garbage one. Malformed input of any kind yields `false`;
//! these functions never panic and never error.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// The hex-encoded HMAC-SHA256 of `message` under `secret`.
pub fn hmac_sha256_hex(secret: &str, message: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts keys of any length");
    mac.update(message);
    hex::encode(mac.finalize().into_bytes())
}

fn verify_hex_signature(secret: &str, message: &[u8], signature: &str) -> bool {
    let expected = match hex::decode(signature) {
        Ok(bytes) => bytes,
        Err(_) => return false,
    };
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return false,
    };
    mac.update(message);
    mac.verify_slice(&expected).is_ok()
}

/// Check a checkout-callback signature: HMAC-SHA256 over `"{order_ref}|{payment_id}"` under the key secret.
pub fn verify_payment_signature(key_secret: &str, order_ref: &str, payment_id: &str, signature: &str) -> bool {
    let message = format!("{order_ref}|{payment_id}");
    verify_hex_signature(key_secret, message.as_bytes(), signature)
}

/// Check a webhook signature: HMAC-SHA256 over the raw request body under the webhook secret. The body must be
/// the exact bytes received; re-serialized JSON will not verify.
pub fn verify_webhook_signature(webhook_secret: &str, body: &[u8], signature: &str) -> bool {
    verify_hex_signature(webhook_secret, body, signature)
}
