//! The pricing engine.
//!
//! A [`PricingPolicy`] turns a set of order lines into a [`PriceBreakdown`]. The computation is pure: no clock, no
//! database, no randomness. The breakdown it produces is snapshotted onto the order at creation time and never
//! recomputed, so a later change to menu prices or to the policy itself can never alter an existing order's total.

use fh_common::Rupees;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db_types::OrderLine;

/// Orders at or above this subtotal ship free.
pub const DEFAULT_FREE_DELIVERY_THRESHOLD: i64 = 1_000;
/// Flat delivery fee below the free-delivery threshold.
pub const DEFAULT_DELIVERY_FEE: i64 = 99;
/// GST on the subtotal, applied as a fraction and rounded to the nearest whole rupee.
pub const DEFAULT_TAX_RATE: f64 = 0.05;

#[derive(Debug, Clone, Error)]
pub enum PricingError {
    #[error("An order must contain at least one line")]
    EmptyOrder,
    #[error("Invalid quantity ({quantity}) for item {food_id}")]
    InvalidQuantity { food_id: String, quantity: i64 },
    #[error("Negative unit price ({price}) for item {food_id}")]
    NegativePrice { food_id: String, price: Rupees },
    #[error("The computed order total ({0}) is negative")]
    NegativeTotal(Rupees),
}

/// The set of knobs that determine how an order is priced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingPolicy {
    pub free_delivery_threshold: Rupees,
    pub delivery_fee: Rupees,
    pub tax_rate: f64,
    pub discount: Rupees,
}

impl Default for PricingPolicy {
    fn default() -> Self {
        Self {
            free_delivery_threshold: Rupees::from(DEFAULT_FREE_DELIVERY_THRESHOLD),
            delivery_fee: Rupees::from(DEFAULT_DELIVERY_FEE),
            tax_rate: DEFAULT_TAX_RATE,
            discount: Rupees::default(),
        }
    }
}

impl PricingPolicy {
    /// Price the given lines under this policy.
    ///
    /// * `subtotal` is the sum of `unit_price * quantity` over all lines.
    /// * `delivery_fee` is waived when the subtotal reaches [`PricingPolicy::free_delivery_threshold`].
    /// * `tax` is `tax_rate * subtotal`, rounded to the nearest whole rupee.
    /// * `total = subtotal + delivery_fee + tax - discount`.
    ///
    /// Fails on an empty order, a non-positive quantity, a negative unit price, or a discount large enough to push
    /// the total below zero.
    pub fn compute_breakdown(&self, lines: &[OrderLine]) -> Result<PriceBreakdown, PricingError> {
        if lines.is_empty() {
            return Err(PricingError::EmptyOrder);
        }
        let mut subtotal = Rupees::default();
        for line in lines {
            if line.quantity <= 0 {
                return Err(PricingError::InvalidQuantity { food_id: line.food_id.clone(), quantity: line.quantity });
            }
            if line.unit_price.is_negative() {
                return Err(PricingError::NegativePrice { food_id: line.food_id.clone(), price: line.unit_price });
            }
            subtotal = subtotal + line.unit_price * line.quantity;
        }
        let delivery_fee =
            if subtotal >= self.free_delivery_threshold { Rupees::default() } else { self.delivery_fee };
        #[allow(clippy::cast_possible_truncation)]
        let tax = Rupees::from((subtotal.value() as f64 * self.tax_rate).round() as i64);
        let total = subtotal + delivery_fee + tax - self.discount;
        if total.is_negative() {
            return Err(PricingError::NegativeTotal(total));
        }
        Ok(PriceBreakdown { subtotal, delivery_fee, tax, discount: self.discount, total })
    }
}

pub use crate::db_types::PriceBreakdown;
