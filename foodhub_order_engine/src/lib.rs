//! FoodHub Order Engine
//!
//! The order engine is the heart of the FoodHub food-ordering platform: it owns the order/payment lifecycle from
//! cart submission through delivery or cancellation and refund. This library is storage- and provider-agnostic.
//!
//! The library is divided into two main sections:
//! 1. Database management and control ([`mod@sqlite`]). SQLite is the supported backend at present. You should
//!    never need to access the database directly; use the public API instead. The exception is the data types
//!    used in the database, defined in the public [`mod@db_types`] module.
//! 2. The engine public API ([`OrderFlowApi`]). This drives orders through the state machine: creation with
//!    atomic stock reservation, idempotent payment-event application, fulfillment steps, cancellation with
//!    compensating stock release, and refund settlement. Backends implement the traits in [`mod@traits`].
//!
//! The engine also provides a set of events that can be subscribed to ([`mod@events`]): order confirmed, order
//! annulled, refund settled. A simple actor-ish hook framework lets you react to these, e.g. to notify the
//! kitchen display or send a push notification.

pub mod db_types;
pub mod events;
pub mod helpers;
mod order_flow;
pub mod pricing;
pub mod traits;

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(all(feature = "sqlite", any(feature = "test_utils", test)))]
pub mod test_utils;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;

pub use order_flow::{OrderFlowApi, OrderQueryFilter, OrderStatistics};
