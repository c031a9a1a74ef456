//! The database-agnostic contracts the lifecycle core is written against.
//!
//! The split mirrors how the engine is used:
//! * [`OrderManagement`] is the read side: fetching and searching orders.
//! * [`CatalogManagement`] is the engine's narrow view onto the food catalog: item lookup and stock adjustment.
//! * [`LifecycleDatabase`] is the write side: the composite, atomic operations that drive the order state machine.
//! * [`PaymentGateway`] is the external payment-provider contract consumed (not implemented) by the core.
//!
//! Backends implement the first three; `foodhub_order_engine` ships a SQLite implementation behind the `sqlite`
//! feature. Tests substitute in-memory or temporary-file backends freely.

mod catalog_management;
mod lifecycle_database;
mod order_management;
mod payment_gateway;

pub use catalog_management::CatalogManagement;
pub use lifecycle_database::{LifecycleDatabase, OrderFlowError, RefundOutcome};
pub use order_management::{OrderApiError, OrderManagement};
pub use payment_gateway::{PaymentGateway, PaymentGatewayError, PaymentIntent, RefundResult, RefundSpeed};
