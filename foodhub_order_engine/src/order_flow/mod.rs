mod order_flow_api;
mod order_objects;

pub use order_flow_api::OrderFlowApi;
pub use order_objects::{OrderQueryFilter, OrderStatistics};
