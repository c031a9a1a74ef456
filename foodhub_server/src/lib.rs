//! # FoodHub server
//! This module hosts the HTTP layer of the FoodHub order service. It is responsible for:
//! Accepting new orders and handing them to the order engine.
//! Listening for incoming payment webhook requests from Razorpay and verifying their signatures.
//! Exposing the order book (queries, statistics, delayed and unpaid orders) to operators.
//! Running the background sweep that expires stale unpaid orders.
//!
//! ## Configuration
//! The server is configured via environment variables (`FH_*`). See [config](config/index.html) for more
//! information.

pub mod config;
pub mod data_objects;
pub mod errors;
pub mod expiry_worker;
pub mod gateway;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod webhook_routes;

#[cfg(test)]
mod endpoint_tests;
