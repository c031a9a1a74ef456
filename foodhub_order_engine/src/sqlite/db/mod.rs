//! # SQLite database methods
//!
//! This module contains "low-level" SQLite database interactions.
//!
//! All these interactions are maintained by simple functions (rather than stateful structs) that accept a
//! `&mut SqliteConnection` argument. Callers can obtain a connection from a pool, or create an atomic transaction
//! as the need arises and call through to the functions without any other changes.
use std::{env, str::FromStr, time::Duration};

use log::info;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
    Error as SqlxError,
    SqlitePool,
};

pub mod foods;
pub mod orders;
pub mod payment_events;

const SQLITE_DB_URL: &str = "sqlite://data/foodhub.db";

pub fn db_url() -> String {
    let result = env::var("FH_DATABASE_URL").unwrap_or_else(|_| {
        info!("FH_DATABASE_URL is not set. Using the default.");
        SQLITE_DB_URL.to_string()
    });
    info!("Using database URL: {result}");
    result
}

pub async fn new_pool(url: &str, max_connections: u32) -> Result<SqlitePool, SqlxError> {
    // In WAL mode a pooled connection that has served a read keeps the snapshot it last saw, so the first
    // read after another connection commits can return pre-commit state. The rollback journal has no
    // snapshots: every read sees the latest commit, which the order flow relies on (stock levels and order
    // state must be read-your-writes across pool connections). Writers briefly lock the whole database in
    // this mode, hence the busy timeout.
    let options = SqliteConnectOptions::from_str(url)?
        .journal_mode(SqliteJournalMode::Truncate)
        .busy_timeout(Duration::from_secs(5));
    let pool = SqlitePoolOptions::new().max_connections(max_connections).connect_with(options).await?;
    Ok(pool)
}
