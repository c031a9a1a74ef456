//! SQLite backend for the FoodHub order engine.
mod sqlite_impl;

pub mod db;
pub use sqlite_impl::SqliteDatabase;
