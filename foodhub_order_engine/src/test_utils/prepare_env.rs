use std::path::Path;

use fh_common::Rupees;
use log::*;
use sqlx::{migrate, migrate::MigrateDatabase, Sqlite};

use crate::{db_types::FoodItem, sqlite::db::foods, SqliteDatabase};

pub async fn prepare_test_env(url: &str) {
    dotenvy::from_filename(".env.test").ok();
    let _ = env_logger::try_init();
    debug!("🚀️ Logging initialised");
    create_database(url).await;
    run_migrations(url).await;
}

pub fn random_db_path() -> String {
    format!("sqlite://../data/test_foodhub_{}", rand::random::<u64>())
}

pub async fn run_migrations(url: &str) {
    let db = SqliteDatabase::new_with_url(url, 5).await.expect("Error creating connection to database");
    migrate!("./src/sqlite/migrations").run(db.pool()).await.expect("Error running DB migrations");
    info!("🚀️ Migrations complete");
}

pub async fn create_database<P: AsRef<Path>>(path: P) {
    let p = path.as_ref().as_os_str().to_str().unwrap();
    if let Err(e) = Sqlite::drop_database(p).await {
        warn!("Error dropping database {p}: {e:?}");
    }
    Sqlite::create_database(p).await.expect("Error creating database");
    info!("Created Sqlite database {p}");
}

/// Put a food item into the catalog with the given price and stock.
pub async fn seed_food(db: &SqliteDatabase, id: &str, name: &str, price: i64, stock: i64, available: bool) {
    let food = FoodItem {
        id: id.to_string(),
        name: name.to_string(),
        price: Rupees::from(price),
        stock_quantity: stock,
        is_available: available,
    };
    let mut conn = db.pool().acquire().await.expect("Error acquiring connection");
    foods::upsert_food(&food, &mut conn).await.expect("Error seeding food item");
}
