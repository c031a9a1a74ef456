use log::debug;
use sqlx::SqliteConnection;

use crate::{db_types::FoodItem, traits::OrderFlowError};

/// Fetch a single catalog item by id.
pub async fn fetch_food(food_id: &str, conn: &mut SqliteConnection) -> Result<Option<FoodItem>, sqlx::Error> {
    let food = sqlx::query_as("SELECT * FROM foods WHERE id = $1").bind(food_id).fetch_optional(conn).await?;
    Ok(food)
}

/// Adjust the stock of a catalog item by `delta` (negative reserves, positive releases).
///
/// The `stock_quantity + delta >= 0` guard in the WHERE clause is what makes reservation safe under concurrency:
/// an adjustment that would take stock negative simply matches no row, and we report `InsufficientStock` with the
/// quantity that was actually available.
pub async fn adjust_stock(
    food_id: &str,
    delta: i64,
    conn: &mut SqliteConnection,
) -> Result<FoodItem, OrderFlowError> {
    let updated: Option<FoodItem> = sqlx::query_as(
        "UPDATE foods SET stock_quantity = stock_quantity + $1 WHERE id = $2 AND stock_quantity + $1 >= 0 \
         RETURNING *",
    )
    .bind(delta)
    .bind(food_id)
    .fetch_optional(&mut *conn)
    .await?;
    match updated {
        Some(food) => {
            debug!("🗃️ Stock for {food_id} adjusted by {delta} to {}", food.stock_quantity);
            Ok(food)
        },
        None => match fetch_food(food_id, conn).await? {
            Some(food) => Err(OrderFlowError::InsufficientStock {
                food_id: food_id.to_string(),
                requested: -delta,
                available: food.stock_quantity,
            }),
            None => Err(OrderFlowError::FoodNotFound(food_id.to_string())),
        },
    }
}

/// Insert or replace a catalog item. Used by seeding and by catalog sync jobs.
pub async fn upsert_food(food: &FoodItem, conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO foods (id, name, price, stock_quantity, is_available) VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (id) DO UPDATE
            SET name = excluded.name,
                price = excluded.price,
                stock_quantity = excluded.stock_quantity,
                is_available = excluded.is_available
        "#,
    )
    .bind(&food.id)
    .bind(&food.name)
    .bind(food.price)
    .bind(food.stock_quantity)
    .bind(food.is_available)
    .execute(conn)
    .await?;
    Ok(())
}
