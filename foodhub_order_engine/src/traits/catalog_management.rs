use crate::{db_types::FoodItem, traits::OrderFlowError};

/// The lifecycle core's narrow view onto the food catalog. Catalog CRUD (menus, descriptions, images) lives in
/// another service; the engine only needs to read items and move stock.
#[allow(async_fn_in_trait)]
pub trait CatalogManagement {
    /// Fetch a single catalog item.
    async fn fetch_food(&self, food_id: &str) -> Result<Option<FoodItem>, OrderFlowError>;

    /// Adjust the stock of a catalog item by `delta` (negative reserves, positive releases).
    ///
    /// Fails with [`OrderFlowError::FoodNotFound`] if the item does not exist and with
    /// [`OrderFlowError::InsufficientStock`] if the adjustment would take the stock below zero.
    async fn adjust_stock(&self, food_id: &str, delta: i64) -> Result<FoodItem, OrderFlowError>;
}
