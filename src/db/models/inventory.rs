use bigdecimal::BigDecimal;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum StockStatus {
    OutOfStock,
    LowStock,
    InStock,
}

/// Stock status is derived, never stored:
/// quantity == 0 → out_of_stock, quantity <= reorder_level → low_stock.
pub fn stock_status(quantity: i32, reorder_level: i32) -> StockStatus {
    if quantity == 0 {
        StockStatus::OutOfStock
    } else if quantity <= reorder_level {
        StockStatus::LowStock
    } else {
        StockStatus::InStock
    }
}

#[derive(Debug, Serialize, Deserialize, FromRow, ToSchema)]
pub struct InventoryItem {
    pub id: i32,
    pub name: String,
    pub category: String,
    #[schema(value_type = String)]
    pub price: BigDecimal,
    #[schema(value_type = String)]
    pub cost: BigDecimal,
    pub quantity: i32,
    pub reorder_level: i32,
    pub expiry_date: Option<NaiveDate>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl InventoryItem {
    pub fn stock_status(&self) -> StockStatus {
        stock_status(self.quantity, self.reorder_level)
    }
}

/// Item plus its derived stock status, the shape list endpoints return.
#[derive(Debug, Serialize, ToSchema)]
pub struct InventoryItemView {
    #[serde(flatten)]
    pub item: InventoryItem,
    pub stock_status: StockStatus,
}

impl From<InventoryItem> for InventoryItemView {
    fn from(item: InventoryItem) -> Self {
        let stock_status = item.stock_status();
        InventoryItemView { item, stock_status }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct NewInventoryItem {
    pub name: String,
    pub category: String,
    #[schema(value_type = String)]
    pub price: BigDecimal,
    #[schema(value_type = String)]
    pub cost: BigDecimal,
    pub quantity: i32,
    pub reorder_level: i32,
    pub expiry_date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateInventoryItem {
    pub name: Option<String>,
    pub category: Option<String>,
    #[schema(value_type = String)]
    pub price: Option<BigDecimal>,
    #[schema(value_type = String)]
    pub cost: Option<BigDecimal>,
    pub quantity: Option<i32>,
    pub reorder_level: Option<i32>,
    pub expiry_date: Option<NaiveDate>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_quantity_is_out_of_stock() {
        assert_eq!(stock_status(0, 5), StockStatus::OutOfStock);
        assert_eq!(stock_status(0, 0), StockStatus::OutOfStock);
    }

    #[test]
    fn at_or_below_reorder_level_is_low_stock() {
        assert_eq!(stock_status(1, 5), StockStatus::LowStock);
        assert_eq!(stock_status(5, 5), StockStatus::LowStock);
    }

    #[test]
    fn above_reorder_level_is_in_stock() {
        assert_eq!(stock_status(6, 5), StockStatus::InStock);
        assert_eq!(stock_status(100, 0), StockStatus::InStock);
    }
}
