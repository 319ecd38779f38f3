use crate::db::queries::inventory::{
    create_inventory_item, delete_inventory_item, get_inventory, get_inventory_item, get_low_stock,
    update_inventory_item,
};
use axum::{routing::get, Router};
use sqlx::PgPool;

pub fn inventory_routes() -> Router<PgPool> {
    Router::new()
        .route("/inventory", get(get_inventory).post(create_inventory_item))
        .route("/inventory/low-stock", get(get_low_stock))
        .route(
            "/inventory/{id}",
            get(get_inventory_item)
                .put(update_inventory_item)
                .delete(delete_inventory_item),
        )
}
