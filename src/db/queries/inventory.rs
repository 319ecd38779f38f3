use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    Json,
};
use serde_json::json;
use sqlx::{PgPool, QueryBuilder};

use crate::db::models::inventory::{
    InventoryItem, InventoryItemView, NewInventoryItem, UpdateInventoryItem,
};
use crate::middleware::auth::UserPermissions;
use crate::utils::api_response::ApiResponse;

/// Lists the materials catalog with derived stock status. Readable by any
/// authenticated user; technicians check it before jobs.
#[utoipa::path(
    get,
    path = "/inventory",
    responses(
        (status = 200, description = "Inventory items", body = [InventoryItemView]),
        (status = 500, description = "Failed to retrieve inventory")
    ),
    tag = "Inventory",
    security(
        ("bearerAuth" = [])
    )
)]
pub async fn get_inventory(
    State(pool): State<PgPool>,
) -> Result<ApiResponse<Vec<InventoryItemView>>, ApiResponse<()>> {
    let items = sqlx::query_as::<_, InventoryItem>(
        "SELECT * FROM inventory_items ORDER BY category, name",
    )
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to retrieve inventory",
            Some(json!({ "db_error": e.to_string() })),
        )
    })?;

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Inventory retrieved successfully",
        items.into_iter().map(InventoryItemView::from).collect(),
    ))
}

#[utoipa::path(
    get,
    path = "/inventory/{id}",
    params(
        ("id" = i32, Path, description = "Inventory item ID")
    ),
    responses(
        (status = 200, description = "Item retrieved", body = InventoryItemView),
        (status = 404, description = "Item not found")
    ),
    tag = "Inventory",
    security(
        ("bearerAuth" = [])
    )
)]
pub async fn get_inventory_item(
    State(pool): State<PgPool>,
    Path(id): Path<i32>,
) -> Result<ApiResponse<InventoryItemView>, ApiResponse<()>> {
    let item = sqlx::query_as::<_, InventoryItem>("SELECT * FROM inventory_items WHERE id = $1")
        .bind(id)
        .fetch_optional(&pool)
        .await
        .map_err(|e| {
            ApiResponse::<()>::error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Database query failed",
                Some(json!({ "db_error": e.to_string() })),
            )
        })?
        .ok_or_else(|| ApiResponse::<()>::error(StatusCode::NOT_FOUND, "Item not found", None))?;

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Item retrieved successfully",
        InventoryItemView::from(item),
    ))
}

/// Items at or below their reorder level, the admin restocking view.
#[utoipa::path(
    get,
    path = "/inventory/low-stock",
    responses(
        (status = 200, description = "Items needing restock", body = [InventoryItemView]),
        (status = 403, description = "Admin only")
    ),
    tag = "Inventory",
    security(
        ("bearerAuth" = [])
    )
)]
pub async fn get_low_stock(
    State(pool): State<PgPool>,
    Extension(perms): Extension<UserPermissions>,
) -> Result<ApiResponse<Vec<InventoryItemView>>, ApiResponse<()>> {
    if !perms.is_admin() {
        return Err(ApiResponse::<()>::error(
            StatusCode::FORBIDDEN,
            "Only admins can view the restock list",
            None,
        ));
    }

    let items = sqlx::query_as::<_, InventoryItem>(
        "SELECT * FROM inventory_items WHERE quantity <= reorder_level ORDER BY quantity",
    )
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to retrieve low-stock items",
            Some(json!({ "db_error": e.to_string() })),
        )
    })?;

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Low-stock items retrieved successfully",
        items.into_iter().map(InventoryItemView::from).collect(),
    ))
}

#[utoipa::path(
    post,
    path = "/inventory",
    request_body = NewInventoryItem,
    responses(
        (status = 201, description = "Item created", body = InventoryItemView),
        (status = 400, description = "Invalid quantities"),
        (status = 403, description = "Admin only")
    ),
    tag = "Inventory",
    security(
        ("bearerAuth" = [])
    )
)]
pub async fn create_inventory_item(
    State(pool): State<PgPool>,
    Extension(perms): Extension<UserPermissions>,
    Json(payload): Json<NewInventoryItem>,
) -> Result<ApiResponse<InventoryItemView>, ApiResponse<()>> {
    if !perms.can_manage_catalog() {
        return Err(ApiResponse::<()>::error(
            StatusCode::FORBIDDEN,
            "Only admins can create inventory items",
            None,
        ));
    }

    if payload.quantity < 0 || payload.reorder_level < 0 {
        return Err(ApiResponse::<()>::error(
            StatusCode::BAD_REQUEST,
            "Quantity and reorder level must not be negative",
            None,
        ));
    }

    let item = sqlx::query_as::<_, InventoryItem>(
        "INSERT INTO inventory_items (name, category, price, cost, quantity, reorder_level, expiry_date)
         VALUES ($1, $2, $3, $4, $5, $6, $7)
         RETURNING *",
    )
    .bind(&payload.name)
    .bind(&payload.category)
    .bind(&payload.price)
    .bind(&payload.cost)
    .bind(payload.quantity)
    .bind(payload.reorder_level)
    .bind(payload.expiry_date)
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to create inventory item",
            Some(json!({ "db_error": e.to_string() })),
        )
    })?;

    Ok(ApiResponse::success(
        StatusCode::CREATED,
        "Item created successfully",
        InventoryItemView::from(item),
    ))
}

#[utoipa::path(
    put,
    path = "/inventory/{id}",
    params(
        ("id" = i32, Path, description = "Inventory item ID")
    ),
    request_body = UpdateInventoryItem,
    responses(
        (status = 200, description = "Item updated", body = InventoryItemView),
        (status = 400, description = "Nothing to update"),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Item not found")
    ),
    tag = "Inventory",
    security(
        ("bearerAuth" = [])
    )
)]
pub async fn update_inventory_item(
    State(pool): State<PgPool>,
    Extension(perms): Extension<UserPermissions>,
    Path(id): Path<i32>,
    Json(payload): Json<UpdateInventoryItem>,
) -> Result<ApiResponse<InventoryItemView>, ApiResponse<()>> {
    if !perms.can_manage_catalog() {
        return Err(ApiResponse::<()>::error(
            StatusCode::FORBIDDEN,
            "Only admins can update inventory items",
            None,
        ));
    }

    let mut builder = QueryBuilder::new("UPDATE inventory_items SET updated_at = NOW()");
    if let Some(name) = &payload.name {
        builder.push(", name = ").push_bind(name);
    }
    if let Some(category) = &payload.category {
        builder.push(", category = ").push_bind(category);
    }
    if let Some(price) = &payload.price {
        builder.push(", price = ").push_bind(price);
    }
    if let Some(cost) = &payload.cost {
        builder.push(", cost = ").push_bind(cost);
    }
    if let Some(quantity) = payload.quantity {
        if quantity < 0 {
            return Err(ApiResponse::<()>::error(
                StatusCode::BAD_REQUEST,
                "Quantity must not be negative",
                None,
            ));
        }
        builder.push(", quantity = ").push_bind(quantity);
    }
    if let Some(reorder_level) = payload.reorder_level {
        builder.push(", reorder_level = ").push_bind(reorder_level);
    }
    if let Some(expiry_date) = payload.expiry_date {
        builder.push(", expiry_date = ").push_bind(expiry_date);
    }
    builder.push(" WHERE id = ").push_bind(id);
    builder.push(" RETURNING *");

    let item = builder
        .build_query_as::<InventoryItem>()
        .fetch_optional(&pool)
        .await
        .map_err(|e| {
            ApiResponse::<()>::error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to update inventory item",
                Some(json!({ "db_error": e.to_string() })),
            )
        })?
        .ok_or_else(|| ApiResponse::<()>::error(StatusCode::NOT_FOUND, "Item not found", None))?;

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Item updated successfully",
        InventoryItemView::from(item),
    ))
}

/// Deletes a catalog item. Past bookings keep their snapshot copies, so no
/// reference check is needed here.
#[utoipa::path(
    delete,
    path = "/inventory/{id}",
    params(
        ("id" = i32, Path, description = "Inventory item ID")
    ),
    responses(
        (status = 200, description = "Item deleted"),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Item not found")
    ),
    tag = "Inventory",
    security(
        ("bearerAuth" = [])
    )
)]
pub async fn delete_inventory_item(
    State(pool): State<PgPool>,
    Extension(perms): Extension<UserPermissions>,
    Path(id): Path<i32>,
) -> Result<ApiResponse<()>, ApiResponse<()>> {
    if !perms.can_manage_catalog() {
        return Err(ApiResponse::<()>::error(
            StatusCode::FORBIDDEN,
            "Only admins can delete inventory items",
            None,
        ));
    }

    let result = sqlx::query("DELETE FROM inventory_items WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await
        .map_err(|e| {
            ApiResponse::<()>::error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to delete inventory item",
                Some(json!({ "db_error": e.to_string() })),
            )
        })?;

    if result.rows_affected() == 0 {
        return Err(ApiResponse::<()>::error(
            StatusCode::NOT_FOUND,
            "Item not found",
            None,
        ));
    }

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Item deleted successfully",
        (),
    ))
}

use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        get_inventory,
        get_inventory_item,
        get_low_stock,
        create_inventory_item,
        update_inventory_item,
        delete_inventory_item,
    ),
    components(
        schemas(InventoryItemView, InventoryItem, NewInventoryItem, UpdateInventoryItem)
    ),
    tags(
        (name = "Inventory", description = "Materials inventory management")
    )
)]
pub struct InventoryDoc;
