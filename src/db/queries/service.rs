use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    Json,
};
use serde_json::json;
use sqlx::{PgPool, QueryBuilder};

use crate::db::models::service::{NewService, Service, UpdateService};
use crate::middleware::auth::UserPermissions;
use crate::utils::api_response::ApiResponse;

/// Lists the active service catalog. Admins also see deactivated services.
#[utoipa::path(
    get,
    path = "/services",
    responses(
        (status = 200, description = "Service catalog", body = [Service]),
        (status = 500, description = "Failed to retrieve services")
    ),
    tag = "Services",
    security(
        ("bearerAuth" = [])
    )
)]
pub async fn get_services(
    State(pool): State<PgPool>,
    Extension(perms): Extension<UserPermissions>,
) -> Result<ApiResponse<Vec<Service>>, ApiResponse<()>> {
    let sql = if perms.is_admin() {
        "SELECT * FROM services ORDER BY category, name"
    } else {
        "SELECT * FROM services WHERE active ORDER BY category, name"
    };

    let services = sqlx::query_as::<_, Service>(sql)
        .fetch_all(&pool)
        .await
        .map_err(|e| {
            ApiResponse::<()>::error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to retrieve services",
                Some(json!({ "db_error": e.to_string() })),
            )
        })?;

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Services retrieved successfully",
        services,
    ))
}

#[utoipa::path(
    get,
    path = "/services/{id}",
    params(
        ("id" = i32, Path, description = "Service ID")
    ),
    responses(
        (status = 200, description = "Service retrieved", body = Service),
        (status = 404, description = "Service not found")
    ),
    tag = "Services",
    security(
        ("bearerAuth" = [])
    )
)]
pub async fn get_service(
    State(pool): State<PgPool>,
    Path(id): Path<i32>,
) -> Result<ApiResponse<Service>, ApiResponse<()>> {
    let service = sqlx::query_as::<_, Service>("SELECT * FROM services WHERE id = $1")
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
        .ok_or_else(|| {
            ApiResponse::<()>::error(StatusCode::NOT_FOUND, "Service not found", None)
        })?;

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Service retrieved successfully",
        service,
    ))
}

#[utoipa::path(
    post,
    path = "/services",
    request_body = NewService,
    responses(
        (status = 201, description = "Service created", body = Service),
        (status = 403, description = "Admin only"),
        (status = 500, description = "Failed to create service")
    ),
    tag = "Services",
    security(
        ("bearerAuth" = [])
    )
)]
pub async fn create_service(
    State(pool): State<PgPool>,
    Extension(perms): Extension<UserPermissions>,
    Json(payload): Json<NewService>,
) -> Result<ApiResponse<Service>, ApiResponse<()>> {
    if !perms.can_manage_catalog() {
        return Err(ApiResponse::<()>::error(
            StatusCode::FORBIDDEN,
            "Only admins can create services",
            None,
        ));
    }

    let service = sqlx::query_as::<_, Service>(
        "INSERT INTO services (name, description, category, base_price, duration_minutes)
         VALUES ($1, $2, $3, $4, $5)
         RETURNING *",
    )
    .bind(&payload.name)
    .bind(&payload.description)
    .bind(&payload.category)
    .bind(&payload.base_price)
    .bind(payload.duration_minutes.unwrap_or(60))
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to create service",
            Some(json!({ "db_error": e.to_string() })),
        )
    })?;

    Ok(ApiResponse::success(
        StatusCode::CREATED,
        "Service created successfully",
        service,
    ))
}

#[utoipa::path(
    put,
    path = "/services/{id}",
    params(
        ("id" = i32, Path, description = "Service ID")
    ),
    request_body = UpdateService,
    responses(
        (status = 200, description = "Service updated", body = Service),
        (status = 400, description = "Nothing to update"),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Service not found")
    ),
    tag = "Services",
    security(
        ("bearerAuth" = [])
    )
)]
pub async fn update_service(
    State(pool): State<PgPool>,
    Extension(perms): Extension<UserPermissions>,
    Path(id): Path<i32>,
    Json(payload): Json<UpdateService>,
) -> Result<ApiResponse<Service>, ApiResponse<()>> {
    if !perms.can_manage_catalog() {
        return Err(ApiResponse::<()>::error(
            StatusCode::FORBIDDEN,
            "Only admins can update services",
            None,
        ));
    }

    let mut builder = QueryBuilder::new("UPDATE services SET ");
    let mut any = false;
    let mut separated = builder.separated(", ");
    if let Some(name) = &payload.name {
        separated.push("name = ").push_bind_unseparated(name);
        any = true;
    }
    if let Some(description) = &payload.description {
        separated
            .push("description = ")
            .push_bind_unseparated(description);
        any = true;
    }
    if let Some(category) = &payload.category {
        separated
            .push("category = ")
            .push_bind_unseparated(category);
        any = true;
    }
    if let Some(base_price) = &payload.base_price {
        separated
            .push("base_price = ")
            .push_bind_unseparated(base_price);
        any = true;
    }
    if let Some(duration) = payload.duration_minutes {
        separated
            .push("duration_minutes = ")
            .push_bind_unseparated(duration);
        any = true;
    }
    if let Some(active) = payload.active {
        separated.push("active = ").push_bind_unseparated(active);
        any = true;
    }

    if !any {
        return Err(ApiResponse::<()>::error(
            StatusCode::BAD_REQUEST,
            "Nothing to update",
            None,
        ));
    }

    builder.push(" WHERE id = ").push_bind(id);
    builder.push(" RETURNING *");

    let service = builder
        .build_query_as::<Service>()
        .fetch_optional(&pool)
        .await
        .map_err(|e| {
            ApiResponse::<()>::error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to update service",
                Some(json!({ "db_error": e.to_string() })),
            )
        })?
        .ok_or_else(|| {
            ApiResponse::<()>::error(StatusCode::NOT_FOUND, "Service not found", None)
        })?;

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Service updated successfully",
        service,
    ))
}

/// Deleting a service with bookings would orphan them, so it is deactivated
/// instead when references exist.
#[utoipa::path(
    delete,
    path = "/services/{id}",
    params(
        ("id" = i32, Path, description = "Service ID")
    ),
    responses(
        (status = 200, description = "Service deleted or deactivated"),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Service not found")
    ),
    tag = "Services",
    security(
        ("bearerAuth" = [])
    )
)]
pub async fn delete_service(
    State(pool): State<PgPool>,
    Extension(perms): Extension<UserPermissions>,
    Path(id): Path<i32>,
) -> Result<ApiResponse<()>, ApiResponse<()>> {
    if !perms.can_manage_catalog() {
        return Err(ApiResponse::<()>::error(
            StatusCode::FORBIDDEN,
            "Only admins can delete services",
            None,
        ));
    }

    let referenced = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM bookings WHERE service_id = $1)",
    )
    .bind(id)
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Database query failed",
            Some(json!({ "db_error": e.to_string() })),
        )
    })?;

    let result = if referenced {
        sqlx::query("UPDATE services SET active = FALSE WHERE id = $1")
            .bind(id)
            .execute(&pool)
            .await
    } else {
        sqlx::query("DELETE FROM services WHERE id = $1")
            .bind(id)
            .execute(&pool)
            .await
    }
    .map_err(|e| {
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to delete service",
            Some(json!({ "db_error": e.to_string() })),
        )
    })?;

    if result.rows_affected() == 0 {
        return Err(ApiResponse::<()>::error(
            StatusCode::NOT_FOUND,
            "Service not found",
            None,
        ));
    }

    let message = if referenced {
        "Service deactivated (existing bookings reference it)"
    } else {
        "Service deleted successfully"
    };
    Ok(ApiResponse::success(StatusCode::OK, message, ()))
}

use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(get_services, get_service, create_service, update_service, delete_service),
    components(
        schemas(Service, NewService, UpdateService)
    ),
    tags(
        (name = "Services", description = "Service catalog management")
    )
)]
pub struct ServiceDoc;
