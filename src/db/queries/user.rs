use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    Json,
};
use serde_json::json;
use sqlx::{PgPool, QueryBuilder};

use crate::api::auth::Claims;
use crate::db::models::user::{NewAddress, UpdateProfile, UserAddress, UserInfo, UserRole};
use crate::middleware::auth::UserPermissions;
use crate::utils::api_response::ApiResponse;

#[utoipa::path(
    get,
    path = "/users",
    responses(
        (status = 200, description = "List all users", body = [UserInfo]),
        (status = 403, description = "Admin only"),
        (status = 500, description = "Failed to retrieve users")
    ),
    tag = "Users",
    security(
        ("bearerAuth" = [])
    )
)]
pub async fn get_all_users(
    State(pool): State<PgPool>,
    Extension(perms): Extension<UserPermissions>,
) -> Result<ApiResponse<Vec<UserInfo>>, ApiResponse<()>> {
    if !perms.is_admin() {
        return Err(ApiResponse::<()>::error(
            StatusCode::FORBIDDEN,
            "Only admins can list users",
            None,
        ));
    }

    let users = sqlx::query_as::<_, UserInfo>(
        "SELECT id, username, full_name, phone, role FROM users ORDER BY id",
    )
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to retrieve users",
            Some(json!({ "db_error": e.to_string() })),
        )
    })?;

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Users retrieved successfully",
        users,
    ))
}

#[utoipa::path(
    get,
    path = "/users/technicians",
    responses(
        (status = 200, description = "List all technicians", body = [UserInfo]),
        (status = 403, description = "Admin only"),
        (status = 500, description = "Failed to retrieve technicians")
    ),
    tag = "Users",
    security(
        ("bearerAuth" = [])
    )
)]
pub async fn get_technicians(
    State(pool): State<PgPool>,
    Extension(perms): Extension<UserPermissions>,
) -> Result<ApiResponse<Vec<UserInfo>>, ApiResponse<()>> {
    if !perms.is_admin() {
        return Err(ApiResponse::<()>::error(
            StatusCode::FORBIDDEN,
            "Only admins can list technicians",
            None,
        ));
    }

    let technicians = sqlx::query_as::<_, UserInfo>(
        "SELECT id, username, full_name, phone, role FROM users
         WHERE role = $1 AND NOT account_locked
         ORDER BY full_name",
    )
    .bind(UserRole::Technician)
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to retrieve technicians",
            Some(json!({ "db_error": e.to_string() })),
        )
    })?;

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Technicians retrieved successfully",
        technicians,
    ))
}

/// Returns the authenticated user's profile.
#[utoipa::path(
    get,
    path = "/users/profile",
    responses(
        (status = 200, description = "Profile retrieved", body = UserInfo),
        (status = 404, description = "User not found")
    ),
    tag = "Users",
    security(
        ("bearerAuth" = [])
    )
)]
pub async fn get_profile(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<ApiResponse<UserInfo>, ApiResponse<()>> {
    let user_id = claims.user_id()?;

    let user = sqlx::query_as::<_, UserInfo>(
        "SELECT id, username, full_name, phone, role FROM users WHERE id = $1",
    )
    .bind(user_id)
    .fetch_optional(&pool)
    .await
    .map_err(|e| {
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Database query failed",
            Some(json!({ "db_error": e.to_string() })),
        )
    })?
    .ok_or_else(|| ApiResponse::<()>::error(StatusCode::NOT_FOUND, "User not found", None))?;

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Profile retrieved successfully",
        user,
    ))
}

/// Partial profile update; only the provided fields change.
#[utoipa::path(
    put,
    path = "/users/profile",
    request_body = UpdateProfile,
    responses(
        (status = 200, description = "Profile updated", body = UserInfo),
        (status = 400, description = "Nothing to update"),
        (status = 409, description = "Email already in use")
    ),
    tag = "Users",
    security(
        ("bearerAuth" = [])
    )
)]
pub async fn update_profile(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<UpdateProfile>,
) -> Result<ApiResponse<UserInfo>, ApiResponse<()>> {
    let user_id = claims.user_id()?;

    if payload.email.is_none() && payload.full_name.is_none() && payload.phone.is_none() {
        return Err(ApiResponse::<()>::error(
            StatusCode::BAD_REQUEST,
            "Nothing to update",
            None,
        ));
    }

    let mut builder = QueryBuilder::new("UPDATE users SET ");
    let mut separated = builder.separated(", ");
    if let Some(email) = &payload.email {
        separated.push("email = ").push_bind_unseparated(email);
    }
    if let Some(full_name) = &payload.full_name {
        separated
            .push("full_name = ")
            .push_bind_unseparated(full_name);
    }
    if let Some(phone) = &payload.phone {
        separated.push("phone = ").push_bind_unseparated(phone);
    }
    builder.push(" WHERE id = ").push_bind(user_id);
    builder.push(" RETURNING id, username, full_name, phone, role");

    let updated = builder
        .build_query_as::<UserInfo>()
        .fetch_one(&pool)
        .await
        .map_err(|e| {
            if let Some(db_err) = e.as_database_error() {
                if db_err.code().map(|code| code == "23505").unwrap_or(false) {
                    return ApiResponse::<()>::error(
                        StatusCode::CONFLICT,
                        "Email already in use",
                        None,
                    );
                }
            }
            ApiResponse::<()>::error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to update profile",
                Some(json!({ "db_error": e.to_string() })),
            )
        })?;

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Profile updated successfully",
        updated,
    ))
}

#[utoipa::path(
    get,
    path = "/users/addresses",
    responses(
        (status = 200, description = "Saved addresses", body = [UserAddress]),
        (status = 500, description = "Failed to retrieve addresses")
    ),
    tag = "Users",
    security(
        ("bearerAuth" = [])
    )
)]
pub async fn get_addresses(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<ApiResponse<Vec<UserAddress>>, ApiResponse<()>> {
    let user_id = claims.user_id()?;

    let addresses = sqlx::query_as::<_, UserAddress>(
        "SELECT * FROM user_addresses WHERE user_id = $1 ORDER BY is_default DESC, id",
    )
    .bind(user_id)
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to retrieve addresses",
            Some(json!({ "db_error": e.to_string() })),
        )
    })?;

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Addresses retrieved successfully",
        addresses,
    ))
}

/// Saves a new address. Marking it default clears the previous default first.
#[utoipa::path(
    post,
    path = "/users/addresses",
    request_body = NewAddress,
    responses(
        (status = 201, description = "Address saved", body = UserAddress),
        (status = 500, description = "Failed to save address")
    ),
    tag = "Users",
    security(
        ("bearerAuth" = [])
    )
)]
pub async fn create_address(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<NewAddress>,
) -> Result<ApiResponse<UserAddress>, ApiResponse<()>> {
    let user_id = claims.user_id()?;

    let mut tx = pool.begin().await.map_err(|e| {
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to start transaction",
            Some(json!({ "error": e.to_string() })),
        )
    })?;

    if payload.is_default {
        sqlx::query("UPDATE user_addresses SET is_default = FALSE WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                ApiResponse::<()>::error(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Failed to clear default address",
                    Some(json!({ "db_error": e.to_string() })),
                )
            })?;
    }

    let address = sqlx::query_as::<_, UserAddress>(
        "INSERT INTO user_addresses (user_id, label, address_line, city, postal_code, is_default)
         VALUES ($1, $2, $3, $4, $5, $6)
         RETURNING *",
    )
    .bind(user_id)
    .bind(&payload.label)
    .bind(&payload.address_line)
    .bind(&payload.city)
    .bind(&payload.postal_code)
    .bind(payload.is_default)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| {
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to save address",
            Some(json!({ "db_error": e.to_string() })),
        )
    })?;

    tx.commit().await.map_err(|e| {
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to commit transaction",
            Some(json!({ "error": e.to_string() })),
        )
    })?;

    Ok(ApiResponse::success(
        StatusCode::CREATED,
        "Address saved successfully",
        address,
    ))
}

#[utoipa::path(
    delete,
    path = "/users/addresses/{id}",
    params(
        ("id" = i32, Path, description = "Address ID")
    ),
    responses(
        (status = 200, description = "Address deleted"),
        (status = 404, description = "Address not found")
    ),
    tag = "Users",
    security(
        ("bearerAuth" = [])
    )
)]
pub async fn delete_address(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i32>,
) -> Result<ApiResponse<()>, ApiResponse<()>> {
    let user_id = claims.user_id()?;

    let result = sqlx::query("DELETE FROM user_addresses WHERE id = $1 AND user_id = $2")
        .bind(id)
        .bind(user_id)
        .execute(&pool)
        .await
        .map_err(|e| {
            ApiResponse::<()>::error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to delete address",
                Some(json!({ "db_error": e.to_string() })),
            )
        })?;

    if result.rows_affected() == 0 {
        return Err(ApiResponse::<()>::error(
            StatusCode::NOT_FOUND,
            "Address not found",
            None,
        ));
    }

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Address deleted successfully",
        (),
    ))
}

use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        get_all_users,
        get_technicians,
        get_profile,
        update_profile,
        get_addresses,
        create_address,
        delete_address,
    ),
    components(
        schemas(UserInfo, UpdateProfile, UserAddress, NewAddress)
    ),
    tags(
        (name = "Users", description = "User and profile management")
    )
)]
pub struct UserDoc;
